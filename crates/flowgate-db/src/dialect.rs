//! Per-dialect placeholder syntax and pagination clauses.

pub use flowgate_config::Drive;

/// Mutable per-compilation state: the dialect being targeted and the
/// running placeholder index. One `Context` is created per `build_*`
/// call and confined to the thread that compiled it — the builder itself
/// is stateless and shareable, only this context is not.
#[derive(Debug)]
pub struct Context {
    pub dialect: Drive,
    param_index: usize,
}

impl Context {
    #[must_use]
    pub const fn new(dialect: Drive) -> Self {
        Self { dialect, param_index: 0 }
    }

    /// Return this dialect's placeholder form and advance the index.
    /// Every call increments `param_index` so positional alignment with
    /// `args` is guaranteed by construction.
    pub fn placeholder(&mut self) -> String {
        let ph = placeholder(self.dialect, self.param_index);
        self.param_index += 1;
        ph
    }

    #[must_use]
    pub const fn param_index(&self) -> usize {
        self.param_index
    }
}

/// `?` for MySQL/SQLite; `@pN` (zero-based) for MSSQL.
#[must_use]
pub fn placeholder(dialect: Drive, index: usize) -> String {
    match dialect {
        Drive::Mysql | Drive::Sqlite => "?".to_string(),
        Drive::Mssql => format!("@p{index}"),
    }
}

/// `LIMIT size OFFSET offset` for MySQL/SQLite;
/// `OFFSET offset ROWS FETCH NEXT size ROWS ONLY` for MSSQL.
#[must_use]
pub fn page_clause(dialect: Drive, offset: i64, size: i64) -> String {
    match dialect {
        Drive::Mysql | Drive::Sqlite => format!("LIMIT {size} OFFSET {offset}"),
        Drive::Mssql => format!("OFFSET {offset} ROWS FETCH NEXT {size} ROWS ONLY"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mssql_placeholders_are_zero_based_and_ascending() {
        let mut ctx = Context::new(Drive::Mssql);
        assert_eq!(ctx.placeholder(), "@p0");
        assert_eq!(ctx.placeholder(), "@p1");
        assert_eq!(ctx.placeholder(), "@p2");
        assert_eq!(ctx.param_index(), 3);
    }

    #[test]
    fn mysql_and_sqlite_placeholders_are_question_marks() {
        let mut ctx = Context::new(Drive::Mysql);
        assert_eq!(ctx.placeholder(), "?");
        assert_eq!(ctx.placeholder(), "?");
        let mut ctx = Context::new(Drive::Sqlite);
        assert_eq!(ctx.placeholder(), "?");
    }

    #[test]
    fn page_clause_shapes() {
        assert_eq!(page_clause(Drive::Mysql, 5, 10), "LIMIT 10 OFFSET 5");
        assert_eq!(page_clause(Drive::Sqlite, 0, 10), "LIMIT 10 OFFSET 0");
        assert_eq!(page_clause(Drive::Mssql, 5, 10), "OFFSET 5 ROWS FETCH NEXT 10 ROWS ONLY");
    }
}
