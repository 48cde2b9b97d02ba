//! SQLite connection pool and `Connection` adapter, backed by `sqlx`.

use async_trait::async_trait;
use flowgate_config::DataSourceSpec;
use flowgate_error::{FlowgateError, Result};
use serde_json::Value;
use sqlx::{pool::PoolConnection, sqlite::SqlitePoolOptions, Column, Row, Sqlite, TypeInfo};

use crate::{
    traits::Connection,
    types::{ExecResult, QueryParam, RowMap},
};

pub async fn build_pool(spec: &DataSourceSpec) -> Result<sqlx::SqlitePool> {
    SqlitePoolOptions::new()
        .max_connections(spec.pool.max)
        .min_connections(spec.pool.min_idle)
        .acquire_timeout(std::time::Duration::from_millis(spec.pool.connection_timeout_ms))
        .idle_timeout(std::time::Duration::from_millis(spec.pool.idle_timeout_ms))
        .connect(&spec.host)
        .await
        .map_err(|e| FlowgateError::driver(format!("sqlite pool init failed: {e}")))
}

pub async fn checkout(pool: &sqlx::SqlitePool) -> Result<Box<dyn Connection>> {
    let conn = pool.acquire().await.map_err(|e| FlowgateError::driver(format!("sqlite checkout failed: {e}")))?;
    Ok(Box::new(SqliteConnection { conn }))
}

struct SqliteConnection {
    conn: PoolConnection<Sqlite>,
}

fn bind<'q>(
    mut query: sqlx::query::Query<'q, Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    args: &'q [QueryParam],
) -> sqlx::query::Query<'q, Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    for arg in args {
        query = match arg {
            QueryParam::Null => query.bind(None::<String>),
            QueryParam::Bool(b) => query.bind(*b),
            QueryParam::Int(i) => query.bind(*i),
            QueryParam::Double(d) => query.bind(*d),
            QueryParam::Text(s) => query.bind(s),
        };
    }
    query
}

#[async_trait]
impl Connection for SqliteConnection {
    async fn query(&mut self, sql: &str, args: &[QueryParam]) -> Result<Vec<RowMap>> {
        let query = bind(sqlx::query(sql), args);
        let rows = query
            .fetch_all(&mut *self.conn)
            .await
            .map_err(|e| FlowgateError::driver(format!("sqlite query: {e}")))?;
        Ok(rows.into_iter().map(row_to_map).collect())
    }

    async fn execute(&mut self, sql: &str, args: &[QueryParam]) -> Result<ExecResult> {
        let query = bind(sqlx::query(sql), args);
        let result = query
            .execute(&mut *self.conn)
            .await
            .map_err(|e| FlowgateError::driver(format!("sqlite execute: {e}")))?;
        Ok(ExecResult {
            affected_rows: result.rows_affected(),
            generated_key: Some(result.last_insert_rowid()),
        })
    }

    async fn begin(&mut self) -> Result<()> {
        sqlx::query("BEGIN")
            .execute(&mut *self.conn)
            .await
            .map_err(|e| FlowgateError::driver(format!("sqlite begin: {e}")))?;
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        sqlx::query("COMMIT")
            .execute(&mut *self.conn)
            .await
            .map_err(|e| FlowgateError::driver(format!("sqlite commit: {e}")))?;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        sqlx::query("ROLLBACK")
            .execute(&mut *self.conn)
            .await
            .map_err(|e| FlowgateError::driver(format!("sqlite rollback: {e}")))?;
        Ok(())
    }

    async fn set_autocommit(&mut self, _on: bool) -> Result<()> {
        // SQLite has no server-side autocommit toggle; BEGIN/COMMIT already
        // bracket the transaction explicitly.
        Ok(())
    }
}

fn row_to_map(row: sqlx::sqlite::SqliteRow) -> RowMap {
    let mut map = RowMap::new();
    for col in row.columns() {
        let name = col.name().to_string();
        map.insert(name, decode_column(&row, col.ordinal(), col.type_info().name()));
    }
    map
}

/// Dispatch on SQLite's column type affinity so `INTEGER`/`REAL`/`BOOLEAN`
/// columns (including the windowed `TotalCount`) decode to their real JSON
/// type instead of always falling back to a string.
fn decode_column(row: &sqlx::sqlite::SqliteRow, idx: usize, type_name: &str) -> Value {
    match type_name.to_ascii_uppercase().as_str() {
        "BOOLEAN" | "BOOL" => row.try_get::<Option<bool>, _>(idx).ok().flatten().map_or(Value::Null, Value::Bool),
        "INTEGER" | "INT" => row
            .try_get::<Option<i64>, _>(idx)
            .ok()
            .flatten()
            .map_or(Value::Null, |i| Value::Number(i.into())),
        "REAL" | "FLOAT" | "DOUBLE" | "NUMERIC" => row
            .try_get::<Option<f64>, _>(idx)
            .ok()
            .flatten()
            .and_then(serde_json::Number::from_f64)
            .map_or(Value::Null, Value::Number),
        _ => row.try_get::<Option<String>, _>(idx).ok().flatten().map_or(Value::Null, Value::String),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowgate_config::PoolPolicy;

    #[tokio::test]
    async fn row_to_map_decodes_integer_real_text_and_null_by_column_type() {
        let spec = DataSourceSpec { host: "sqlite::memory:".to_string(), pool: PoolPolicy::default() };
        let pool = build_pool(&spec).await.unwrap();
        let mut conn = checkout(&pool).await.unwrap();
        conn.execute("CREATE TABLE t (id INTEGER, score REAL, name TEXT, nothing TEXT)", &[]).await.unwrap();
        conn.execute(
            "INSERT INTO t (id, score, name, nothing) VALUES (?, ?, ?, ?)",
            &[QueryParam::Int(7), QueryParam::Double(2.5), QueryParam::Text("bob".to_string()), QueryParam::Null],
        )
        .await
        .unwrap();

        let rows = conn.query("SELECT id, score, name, nothing FROM t", &[]).await.unwrap();
        let row = &rows[0];
        assert_eq!(row["id"], Value::from(7));
        assert_eq!(row["score"], Value::from(2.5));
        assert_eq!(row["name"], Value::from("bob"));
        assert_eq!(row["nothing"], Value::Null);
    }
}
