//! Shallow PAGE: a windowed-count CTE plus the dialect's
//! OFFSET/LIMIT clause.

use std::collections::HashMap;

use flowgate_config::EndpointDef;
use flowgate_error::Result;
use serde_json::Value;

use crate::{
    builder::{order_by, util, where_clause},
    dialect::{self, Context},
    types::QueryParam,
};

pub fn build(endpoint: &EndpointDef, params: &HashMap<String, Value>, ctx: &mut Context) -> Result<(String, Vec<QueryParam>)> {
    let current_page = util::int_param(params, "current_page", 1);
    let page_size = util::int_param(params, "page_size", 10);
    let offset = util::shallow_offset(current_page, page_size);

    let fields = endpoint.field.join(", ");
    let mut args = Vec::new();

    let total_expr = if let Some(max_total) = util::opt_int_param(params, "max_total") {
        let ph1 = ctx.placeholder();
        let ph2 = ctx.placeholder();
        args.push(QueryParam::Int(max_total));
        args.push(QueryParam::Int(max_total));
        format!("CASE WHEN COUNT(*) OVER () > {ph1} THEN {ph2} ELSE COUNT(*) OVER () END AS TotalCount")
    } else {
        "COUNT(*) OVER () AS TotalCount".to_string()
    };

    let mut inner = format!("SELECT {fields}, {total_expr} FROM {}", endpoint.table_name);
    if let Some((clause, where_args)) = where_clause::build(&endpoint.condition_schema, params, ctx)? {
        inner.push_str(" WHERE ");
        inner.push_str(&clause);
        // total_expr's placeholders appear textually before the WHERE
        // clause's, so its args (already pushed above) stay first.
        args.extend(where_args);
    }
    if let Some(order) = order_by::build(&endpoint.sort) {
        inner.push(' ');
        inner.push_str(&order);
    }

    let page_clause = dialect::page_clause(ctx.dialect, offset, page_size);
    let sql = format!("WITH all_rows AS ({inner}) SELECT * FROM all_rows {page_clause}");

    Ok((sql, args))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowgate_config::{Drive, SortOrder, SortSpec};
    use serde_json::json;

    #[test]
    fn page_with_max_total_on_sqlite() {
        let endpoint = EndpointDef {
            table_name: "t".to_string(),
            sort: vec![SortSpec { field: "id".to_string(), order: SortOrder::Desc }],
            ..Default::default()
        };
        let params = HashMap::from([
            ("current_page".to_string(), json!(2)),
            ("page_size".to_string(), json!(5)),
            ("max_total".to_string(), json!(100)),
        ]);
        let mut ctx = Context::new(Drive::Sqlite);
        let (sql, args) = build(&endpoint, &params, &mut ctx).unwrap();
        assert_eq!(
            sql,
            "WITH all_rows AS (SELECT *, CASE WHEN COUNT(*) OVER () > ? THEN ? ELSE COUNT(*) OVER () END AS TotalCount FROM t ORDER BY id DESC) SELECT * FROM all_rows LIMIT 5 OFFSET 5"
        );
        assert_eq!(args, vec![QueryParam::Int(100), QueryParam::Int(100)]);
    }

    #[test]
    fn page_with_condition_schema_and_max_total_orders_args_by_textual_placeholder_position() {
        let endpoint = EndpointDef {
            table_name: "t".to_string(),
            condition_schema: HashMap::from([(
                "name".to_string(),
                flowgate_config::ConditionSchemaEntry {
                    fields: vec!["name".to_string()],
                    operator: "=".to_string(),
                    ..Default::default()
                },
            )]),
            ..Default::default()
        };
        let params = HashMap::from([
            ("current_page".to_string(), json!(1)),
            ("page_size".to_string(), json!(5)),
            ("max_total".to_string(), json!(100)),
            ("name".to_string(), json!("al")),
        ]);
        let mut ctx = Context::new(Drive::Mysql);
        let (sql, args) = build(&endpoint, &params, &mut ctx).unwrap();
        assert_eq!(
            sql,
            "WITH all_rows AS (SELECT *, CASE WHEN COUNT(*) OVER () > ? THEN ? ELSE COUNT(*) OVER () END AS TotalCount FROM t WHERE name = ?) SELECT * FROM all_rows LIMIT 5 OFFSET 0"
        );
        // total_expr's two placeholders appear before the WHERE clause's in
        // the text, so they must be bound first.
        assert_eq!(args, vec![QueryParam::Int(100), QueryParam::Int(100), QueryParam::Text("al".to_string())]);
    }

    #[test]
    fn page_without_max_total_uses_plain_count() {
        let endpoint = EndpointDef { table_name: "t".to_string(), ..Default::default() };
        let params = HashMap::new();
        let mut ctx = Context::new(Drive::Mysql);
        let (sql, args) = build(&endpoint, &params, &mut ctx).unwrap();
        assert_eq!(sql, "WITH all_rows AS (SELECT *, COUNT(*) OVER () AS TotalCount FROM t) SELECT * FROM all_rows LIMIT 10 OFFSET 0");
        assert!(args.is_empty());
    }
}
