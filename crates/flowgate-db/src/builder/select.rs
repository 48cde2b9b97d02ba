//! LIST: `SELECT field FROM table [WHERE] [ORDER BY]`.

use std::collections::HashMap;

use flowgate_config::EndpointDef;
use flowgate_error::Result;
use serde_json::Value;

use crate::{builder::{order_by, where_clause}, dialect::Context, types::QueryParam};

pub fn build(endpoint: &EndpointDef, params: &HashMap<String, Value>, ctx: &mut Context) -> Result<(String, Vec<QueryParam>)> {
    let fields = endpoint.field.join(", ");
    let mut sql = format!("SELECT {fields} FROM {}", endpoint.table_name);
    let mut args = Vec::new();

    if let Some((clause, mut where_args)) = where_clause::build(&endpoint.condition_schema, params, ctx)? {
        sql.push_str(" WHERE ");
        sql.push_str(&clause);
        args.append(&mut where_args);
    }

    if let Some(order) = order_by::build(&endpoint.sort) {
        sql.push(' ');
        sql.push_str(&order);
    }

    Ok((sql, args))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowgate_config::{ConditionSchemaEntry, Drive, Logic};
    use serde_json::json;

    #[test]
    fn list_with_like_or_over_two_columns() {
        let mut endpoint = EndpointDef { table_name: "users".to_string(), ..Default::default() };
        endpoint.condition_schema.insert(
            "keyword".to_string(),
            ConditionSchemaEntry {
                fields: vec!["username".to_string(), "email".to_string()],
                operator: "like".to_string(),
                logic: Logic::Or,
            },
        );
        let params = HashMap::from([("keyword".to_string(), json!("al"))]);
        let mut ctx = Context::new(Drive::Mysql);
        let (sql, args) = build(&endpoint, &params, &mut ctx).unwrap();
        assert_eq!(sql, "SELECT * FROM users WHERE (username LIKE ? OR email LIKE ?)");
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn list_without_filters_has_no_where() {
        let endpoint = EndpointDef { table_name: "users".to_string(), ..Default::default() };
        let params = HashMap::new();
        let mut ctx = Context::new(Drive::Mysql);
        let (sql, args) = build(&endpoint, &params, &mut ctx).unwrap();
        assert_eq!(sql, "SELECT * FROM users");
        assert!(args.is_empty());
    }
}
