//! MODIFY — INSERT vs UPDATE.

use std::collections::HashMap;

use flowgate_config::EndpointDef;
use flowgate_error::{FlowgateError, Result};
use serde_json::Value;

use crate::{builder::where_clause, dialect::Context, types::QueryParam};

fn present(params: &HashMap<String, Value>, key: &str) -> bool {
    params.get(key).is_some_and(|v| !v.is_null())
}

pub fn build(endpoint: &EndpointDef, params: &HashMap<String, Value>, ctx: &mut Context) -> Result<(String, Vec<QueryParam>)> {
    let has_pk = present(params, &endpoint.pk);
    let action = endpoint.action.as_ref().and_then(|key| params.get(key)).and_then(Value::as_str);
    // A presence check only, so the branch that loses the decision never
    // allocates placeholders for a WHERE clause that ends up discarded.
    let has_condition_from_schema = where_clause::has_condition(&endpoint.condition_schema, params);

    let is_update = match action {
        None => has_pk,
        Some("update") => has_condition_from_schema || has_pk,
        Some(_) => false,
    };

    if is_update {
        build_update(endpoint, params, ctx, has_pk)
    } else {
        build_insert(endpoint, params, ctx)
    }
}

fn build_insert(
    endpoint: &EndpointDef,
    params: &HashMap<String, Value>,
    ctx: &mut Context,
) -> Result<(String, Vec<QueryParam>)> {
    let columns: Vec<&String> = endpoint.mutable_fields.iter().filter(|f| present(params, f)).collect();
    if columns.is_empty() {
        return Err(FlowgateError::build("empty insert"));
    }
    let col_list = columns.iter().map(|c| c.as_str()).collect::<Vec<_>>().join(", ");
    let mut args = Vec::with_capacity(columns.len());
    let placeholders = columns
        .iter()
        .map(|c| {
            args.push(QueryParam::from(&params[*c]));
            ctx.placeholder()
        })
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!("INSERT INTO {} ({col_list}) VALUES ({placeholders})", endpoint.table_name);
    Ok((sql, args))
}

fn build_update(
    endpoint: &EndpointDef,
    params: &HashMap<String, Value>,
    ctx: &mut Context,
    has_pk: bool,
) -> Result<(String, Vec<QueryParam>)> {
    let columns: Vec<&String> =
        endpoint.mutable_fields.iter().filter(|f| *f != &endpoint.pk && present(params, f)).collect();
    if columns.is_empty() {
        return Err(FlowgateError::build("empty update"));
    }

    // SET's placeholders must be allocated before WHERE's: they appear
    // first in the generated SQL text.
    let mut args = Vec::with_capacity(columns.len());
    let set_clause = columns
        .iter()
        .map(|c| {
            let ph = ctx.placeholder();
            args.push(QueryParam::from(&params[*c]));
            format!("{c}={ph}")
        })
        .collect::<Vec<_>>()
        .join(", ");

    let (where_sql, mut where_args) = match where_clause::build(&endpoint.condition_schema, params, ctx)? {
        Some((clause, args)) => (clause, args),
        None if has_pk => {
            let ph = ctx.placeholder();
            (format!("{}={ph}", endpoint.pk), vec![QueryParam::from(&params[&endpoint.pk])])
        },
        None => return Err(FlowgateError::build("no filter; full-table update forbidden")),
    };
    args.append(&mut where_args);

    let sql = format!("UPDATE {} SET {set_clause} WHERE {where_sql}", endpoint.table_name);
    Ok((sql, args))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowgate_config::Drive;
    use serde_json::json;

    #[test]
    fn update_rejects_full_table() {
        let endpoint = EndpointDef {
            table_name: "t".to_string(),
            mutable_fields: vec!["name".to_string()],
            action: Some("action".to_string()),
            ..Default::default()
        };
        let params =
            HashMap::from([("name".to_string(), json!("x")), ("action".to_string(), json!("update"))]);
        let mut ctx = Context::new(Drive::Mysql);
        let err = build(&endpoint, &params, &mut ctx).unwrap_err();
        assert!(err.to_string().contains("no filter; full-table update forbidden"));
    }

    #[test]
    fn insert_with_empty_column_set_errors() {
        let endpoint = EndpointDef { table_name: "t".to_string(), ..Default::default() };
        let params = HashMap::new();
        let mut ctx = Context::new(Drive::Mysql);
        let err = build(&endpoint, &params, &mut ctx).unwrap_err();
        assert!(err.to_string().contains("empty insert"));
    }

    #[test]
    fn presence_of_pk_alone_triggers_update_by_pk() {
        let endpoint = EndpointDef {
            table_name: "t".to_string(),
            pk: "id".to_string(),
            mutable_fields: vec!["name".to_string()],
            ..Default::default()
        };
        let params = HashMap::from([("id".to_string(), json!(7)), ("name".to_string(), json!("y"))]);
        let mut ctx = Context::new(Drive::Mysql);
        let (sql, args) = build(&endpoint, &params, &mut ctx).unwrap();
        assert_eq!(sql, "UPDATE t SET name=? WHERE id=?");
        assert_eq!(args, vec![QueryParam::Text("y".into()), QueryParam::Int(7)]);
    }

    #[test]
    fn mssql_update_with_condition_schema_orders_placeholders_by_textual_position() {
        let endpoint = EndpointDef {
            table_name: "t".to_string(),
            pk: "id".to_string(),
            mutable_fields: vec!["name".to_string()],
            action: Some("action".to_string()),
            condition_schema: HashMap::from([(
                "filter_id".to_string(),
                flowgate_config::ConditionSchemaEntry {
                    fields: vec!["id".to_string()],
                    operator: "=".to_string(),
                    ..Default::default()
                },
            )]),
            ..Default::default()
        };
        let params = HashMap::from([
            ("action".to_string(), json!("update")),
            ("name".to_string(), json!("x")),
            ("filter_id".to_string(), json!(5)),
        ]);
        let mut ctx = Context::new(Drive::Mssql);
        let (sql, args) = build(&endpoint, &params, &mut ctx).unwrap();
        assert_eq!(sql, "UPDATE t SET name=@p0 WHERE id = @p1");
        assert_eq!(args, vec![QueryParam::Text("x".into()), QueryParam::Int(5)]);
    }

    #[test]
    fn discarded_update_branch_does_not_burn_insert_placeholder_indices() {
        let endpoint = EndpointDef {
            table_name: "t".to_string(),
            pk: "id".to_string(),
            mutable_fields: vec!["name".to_string()],
            condition_schema: HashMap::from([(
                "filter_id".to_string(),
                flowgate_config::ConditionSchemaEntry {
                    fields: vec!["id".to_string()],
                    operator: "=".to_string(),
                    ..Default::default()
                },
            )]),
            ..Default::default()
        };
        // no `id` and no `filter_id`: has_pk is false and the condition
        // schema contributes nothing, so this must route to INSERT and
        // its VALUES placeholder must start at @p0.
        let params = HashMap::from([("name".to_string(), json!("x"))]);
        let mut ctx = Context::new(Drive::Mssql);
        let (sql, args) = build(&endpoint, &params, &mut ctx).unwrap();
        assert_eq!(sql, "INSERT INTO t (name) VALUES (@p0)");
        assert_eq!(args, vec![QueryParam::Text("x".into())]);
    }
}
