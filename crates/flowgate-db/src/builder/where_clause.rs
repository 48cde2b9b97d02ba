//! WHERE composition from `conditionSchema` entries.

use std::collections::HashMap;

use flowgate_config::{ConditionSchemaEntry, Logic};
use flowgate_error::{FlowgateError, Result};
use serde_json::Value;

use crate::{
    dialect::Context,
    types::QueryParam,
};

/// Whether any `conditionSchema` entry would contribute a fragment, without
/// allocating placeholders. Callers that must decide something (e.g. INSERT
/// vs UPDATE) before they know whether to call [`build`] use this instead,
/// so a discarded decision never burns a dialect's placeholder index.
#[must_use]
pub fn has_condition(condition_schema: &HashMap<String, ConditionSchemaEntry>, params: &HashMap<String, Value>) -> bool {
    condition_schema
        .iter()
        .any(|(key, entry)| params.get(key).is_some_and(|v| !v.is_null()) && !entry.fields.is_empty())
}

/// Build the `WHERE` body (without the leading `WHERE` keyword) over every
/// `conditionSchema` entry whose resolved param is present and non-null.
/// Returns `None` if no entry contributed a fragment.
pub fn build(
    condition_schema: &HashMap<String, ConditionSchemaEntry>,
    params: &HashMap<String, Value>,
    ctx: &mut Context,
) -> Result<Option<(String, Vec<QueryParam>)>> {
    let mut groups = Vec::new();
    let mut args = Vec::new();

    // Deterministic iteration: configs are small and the order only
    // affects placeholder numbering, which callers must treat as an
    // implementation detail anyway, but stable output is still nicer
    // to test against.
    let mut keys: Vec<&String> = condition_schema.keys().collect();
    keys.sort();

    for key in keys {
        let Some(value) = params.get(key) else { continue };
        if value.is_null() {
            continue;
        }
        let entry = &condition_schema[key];
        let mut fragments = Vec::with_capacity(entry.fields.len());
        for field in &entry.fields {
            let (frag, mut frag_args) = build_operator_fragment(&entry.operator, field, value, ctx)?;
            fragments.push(frag);
            args.append(&mut frag_args);
        }
        if fragments.is_empty() {
            continue;
        }
        let joined = match entry.logic {
            Logic::And => fragments.join(" AND "),
            Logic::Or if fragments.len() > 1 => format!("({})", fragments.join(" OR ")),
            Logic::Or => fragments.join(" OR "),
        };
        groups.push(joined);
    }

    if groups.is_empty() {
        return Ok(None);
    }
    Ok(Some((groups.join(" AND "), args)))
}

fn build_operator_fragment(
    operator: &str,
    field: &str,
    value: &Value,
    ctx: &mut Context,
) -> Result<(String, Vec<QueryParam>)> {
    match operator.to_ascii_lowercase().as_str() {
        op @ ("=" | ">" | "<" | ">=" | "<=" | "!=" | "<>") => {
            let ph = ctx.placeholder();
            Ok((format!("{field} {op} {ph}"), vec![QueryParam::from(value)]))
        },
        "like" => {
            let ph = ctx.placeholder();
            Ok((format!("{field} LIKE {ph}"), vec![QueryParam::Text(format!("%{}%", scalar_to_string(value)))]))
        },
        "not like" => {
            let ph = ctx.placeholder();
            Ok((format!("{field} NOT LIKE {ph}"), vec![QueryParam::Text(format!("%{}%", scalar_to_string(value)))]))
        },
        "in" => build_in(field, value, ctx, false),
        "not in" => build_in(field, value, ctx, true),
        "between" => build_between(field, value, ctx, false),
        "not between" => build_between(field, value, ctx, true),
        "is null" => Ok((format!("{field} IS NULL"), Vec::new())),
        "is not null" => Ok((format!("{field} IS NOT NULL"), Vec::new())),
        other => Err(FlowgateError::build(format!("unsupported operator '{other}'"))),
    }
}

fn build_in(field: &str, value: &Value, ctx: &mut Context, negate: bool) -> Result<(String, Vec<QueryParam>)> {
    let elements = coerce_array(value);
    if elements.is_empty() {
        // Empty `in` can never match; empty `not in` always matches.
        let frag = if negate { "1=1" } else { "1=0" };
        return Ok((frag.to_string(), Vec::new()));
    }
    if matches!(ctx.dialect, flowgate_config::Drive::Mssql) && elements.len() > 1000 {
        tracing::warn!(field, count = elements.len(), "mssql IN list exceeds 1000 elements");
    }
    let placeholders: Vec<String> = elements.iter().map(|_| ctx.placeholder()).collect();
    let keyword = if negate { "NOT IN" } else { "IN" };
    let args = elements.iter().map(QueryParam::from).collect();
    Ok((format!("{field} {keyword} ({})", placeholders.join(", ")), args))
}

fn build_between(field: &str, value: &Value, ctx: &mut Context, negate: bool) -> Result<(String, Vec<QueryParam>)> {
    let elements = coerce_array(value);
    if elements.len() != 2 {
        return Err(FlowgateError::build("between requires exactly two bounds"));
    }
    let lo = ctx.placeholder();
    let hi = ctx.placeholder();
    let keyword = if negate { "NOT BETWEEN" } else { "BETWEEN" };
    let args = elements.iter().map(QueryParam::from).collect();
    Ok((format!("{field} {keyword} {lo} AND {hi}"), args))
}

/// A list is used as-is; a string is comma-split with each part trimmed;
/// numeric parts parse as int then double; everything else stays a string.
fn coerce_array(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.clone(),
        Value::String(s) => s.split(',').map(|part| parse_scalar(part.trim())).collect(),
        other => vec![other.clone()],
    }
}

fn parse_scalar(part: &str) -> Value {
    if let Ok(i) = part.parse::<i64>() {
        Value::Number(i.into())
    } else if let Ok(d) = part.parse::<f64>() {
        serde_json::Number::from_f64(d).map_or_else(|| Value::String(part.to_string()), Value::Number)
    } else {
        Value::String(part.to_string())
    }
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
