//! Parameter resolution and validation: turns a raw
//! [`StandardParams`] triple into the flat `resolved` map the SQL builder
//! consumes.

mod rules;

use std::collections::HashMap;

use flowgate_config::{EndpointDef, ParamMapping, ParamSource, DataType, StandardParams};
use flowgate_error::{FlowgateError, Result};
use serde_json::Value;

/// Resolve and validate every `paramsMapping` entry of `endpoint` against
/// `params`, then layer in the primary key (if present) and the computed
/// `action` value (if `endpoint.action` names a param).
///
/// A mapping whose fetched raw value is absent falls back to
/// `endpoint.preset_params[mapping.field]` before validators or coercion
/// run, so a preset can satisfy a `required` validator and still goes
/// through the same type coercion a caller-supplied value would.
///
/// Deterministic: the same `(endpoint, params)` pair always yields the
/// same resolved map, independent of `HashMap` iteration order, because
/// each output key is computed independently from its own mapping entry.
pub fn resolve(endpoint: &EndpointDef, params: &StandardParams) -> Result<HashMap<String, Value>> {
    let mut resolved = HashMap::with_capacity(endpoint.params_mapping.len() + 2);

    for mapping in &endpoint.params_mapping {
        let raw = fetch(mapping, params);
        let raw = if raw.is_null() {
            endpoint.preset_params.get(&mapping.field).cloned().unwrap_or(raw)
        } else {
            raw
        };
        for validator in &mapping.validators {
            rules::check(&validator.kind, validator.message.as_deref(), &validator.params, &raw)?;
        }
        let coerced = coerce(&raw, mapping.data_type)?;
        resolved.insert(mapping.output_key().to_string(), coerced);
    }

    if let Some(pk_value) = params.param(&endpoint.pk) {
        resolved.entry(endpoint.pk.clone()).or_insert_with(|| pk_value.clone());
    }

    if let Some(action_key) = &endpoint.action {
        if let Some(action_value) = params.param(action_key) {
            resolved.insert(action_key.clone(), action_value.clone());
        }
    }

    Ok(resolved)
}

fn fetch(mapping: &ParamMapping, params: &StandardParams) -> Value {
    let value = match mapping.source {
        ParamSource::Path => params.path.get(&mapping.field),
        ParamSource::Query => params.query.get(&mapping.field),
        ParamSource::Body => params.body.get(&mapping.field),
        ParamSource::All => {
            return params.path.get(&mapping.field).or_else(|| params.body.get(&mapping.field))
                .or_else(|| params.query.get(&mapping.field))
                .cloned()
                .unwrap_or(Value::Null);
        },
    };
    value.cloned().unwrap_or(Value::Null)
}

fn coerce(value: &Value, data_type: DataType) -> Result<Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    match data_type {
        DataType::String => Ok(Value::String(scalar_to_string(value))),
        DataType::Int | DataType::Long => {
            let i = as_i64(value).ok_or_else(|| FlowgateError::validation(format!("cannot coerce '{value}' to integer")))?;
            Ok(Value::Number(i.into()))
        },
        DataType::Double => {
            let f = as_f64(value).ok_or_else(|| FlowgateError::validation(format!("cannot coerce '{value}' to double")))?;
            serde_json::Number::from_f64(f)
                .map(Value::Number)
                .ok_or_else(|| FlowgateError::validation("double coercion produced a non-finite value"))
        },
        DataType::Boolean => {
            let b = as_bool(value).ok_or_else(|| FlowgateError::validation(format!("cannot coerce '{value}' to boolean")))?;
            Ok(Value::Bool(b))
        },
    }
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        Value::Number(n) => n.as_i64().map(|i| i != 0),
        _ => None,
    }
}
