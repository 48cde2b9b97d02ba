//! Result and parameter types shared across dialect adapters.

use std::collections::HashMap;

/// A single bound SQL parameter value, preserving the JSON type through
/// to wire-level binding.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryParam {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    Text(String),
}

impl From<&serde_json::Value> for QueryParam {
    fn from(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Int(i)
                } else {
                    Self::Double(n.as_f64().unwrap_or_default())
                }
            },
            serde_json::Value::String(s) => Self::Text(s.clone()),
            other => Self::Text(other.to_string()),
        }
    }
}

/// A generic result row: column name to JSON value. The engine performs
/// no ORM-style mapping — rows are opaque maps all the way to the caller.
pub type RowMap = HashMap<String, serde_json::Value>;

/// Outcome of an INSERT/UPDATE execution.
#[derive(Debug, Clone, Default)]
pub struct ExecResult {
    pub affected_rows: u64,
    pub generated_key: Option<i64>,
}
