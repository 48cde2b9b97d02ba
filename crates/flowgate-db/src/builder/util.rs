//! Small helpers shared by the pagination builders.

use std::collections::HashMap;

use serde_json::Value;

/// Read an integer-valued param, accepting a JSON number or a numeric
/// string, falling back to `default` when absent, null, or unparsable.
pub fn int_param(params: &HashMap<String, Value>, key: &str, default: i64) -> i64 {
    match params.get(key) {
        Some(Value::Number(n)) => n.as_i64().unwrap_or(default),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(default),
        _ => default,
    }
}

pub fn opt_int_param(params: &HashMap<String, Value>, key: &str) -> Option<i64> {
    match params.get(key) {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
}

/// `offset = max(0, (current_page - 1) * page_size)`.
#[must_use]
pub fn shallow_offset(current_page: i64, page_size: i64) -> i64 {
    ((current_page - 1) * page_size).max(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_page_offset_is_zero() {
        assert_eq!(shallow_offset(1, 10), 0);
    }

    #[test]
    fn zero_or_negative_page_clamps_to_zero_offset() {
        assert_eq!(shallow_offset(0, 10), 0);
        assert_eq!(shallow_offset(-5, 10), 0);
    }

    #[test]
    fn later_page_offsets_forward() {
        assert_eq!(shallow_offset(2, 5), 5);
    }
}
