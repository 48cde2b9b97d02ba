//! The validator vocabulary: one rule kind per `type` tag in
//! a `ValidatorSpec`, each checked against a single raw JSON value.

use flowgate_error::{FlowgateError, Result};
use regex::Regex;
use serde_json::Value;

const CN_MOBILE_PATTERN: &str = r"^1[3-9]\d{9}$";
const EMAIL_PATTERN: &str = r"^[^@\s]+@[^@\s]+\.[^@\s]+$";
const IPV4_PATTERN: &str =
    r"^(25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)(\.(25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)){3}$";
const URL_PATTERN: &str = r"^[a-zA-Z][a-zA-Z0-9+.-]*://[^\s]+$";

/// Run a single `(kind, message, params)` validator against `value`.
/// `null` passes every validator except `required` — callers skip the
/// call entirely when the value is null and the kind isn't `required`.
pub fn check(kind: &str, message: Option<&str>, params: &serde_json::Map<String, Value>, value: &Value) -> Result<()> {
    if value.is_null() {
        return if kind.eq_ignore_ascii_case("required") {
            Err(fail(message, kind, "value is required"))
        } else {
            Ok(())
        };
    }

    match kind.to_ascii_lowercase().as_str() {
        "required" => Ok(()),
        "number" => as_f64(value).map(|_| ()).map_err(|_| fail(message, kind, "must be a number")),
        "integer" => {
            if value.as_i64().is_some() || as_f64(value).ok().is_some_and(|f| f.fract() == 0.0) {
                Ok(())
            } else {
                Err(fail(message, kind, "must be an integer"))
            }
        },
        "string" => {
            if value.is_string() {
                Ok(())
            } else {
                Err(fail(message, kind, "must be a string"))
            }
        },
        "min" => {
            let bound = param_f64(params, "value")?;
            let v = as_f64(value).map_err(|_| fail(message, kind, "must be numeric"))?;
            (v >= bound).then_some(()).ok_or_else(|| fail(message, kind, &format!("must be >= {bound}")))
        },
        "max" => {
            let bound = param_f64(params, "value")?;
            let v = as_f64(value).map_err(|_| fail(message, kind, "must be numeric"))?;
            (v <= bound).then_some(()).ok_or_else(|| fail(message, kind, &format!("must be <= {bound}")))
        },
        "minlength" => {
            let bound = param_usize(params, "value")?;
            let len = as_str(value)?.chars().count();
            (len >= bound).then_some(()).ok_or_else(|| fail(message, kind, &format!("length must be >= {bound}")))
        },
        "maxlength" => {
            let bound = param_usize(params, "value")?;
            let len = as_str(value)?.chars().count();
            (len <= bound).then_some(()).ok_or_else(|| fail(message, kind, &format!("length must be <= {bound}")))
        },
        "length" => {
            let expected = param_usize(params, "value")?;
            let len = as_str(value)?.chars().count();
            (len == expected).then_some(()).ok_or_else(|| fail(message, kind, &format!("length must be {expected}")))
        },
        "email" => regex_check(message, kind, EMAIL_PATTERN, as_str(value)?),
        "phone" => regex_check(message, kind, CN_MOBILE_PATTERN, as_str(value)?),
        "date" => {
            let pattern = params.get("pattern").and_then(Value::as_str).unwrap_or(r"^\d{4}-\d{2}-\d{2}$");
            regex_check(message, kind, pattern, as_str(value)?)
        },
        "boolean" => {
            if value.is_boolean() {
                Ok(())
            } else {
                Err(fail(message, kind, "must be a boolean"))
            }
        },
        "enum" => {
            let options = params
                .get("values")
                .and_then(Value::as_array)
                .ok_or_else(|| FlowgateError::validation("enum validator requires 'values'"))?;
            let matched = options.iter().any(|o| values_equal(o, value));
            matched.then_some(()).ok_or_else(|| fail(message, kind, "value not in allowed set"))
        },
        "pattern" => {
            let pattern = params
                .get("pattern")
                .and_then(Value::as_str)
                .ok_or_else(|| FlowgateError::validation("pattern validator requires 'pattern'"))?;
            regex_check(message, kind, pattern, as_str(value)?)
        },
        "ipv4" => regex_check(message, kind, IPV4_PATTERN, as_str(value)?),
        "url" => regex_check(message, kind, URL_PATTERN, as_str(value)?),
        "trim" => {
            let s = as_str(value)?;
            (s == s.trim()).then_some(()).ok_or_else(|| fail(message, kind, "must not have leading/trailing whitespace"))
        },
        other => Err(FlowgateError::validation(format!("unknown validator '{other}'"))),
    }
}

fn fail(message: Option<&str>, kind: &str, default: &str) -> FlowgateError {
    FlowgateError::validation(message.map_or_else(|| format!("{kind}: {default}"), ToString::to_string))
}

fn regex_check(message: Option<&str>, kind: &str, pattern: &str, value: &str) -> Result<()> {
    let re = Regex::new(pattern).map_err(|e| FlowgateError::validation(format!("invalid pattern '{pattern}': {e}")))?;
    if re.is_match(value) {
        Ok(())
    } else {
        Err(fail(message, kind, &format!("does not match pattern '{pattern}'")))
    }
}

fn as_f64(value: &Value) -> std::result::Result<f64, ()> {
    match value {
        Value::Number(n) => n.as_f64().ok_or(()),
        Value::String(s) => s.trim().parse().map_err(|_| ()),
        _ => Err(()),
    }
}

fn as_str(value: &Value) -> Result<&str> {
    value.as_str().ok_or_else(|| FlowgateError::validation("expected a string value"))
}

fn param_f64(params: &serde_json::Map<String, Value>, key: &str) -> Result<f64> {
    params
        .get(key)
        .and_then(Value::as_f64)
        .ok_or_else(|| FlowgateError::validation(format!("validator is missing numeric parameter '{key}'")))
}

fn param_usize(params: &serde_json::Map<String, Value>, key: &str) -> Result<usize> {
    params
        .get(key)
        .and_then(Value::as_u64)
        .map(|v| v as usize)
        .ok_or_else(|| FlowgateError::validation(format!("validator is missing numeric parameter '{key}'")))
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn empty() -> serde_json::Map<String, Value> {
        serde_json::Map::new()
    }

    #[test]
    fn null_passes_everything_but_required() {
        assert!(check("string", None, &empty(), &Value::Null).is_ok());
        assert!(check("required", None, &empty(), &Value::Null).is_err());
    }

    #[test]
    fn cn_phone_pattern() {
        assert!(check("phone", None, &empty(), &json!("13800000000")).is_ok());
        assert!(check("phone", None, &empty(), &json!("23800000000")).is_err());
    }

    #[test]
    fn min_max_bounds() {
        let mut params = serde_json::Map::new();
        params.insert("value".to_string(), json!(10));
        assert!(check("min", None, &params, &json!(10)).is_ok());
        assert!(check("min", None, &params, &json!(9)).is_err());
    }

    #[test]
    fn enum_accepts_listed_values_only() {
        let mut params = serde_json::Map::new();
        params.insert("values".to_string(), json!(["a", "b"]));
        assert!(check("enum", None, &params, &json!("a")).is_ok());
        assert!(check("enum", None, &params, &json!("c")).is_err());
    }

    #[test]
    fn custom_message_overrides_default() {
        let err = check("required", Some("name is mandatory"), &empty(), &Value::Null).unwrap_err();
        assert_eq!(err.to_string(), "name is mandatory");
    }
}
