//! Slow-query and audit log emission, plus the masking rules both apply.
//! Both are structured `tracing` events, never printed directly —
//! listener/log-emitter failures are swallowed: telemetry must never
//! fail the request it describes.

use std::sync::LazyLock;

use flowgate_db::QueryParam;
use regex::Regex;

static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"1[3-9]\d{9}").expect("valid regex"));
static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("valid regex"));
static SECRET_KV_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(password|token|secret)[:=]\s*[^,;}]+").expect("valid regex"));
static SECRET_WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)password|token|secret").expect("valid regex"));

/// Mask a free-form audit line: phone numbers, email addresses, then
/// `key=value`/`key:value` secrets.
#[must_use]
pub fn mask_audit_line(line: &str) -> String {
    let masked = PHONE_RE.replace_all(line, "***phone***");
    let masked = EMAIL_RE.replace_all(&masked, "***email***");
    SECRET_KV_RE.replace_all(&masked, "$1=***redacted***").into_owned()
}

/// Render one bound argument for a slow-query log line, redacting any
/// string value whose content suggests it carries a credential.
#[must_use]
pub fn mask_arg(arg: &QueryParam) -> String {
    match arg {
        QueryParam::Text(s) if SECRET_WORD_RE.is_match(s) => "***redacted***".to_string(),
        QueryParam::Text(s) => s.clone(),
        QueryParam::Int(i) => i.to_string(),
        QueryParam::Double(d) => d.to_string(),
        QueryParam::Bool(b) => b.to_string(),
        QueryParam::Null => "null".to_string(),
    }
}

/// Emit the slow-query log line for one compiled statement, if `cost_ms`
/// crossed the configured threshold and slow logging is enabled for this
/// endpoint.
pub fn log_slow_query(api_key: &str, sql: &str, args: &[QueryParam], cost_ms: u128, enabled: bool, threshold_ms: u64) {
    if !enabled || cost_ms < u128::from(threshold_ms) {
        return;
    }
    let masked_args: Vec<String> = args.iter().map(mask_arg).collect();
    tracing::warn!(target: "flowgate::slow_query", api_key, sql, args = ?masked_args, cost_ms, "slow query");
}

/// Emit one audit record for a completed request.
pub fn log_audit(api_key: &str, canonical_or_unsigned: &str, cost_ms: u128) {
    let masked = mask_audit_line(canonical_or_unsigned);
    tracing::info!(target: "flowgate::audit", api_key, signed_payload = masked, cost_ms, "request audit");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_chinese_mobile_numbers() {
        assert_eq!(mask_audit_line("phone=13800001111"), "phone=***phone***");
    }

    #[test]
    fn masks_email_addresses() {
        assert_eq!(mask_audit_line("contact a@b.com now"), "contact ***email*** now");
    }

    #[test]
    fn masks_password_token_secret_key_value_pairs() {
        assert_eq!(mask_audit_line("token=abc123,next=1"), "token=***redacted***,next=1");
        assert_eq!(mask_audit_line("password: hunter2}"), "password=***redacted***}");
    }

    #[test]
    fn slow_arg_masking_redacts_whole_value_not_substring() {
        assert_eq!(mask_arg(&QueryParam::Text("my_secret_value".to_string())), "***redacted***");
        assert_eq!(mask_arg(&QueryParam::Text("plain".to_string())), "plain");
    }
}
