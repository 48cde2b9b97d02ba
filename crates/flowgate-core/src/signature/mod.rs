//! Request signature verification: canonical-string
//! construction, six digest/HMAC algorithms, constant-time comparison.

use std::collections::HashMap;

use flowgate_config::{AuthConfig, SignatureAlgorithm};
use flowgate_error::{FlowgateError, Result};
use hmac::{Hmac, Mac};
use md5::Md5;
use serde_json::Value;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Verify the submitted signature inside `params` against `auth`'s
/// policy. On success returns the canonical string that was signed, for
/// the audit logger to record alongside the request.
///
/// # Errors
///
/// [`FlowgateError::Signature`] if the timestamp/signature fields are
/// missing, the timestamp has expired, or the computed digest does not
/// match the submitted one.
pub fn verify(auth: &AuthConfig, params: &HashMap<String, Value>, now_seconds: i64) -> Result<String> {
    let timestamp_key = auth.audit_timestamp_key();
    let signature_key = auth.audit_signature_key();

    let timestamp_raw = params
        .get(timestamp_key)
        .ok_or_else(|| FlowgateError::signature("missing timestamp or signature"))?;
    let submitted = params
        .get(signature_key)
        .and_then(Value::as_str)
        .ok_or_else(|| FlowgateError::signature("missing timestamp or signature"))?;

    let timestamp = scalar_to_i64(timestamp_raw).ok_or_else(|| FlowgateError::signature("missing timestamp or signature"))?;

    let expire = i64::try_from(auth.signature_expire_secs()).unwrap_or(i64::MAX);
    if now_seconds - timestamp > expire {
        return Err(FlowgateError::signature("expired"));
    }

    let prefix = auth.audit_field_prefix_str();
    let canonical = canonical_string(params, prefix, signature_key, timestamp_key, &timestamp.to_string());

    let algorithm = auth.signature_algorithm.unwrap_or(SignatureAlgorithm::Sha256);
    let key = signing_key(auth, now_seconds);
    let computed = digest(algorithm, &canonical, &key);

    let matches: bool = computed.as_bytes().ct_eq(submitted.as_bytes()).into();
    if matches {
        Ok(canonical)
    } else {
        Err(FlowgateError::signature("verification failed"))
    }
}

/// `secret` if non-blank, else the first 9 decimal digits of
/// `now_seconds` (shorter if the timestamp itself has fewer digits).
/// Deterministic within the same wall-clock second.
fn signing_key(auth: &AuthConfig, now_seconds: i64) -> String {
    match &auth.secret {
        Some(s) if !s.trim().is_empty() => s.clone(),
        _ => {
            let digits = now_seconds.unsigned_abs().to_string();
            digits.chars().take(9).collect()
        },
    }
}

/// Ascending-lexicographic scan of prefixed keys (excluding the
/// signature key), `k=v&` concatenated, with `timestamp=<ts>` appended
/// last.
fn canonical_string(
    params: &HashMap<String, Value>,
    prefix: &str,
    signature_key: &str,
    timestamp_key: &str,
    timestamp: &str,
) -> String {
    let mut keys: Vec<&String> = params
        .keys()
        .filter(|k| k.starts_with(prefix) && k.as_str() != signature_key)
        .collect();
    keys.sort();

    let mut out = String::new();
    for key in keys {
        let value = scalar_to_string(&params[key]);
        out.push_str(key);
        out.push('=');
        out.push_str(&value);
        out.push('&');
    }
    out.push_str(timestamp_key);
    out.push('=');
    out.push_str(timestamp);
    out
}

fn digest(algorithm: SignatureAlgorithm, canonical: &str, key: &str) -> String {
    use base64::Engine as _;
    match algorithm {
        SignatureAlgorithm::Md5 => hex::encode(Md5::digest(format!("{canonical}{key}").as_bytes())),
        SignatureAlgorithm::Sha1 => hex::encode(Sha1::digest(format!("{canonical}{key}").as_bytes())),
        SignatureAlgorithm::Sha256 => hex::encode(Sha256::digest(format!("{canonical}{key}").as_bytes())),
        SignatureAlgorithm::Hmacmd5 => {
            base64::engine::general_purpose::STANDARD.encode(hmac_md5(canonical, key))
        },
        SignatureAlgorithm::Hmacsha1 => {
            base64::engine::general_purpose::STANDARD.encode(hmac_sha1(canonical, key))
        },
        SignatureAlgorithm::Hmacsha256 => {
            base64::engine::general_purpose::STANDARD.encode(hmac_sha256(canonical, key))
        },
    }
}

fn hmac_md5(canonical: &str, key: &str) -> Vec<u8> {
    let mut mac = Hmac::<Md5>::new_from_slice(key.as_bytes()).expect("HMAC accepts any key length");
    mac.update(canonical.as_bytes());
    mac.finalize().into_bytes().to_vec()
}

fn hmac_sha1(canonical: &str, key: &str) -> Vec<u8> {
    let mut mac = Hmac::<Sha1>::new_from_slice(key.as_bytes()).expect("HMAC accepts any key length");
    mac.update(canonical.as_bytes());
    mac.finalize().into_bytes().to_vec()
}

fn hmac_sha256(canonical: &str, key: &str) -> Vec<u8> {
    let mut mac = Hmac::<Sha256>::new_from_slice(key.as_bytes()).expect("HMAC accepts any key length");
    mac.update(canonical.as_bytes());
    mac.finalize().into_bytes().to_vec()
}

fn scalar_to_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn auth_with_secret(secret: &str, algorithm: SignatureAlgorithm) -> AuthConfig {
        AuthConfig { secret: Some(secret.to_string()), signature_algorithm: Some(algorithm), ..Default::default() }
    }

    #[test]
    fn mismatched_signature_is_rejected() {
        let auth = auth_with_secret("s3cr3t", SignatureAlgorithm::Sha256);
        let params = HashMap::from([
            ("audit_user".to_string(), json!("u")),
            ("timestamp".to_string(), json!(1_700_000_000)),
            ("signature".to_string(), json!("deadbeef")),
        ]);
        let err = verify(&auth, &params, 1_700_000_005).unwrap_err();
        assert!(err.to_string().contains("verification failed"));
    }

    #[test]
    fn expired_timestamp_is_rejected() {
        let mut auth = auth_with_secret("s3cr3t", SignatureAlgorithm::Sha256);
        auth.signature_expire = Some(60);
        let params = HashMap::from([
            ("timestamp".to_string(), json!(1_700_000_000)),
            ("signature".to_string(), json!("whatever")),
        ]);
        let err = verify(&auth, &params, 1_700_000_200).unwrap_err();
        assert!(err.to_string().contains("expired"));
    }

    #[test]
    fn computed_signature_round_trips() {
        let auth = auth_with_secret("s3cr3t", SignatureAlgorithm::Sha256);
        let mut params = HashMap::from([
            ("audit_user".to_string(), json!("u")),
            ("timestamp".to_string(), json!(1_700_000_000)),
        ]);
        let canonical = canonical_string(&params, "audit_", "signature", "timestamp", "1700000000");
        let computed = digest(SignatureAlgorithm::Sha256, &canonical, "s3cr3t");
        params.insert("signature".to_string(), json!(computed.clone()));

        let result = verify(&auth, &params, 1_700_000_005).unwrap();
        assert_eq!(result, canonical);
    }

    #[test]
    fn digest_is_a_pure_function() {
        let a = digest(SignatureAlgorithm::Hmacsha256, "canonical", "key");
        let b = digest(SignatureAlgorithm::Hmacsha256, "canonical", "key");
        assert_eq!(a, b);
    }
}
