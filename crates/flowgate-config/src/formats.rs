//! Per-extension deserialisation. Adding a format is adding one entry to
//! [`deserialize_bytes`].

use flowgate_error::{FlowgateError, Result};
use serde::de::DeserializeOwned;

/// Deserialise `bytes` as `T`, dispatching on the file extension
/// (`json`, `yaml`/`yml`, `toml`).
pub fn deserialize_bytes<T: DeserializeOwned>(extension: &str, bytes: &[u8]) -> Result<T> {
    match extension.to_ascii_lowercase().as_str() {
        "json" => serde_json::from_slice(bytes)
            .map_err(|e| FlowgateError::config(format!("invalid json: {e}"))),
        "yaml" | "yml" => serde_yaml::from_slice(bytes)
            .map_err(|e| FlowgateError::config(format!("invalid yaml: {e}"))),
        "toml" => {
            let text = std::str::from_utf8(bytes)
                .map_err(|e| FlowgateError::config(format!("invalid utf8: {e}")))?;
            toml::from_str(text).map_err(|e| FlowgateError::config(format!("invalid toml: {e}")))
        },
        other => Err(FlowgateError::config(format!("unsupported config extension: {other}"))),
    }
}

/// Extensions tried, in order, when a base path is given without one
/// (`db-config` → `db-config.json`, then `.yaml`, then `.yml`).
pub const CANDIDATE_EXTENSIONS: &[&str] = &["json", "yaml", "yml"];
