//! Environment / process-property resolution: `DB_CONFIG_PATH`,
//! `AUTH_CONFIG_PATH`, `CONFIG_PATTERN`. A process property (a same-named
//! JVM-style `-D`/CLI override, modelled here as an explicit `overrides`
//! map passed in by the embedder) wins over the environment variable.

use std::collections::HashMap;

pub const DEFAULT_CONFIG_PATTERN: &str = "config/**/*";

#[must_use]
pub fn resolve(name: &str, overrides: &HashMap<String, String>, default: Option<&str>) -> Option<String> {
    overrides.get(name).cloned().or_else(|| std::env::var(name).ok()).or_else(|| default.map(str::to_string))
}

#[must_use]
pub fn config_pattern(overrides: &HashMap<String, String>) -> String {
    resolve("CONFIG_PATTERN", overrides, Some(DEFAULT_CONFIG_PATTERN))
        .unwrap_or_else(|| DEFAULT_CONFIG_PATTERN.to_string())
}
