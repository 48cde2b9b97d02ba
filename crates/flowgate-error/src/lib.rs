//! Unified error type for every `flowgate` crate.
//!
//! Every fallible operation in the engine returns [`Result<T>`], an alias
//! over [`FlowgateError`]. The variants mirror the error-kind table of the
//! request-processing pipeline: config loading, signature verification,
//! rate limiting, parameter validation, SQL building, driver execution,
//! script execution and transaction coordination each get their own
//! variant so callers can match on *kind* without string-sniffing messages.

#![allow(missing_docs)]

use serde::Serialize;

/// Result type alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, FlowgateError>;

/// The single error type produced by the engine.
///
/// Language/transport bindings (an HTTP front-end, a job scheduler) convert
/// this into their own wire shape; the engine itself never serialises it
/// directly.
#[derive(Debug, thiserror::Error)]
pub enum FlowgateError {
    /// Required configuration missing or malformed with no usable default.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// A single entry inside a config batch failed validation; the batch
    /// itself still loads the rest. Not raised as an `Err` from the loader —
    /// collected into a [`crate::LoadReport`] instead — but kept here so
    /// call sites that want to surface one explicitly still can.
    #[error("configuration entry '{key}' skipped: {message}")]
    ConfigEntryWarning { key: String, message: String },

    /// Signature verification failed: missing fields, expired, or digest
    /// mismatch.
    #[error("signature error: {message}")]
    Signature { message: String },

    /// Sliding-window rate limit or minimum-interval debounce rejected the
    /// request.
    #[error("rate limit error: {message}")]
    RateLimit { message: String },

    /// A parameter validator rejected an incoming value.
    #[error("{message}")]
    Validation { message: String },

    /// The SQL builder could not compile a statement: unsupported operator,
    /// missing sort on a deep page, empty insert/update column set, or an
    /// update with no filter.
    #[error("{message}")]
    Build { message: String },

    /// The underlying driver/pool/connection failed.
    #[error("driver error: {message}")]
    Driver { message: String },

    /// A script step raised.
    #[error("script error: {message}")]
    Script { message: String },

    /// A commit failed after some connections in the job had already been
    /// committed; best-effort compensating rollback was attempted against
    /// every registered connection.
    #[error("transaction error: {message} (partial commit: {partial_commit})")]
    Transaction { message: String, partial_commit: bool },

    /// The requested `apiKey`/`jobKey` has no registered definition.
    #[error("not found: {what} '{key}'")]
    NotFound { what: &'static str, key: String },
}

impl FlowgateError {
    /// Stable machine-readable discriminant, used in audit/slow-query log
    /// lines and any future wire mapping.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config_error",
            Self::ConfigEntryWarning { .. } => "config_entry_warning",
            Self::Signature { .. } => "signature_error",
            Self::RateLimit { .. } => "rate_limit_error",
            Self::Validation { .. } => "validation_error",
            Self::Build { .. } => "build_error",
            Self::Driver { .. } => "driver_error",
            Self::Script { .. } => "script_error",
            Self::Transaction { .. } => "transaction_error",
            Self::NotFound { .. } => "not_found",
        }
    }

    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config { message: message.into() }
    }

    #[must_use]
    pub fn signature(message: impl Into<String>) -> Self {
        Self::Signature { message: message.into() }
    }

    #[must_use]
    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::RateLimit { message: message.into() }
    }

    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into() }
    }

    #[must_use]
    pub fn build(message: impl Into<String>) -> Self {
        Self::Build { message: message.into() }
    }

    #[must_use]
    pub fn driver(message: impl Into<String>) -> Self {
        Self::Driver { message: message.into() }
    }
}

/// Outcome of a config batch load: how many entries loaded, and which ones
/// were skipped with why. Mirrors spec's "partial success is allowed."
#[derive(Debug, Default, Serialize)]
pub struct LoadReport {
    pub loaded: usize,
    pub warnings: Vec<String>,
}

impl LoadReport {
    pub fn push_warning(&mut self, key: &str, err: &FlowgateError) {
        self.warnings.push(format!("{key}: {err}"));
    }
}
