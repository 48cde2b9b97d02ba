//! The request orchestrator: wires the registry, signature
//! check, rate limiter, parameter resolver and SQL builder into one
//! end-to-end call for a single endpoint, against a connection the
//! caller owns and is responsible for closing.

use std::time::Instant;

use flowgate_config::{AuthConfig, ConfigRegistry, EndpointDef, Operation, StandardParams};
use flowgate_db::{builder, Connection, ExecResult, RowMap};
use flowgate_error::{FlowgateError, Result};
use serde::Serialize;
use serde_json::Value;

use crate::{audit, rate_limit::RateLimiter, signature, validate};

/// Uniform outcome of one orchestrated request — the wire-level `Result`
/// shape.
#[derive(Debug, Clone, Serialize)]
pub struct ResultEnvelope {
    /// `200` on success, `500` on generic failure.
    pub code: u16,
    /// Mirrors `code == 200`.
    pub success: bool,
    /// `"ok"` on success, the failing error's message otherwise.
    pub msg: String,
    /// Row data for LIST/PAGE/DEEP_PAGE; absent for MODIFY.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// The windowed `TotalCount` column, lifted out of the first row for
    /// pagination responses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<i64>,
    /// Rows affected by a MODIFY.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affected_rows: Option<u64>,
    /// First generated key from an INSERT, if the driver reported one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_key: Option<i64>,
}

impl ResultEnvelope {
    #[must_use]
    pub fn fail(msg: impl Into<String>) -> Self {
        Self { code: 500, success: false, msg: msg.into(), data: None, total: None, affected_rows: None, generated_key: None }
    }

    fn ok_rows(rows: Vec<RowMap>) -> Self {
        let total = rows.first().and_then(|row| row.get("TotalCount")).and_then(Value::as_i64);
        let data = serde_json::to_value(&rows).unwrap_or(Value::Array(Vec::new()));
        Self { code: 200, success: true, msg: "ok".to_string(), data: Some(data), total, affected_rows: None, generated_key: None }
    }

    fn ok_modify(exec: ExecResult) -> Self {
        Self {
            code: 200,
            success: true,
            msg: "ok".to_string(),
            data: None,
            total: None,
            affected_rows: Some(exec.affected_rows),
            generated_key: exec.generated_key,
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.success
    }
}

impl From<FlowgateError> for ResultEnvelope {
    fn from(err: FlowgateError) -> Self {
        Self::fail(err.to_string())
    }
}

/// Wires the config registry and rate limiter; stateless otherwise — one
/// instance is shared across every request on a process.
pub struct Orchestrator {
    registry: std::sync::Arc<ConfigRegistry>,
    rate_limiter: RateLimiter,
}

impl Orchestrator {
    #[must_use]
    pub fn new(registry: std::sync::Arc<ConfigRegistry>, rate_limiter: RateLimiter) -> Self {
        Self { registry, rate_limiter }
    }

    /// Run one endpoint call end-to-end against `conn`, which the caller
    /// owns: the orchestrator never closes it.
    pub async fn handle(
        &self,
        api_key: &str,
        operation: Operation,
        params: &StandardParams,
        client_fingerprint: &str,
        conn: &mut dyn Connection,
    ) -> ResultEnvelope {
        match self.handle_inner(api_key, operation, params, client_fingerprint, conn).await {
            Ok(envelope) => envelope,
            Err(err) => ResultEnvelope::from(err),
        }
    }

    async fn handle_inner(
        &self,
        api_key: &str,
        operation: Operation,
        params: &StandardParams,
        client_fingerprint: &str,
        conn: &mut dyn Connection,
    ) -> Result<ResultEnvelope> {
        let start = Instant::now();

        let endpoint = self
            .registry
            .get_sql_config(api_key)
            .ok_or_else(|| FlowgateError::NotFound { what: "apiKey", key: api_key.to_string() })?;

        let auth = self.registry.get_effective_auth(endpoint.auth_config.as_ref());
        let merged = params.merged();

        let signed_payload = if endpoint.require_auth {
            let now = chrono::Utc::now().timestamp();
            let canonical = signature::verify(&auth, &merged, now)?;
            self.check_rate_limit(api_key, client_fingerprint, &auth)?;
            canonical
        } else {
            "unsigned".to_string()
        };

        let resolved = validate::resolve(&endpoint, params)?;

        let (sql, args) = compile(&endpoint, operation, &resolved)?;

        let outcome = if matches!(operation, Operation::Modify) {
            let exec = conn.execute(&sql, &args).await?;
            ResultEnvelope::ok_modify(exec)
        } else {
            let rows = conn.query(&sql, &args).await?;
            ResultEnvelope::ok_rows(rows)
        };

        let cost_ms = start.elapsed().as_millis();
        audit::log_slow_query(api_key, &sql, &args, cost_ms, auth.slow_log_enabled(), auth.slow_log_threshold_ms());
        audit::log_audit(api_key, &signed_payload, cost_ms);

        Ok(outcome)
    }

    fn check_rate_limit(&self, api_key: &str, client_fingerprint: &str, auth: &AuthConfig) -> Result<()> {
        let now_ms = chrono::Utc::now().timestamp_millis();
        self.rate_limiter.check(
            api_key,
            client_fingerprint,
            auth.rate_limit_max_reqs(),
            auth.rate_limit_window_secs(),
            auth.interval_min_ms(),
            now_ms,
        )
    }
}

/// Compile one endpoint operation into `{sql, args}`, switching a `Page`
/// request to the deep-page strategy when the resolved `current_page`
/// exceeds `shallowToDeepThreshold`.
fn compile(
    endpoint: &EndpointDef,
    operation: Operation,
    resolved: &std::collections::HashMap<String, Value>,
) -> Result<(String, Vec<flowgate_db::QueryParam>)> {
    let dialect = endpoint.db_drive.drive;
    match operation {
        Operation::Modify => builder::build_modify(endpoint, resolved, dialect),
        Operation::List => builder::build_list(endpoint, resolved, dialect),
        Operation::DeepPage => builder::build_deep_page(endpoint, resolved, dialect),
        Operation::Page => {
            let current_page = resolved.get("current_page").and_then(Value::as_i64).unwrap_or(1);
            if builder::should_deep_page(endpoint, current_page, false) {
                builder::build_deep_page(endpoint, resolved, dialect)
            } else {
                builder::build_page(endpoint, resolved, dialect)
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use flowgate_config::{DbDrive, Drive, EndpointDef};
    use flowgate_db::QueryParam;
    use serde_json::json;

    use super::*;

    struct FakeConnection {
        rows: Vec<RowMap>,
    }

    #[async_trait]
    impl Connection for FakeConnection {
        async fn query(&mut self, _sql: &str, _args: &[QueryParam]) -> Result<Vec<RowMap>> {
            Ok(self.rows.clone())
        }

        async fn execute(&mut self, _sql: &str, _args: &[QueryParam]) -> Result<ExecResult> {
            Ok(ExecResult { affected_rows: 1, generated_key: Some(42) })
        }

        async fn begin(&mut self) -> Result<()> {
            Ok(())
        }

        async fn commit(&mut self) -> Result<()> {
            Ok(())
        }

        async fn rollback(&mut self) -> Result<()> {
            Ok(())
        }

        async fn set_autocommit(&mut self, _on: bool) -> Result<()> {
            Ok(())
        }
    }

    fn endpoint() -> EndpointDef {
        EndpointDef {
            table_name: "users".to_string(),
            db_drive: DbDrive { drive: Drive::Sqlite, host: "main".to_string() },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn unauthenticated_endpoint_skips_signature_and_rate_limit() {
        let registry = ConfigRegistry::new_unchecked(std::env::temp_dir());
        registry.load_all("nonexistent/**/*").ok();
        // Seed directly rather than via the filesystem loader for a unit test.
        let orchestrator = Orchestrator::new(registry, RateLimiter::new());
        let mut conn = FakeConnection { rows: vec![RowMap::from([("id".to_string(), json!(1))])] };
        // apiKey not registered -> NotFound, proving the lookup runs first.
        let result = orchestrator.handle("missing", Operation::List, &StandardParams::default(), "c1", &mut conn).await;
        assert!(!result.success);
        assert_eq!(result.code, 500);
    }

    #[test]
    fn compile_switches_shallow_page_to_deep_page_past_threshold() {
        let mut endpoint = endpoint();
        endpoint.shallow_to_deep_threshold = 10;
        endpoint.sort = vec![flowgate_config::SortSpec { field: "id".to_string(), order: flowgate_config::SortOrder::Asc }];
        let resolved = std::collections::HashMap::from([("current_page".to_string(), json!(50))]);
        let (sql, _) = compile(&endpoint, Operation::Page, &resolved).unwrap();
        assert!(sql.contains("ROW_NUMBER()"));
    }

    #[test]
    fn compile_keeps_shallow_page_under_threshold() {
        let mut endpoint = endpoint();
        endpoint.shallow_to_deep_threshold = 10;
        let resolved = std::collections::HashMap::from([("current_page".to_string(), json!(2))]);
        let (sql, _) = compile(&endpoint, Operation::Page, &resolved).unwrap();
        assert!(sql.contains("WITH all_rows"));
    }
}
