//! The job-flow executor: runs an ordered sequence of API and
//! script steps under one multi-datasource transactional envelope.

pub mod script;

use std::{collections::HashMap, sync::Arc, time::Instant};

use flowgate_config::{ConfigRegistry, StandardParams, StepType};
use flowgate_db::DriverAdapter;
use flowgate_error::{FlowgateError, Result};
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::{orchestrator::Orchestrator, rate_limit::RateLimiter, signature, transaction::{datasource_key, JobRunContext}};

pub use script::{Executor, NoopExecutor};

/// One step's outcome, in declared order, mirroring the wire-level
/// `JobResult.steps[]` shape.
#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    /// `step_{index}_{api|script}`, matching the shared step-result
    /// context key this step was published under.
    pub step_name: String,
    /// Whether this step completed without error.
    pub success: bool,
    /// Wall-clock duration of this step alone.
    pub step_time_ms: u128,
    /// The step's output, published into the shared context for later
    /// steps to read. Absent on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// The failing error's message. Absent on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of one job run — the wire-level `JobResult` shape.
#[derive(Debug, Clone, Serialize)]
pub struct JobResult {
    /// Whether every step ran and every opened transaction committed.
    pub success: bool,
    /// `"ok"` on success, the failing step's or commit's error otherwise.
    pub msg: String,
    /// Wall-clock duration of the whole run, steps plus commit/rollback.
    pub total_time_ms: u128,
    /// Per-step outcomes, in declared order.
    pub steps: Vec<StepRecord>,
}

impl JobResult {
    fn fail(msg: impl Into<String>, total_time_ms: u128, steps: Vec<StepRecord>) -> Self {
        Self { success: false, msg: msg.into(), total_time_ms, steps }
    }
}

/// Runs [`flowgate_config::JobDef`]s: ordered API/script steps, shared
/// step-result context, per-datasource transactional envelope.
pub struct JobExecutor {
    registry: Arc<ConfigRegistry>,
    orchestrator: Arc<Orchestrator>,
    driver: Arc<DriverAdapter>,
    rate_limiter: RateLimiter,
    executors: HashMap<String, Arc<dyn Executor>>,
}

impl JobExecutor {
    #[must_use]
    pub fn new(registry: Arc<ConfigRegistry>, orchestrator: Arc<Orchestrator>, driver: Arc<DriverAdapter>, rate_limiter: RateLimiter) -> Self {
        Self { registry, orchestrator, driver, rate_limiter, executors: HashMap::new() }
    }

    /// Register a script executor under its lower-cased `script_type()`.
    pub fn register_executor(&mut self, executor: Arc<dyn Executor>) {
        self.executors.insert(executor.script_type().to_ascii_lowercase(), executor);
    }

    /// Run `job_key` end to end: signature/rate-limit check, then every
    /// step in order, then commit-or-rollback-all.
    pub async fn run(&self, job_key: &str, params: &StandardParams, client_fingerprint: &str) -> JobResult {
        let start = Instant::now();

        let Some(job) = self.registry.get_job_config(job_key) else {
            return JobResult::fail(format!("job '{job_key}' not found"), start.elapsed().as_millis(), Vec::new());
        };
        if job.jobs.is_empty() {
            return JobResult::fail("job has no steps", start.elapsed().as_millis(), Vec::new());
        }

        let auth = self.registry.get_effective_auth(job.auth_config.as_ref());
        let merged = params.merged();
        if job.require_auth {
            let now = chrono::Utc::now().timestamp();
            if let Err(e) = signature::verify(&auth, &merged, now) {
                return JobResult::fail(e.to_string(), start.elapsed().as_millis(), Vec::new());
            }
            let now_ms = chrono::Utc::now().timestamp_millis();
            if let Err(e) = self.rate_limiter.check(
                job_key,
                client_fingerprint,
                auth.rate_limit_max_reqs(),
                auth.rate_limit_window_secs(),
                auth.interval_min_ms(),
                now_ms,
            ) {
                return JobResult::fail(e.to_string(), start.elapsed().as_millis(), Vec::new());
            }
        }

        let mut ctx = JobRunContext::new();
        let mut context: serde_json::Map<String, Value> =
            merged.into_iter().collect::<serde_json::Map<String, Value>>();
        let mut steps = Vec::with_capacity(job.jobs.len());
        let mut failure: Option<String> = None;

        for (index, step) in job.jobs.iter().enumerate() {
            let step_start = Instant::now();
            let type_tag = match step.step_type {
                StepType::Api => "api",
                StepType::Script => "script",
            };
            let step_name = format!("step_{index}_{type_tag}");

            let outcome = match step.step_type {
                StepType::Api => self.run_api_step(step, params, client_fingerprint, job.transaction, &mut ctx).await,
                StepType::Script => self.run_script_step(step, &context).await,
            };

            let step_time_ms = step_start.elapsed().as_millis();
            match outcome {
                Ok(data) => {
                    context.insert(step_name.clone(), data.clone());
                    steps.push(StepRecord { step_name, success: true, step_time_ms, data: Some(data), error: None });
                },
                Err(e) => {
                    steps.push(StepRecord { step_name, success: false, step_time_ms, data: None, error: Some(e.to_string()) });
                    failure = Some(e.to_string());
                    break;
                },
            }
        }

        let total_time_ms;
        let result = if let Some(msg) = failure {
            ctx.rollback_all().await;
            total_time_ms = start.elapsed().as_millis();
            JobResult { success: false, msg, total_time_ms, steps }
        } else {
            match ctx.commit_all().await {
                Ok(()) => {
                    total_time_ms = start.elapsed().as_millis();
                    JobResult { success: true, msg: "ok".to_string(), total_time_ms, steps }
                },
                Err(e) => {
                    total_time_ms = start.elapsed().as_millis();
                    JobResult { success: false, msg: e.to_string(), total_time_ms, steps }
                },
            }
        };
        ctx.close_all().await;
        result
    }

    async fn run_api_step(
        &self,
        step: &flowgate_config::JobStep,
        params: &StandardParams,
        client_fingerprint: &str,
        transactional: bool,
        ctx: &mut JobRunContext,
    ) -> Result<Value> {
        let api_key = step.api_key.as_deref().ok_or_else(|| FlowgateError::build("api step missing apiKey"))?;
        let operation = step.operation.ok_or_else(|| FlowgateError::build("api step missing operation"))?;
        let endpoint = self
            .registry
            .get_sql_config(api_key)
            .ok_or_else(|| FlowgateError::NotFound { what: "apiKey", key: api_key.to_string() })?;

        let key = datasource_key(endpoint.db_drive.drive, &endpoint.db_drive.host);
        let drive = endpoint.db_drive.drive;
        let host = endpoint.db_drive.host.clone();
        let driver = Arc::clone(&self.driver);
        let conn = ctx.get_or_open(&key, transactional, || async move { driver.connection(drive, &host).await }).await?;

        let envelope = self.orchestrator.handle(api_key, operation, params, client_fingerprint, conn.as_mut()).await;
        if !envelope.is_success() {
            return Err(FlowgateError::driver(envelope.msg));
        }
        serde_json::to_value(&envelope).map_err(|e| FlowgateError::driver(e.to_string()))
    }

    async fn run_script_step(&self, step: &flowgate_config::JobStep, context: &serde_json::Map<String, Value>) -> Result<Value> {
        let script_type = step.script_type.as_deref().unwrap_or_default().to_ascii_lowercase();
        let content = step.script_content.as_deref().unwrap_or_default();
        let executor = self
            .executors
            .get(&script_type)
            .ok_or_else(|| FlowgateError::Script { message: format!("no executor registered for scriptType '{script_type}'") })?;
        executor.execute(content, context).await.map_err(|e| {
            warn!(script_type, error = %e, "script step failed");
            e
        })
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use flowgate_config::{DbDrive, Drive, EndpointDef, JobDef, JobStep, Operation, StepType};
    use flowgate_db::Connection;
    use serde_json::json;

    use super::*;

    struct AlwaysFailExecutor;

    #[async_trait]
    impl Executor for AlwaysFailExecutor {
        async fn execute(&self, _source: &str, _bindings: &serde_json::Map<String, Value>) -> Result<Value> {
            Err(FlowgateError::Script { message: "boom".to_string() })
        }

        fn script_type(&self) -> &'static str {
            "js"
        }
    }

    fn registry_with(job_key: &str, job: JobDef, endpoint_key: &str, endpoint: EndpointDef) -> Arc<ConfigRegistry> {
        registry_with_sqlite_host(job_key, job, endpoint_key, endpoint, "file::memory:")
    }

    fn registry_with_sqlite_host(
        job_key: &str,
        job: JobDef,
        endpoint_key: &str,
        endpoint: EndpointDef,
        sqlite_host: &str,
    ) -> Arc<ConfigRegistry> {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("config")).unwrap();
        std::fs::write(
            tmp.path().join("config/db-config.json"),
            format!(r#"{{"mysql": {{}}, "mssql": {{}}, "sqlite": {{"main": {{"host": "{sqlite_host}"}}}}}}"#),
        )
        .unwrap();
        let registry = ConfigRegistry::new_unchecked(tmp.path());
        registry.load_all("config/**/*").unwrap();
        // Seed directly: these tests exercise orchestration logic, not the
        // filesystem loader (covered in flowgate-config's own tests).
        registry.test_seed_sql(endpoint_key, endpoint);
        registry.test_seed_job(job_key, job);
        registry
    }

    fn sqlite_endpoint() -> EndpointDef {
        EndpointDef {
            table_name: "t".to_string(),
            db_drive: DbDrive { drive: Drive::Sqlite, host: "main".to_string() },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn job_with_no_steps_fails_immediately() {
        let registry = registry_with("empty", JobDef { jobs: Vec::new(), ..Default::default() }, "ep", sqlite_endpoint());
        let orchestrator = Arc::new(Orchestrator::new(Arc::clone(&registry), RateLimiter::new()));
        let driver = Arc::new(DriverAdapter::new(registry.get_db_config()));
        let executor = JobExecutor::new(registry, orchestrator, driver, RateLimiter::new());
        let result = executor.run("empty", &StandardParams::default(), "c1").await;
        assert!(!result.success);
        assert!(result.msg.contains("no steps"));
    }

    /// A job with an `api` insert step followed by a
    /// throwing `script` step rolls back the api step's datasource and
    /// reports both step outcomes, even though the job never gets far
    /// enough to commit anything.
    #[tokio::test]
    async fn api_step_then_failing_script_step_rolls_back_and_records_both_steps() {
        let db_dir = tempfile::tempdir().unwrap();
        let db_path = db_dir.path().join("scenario_f.db");
        let sqlite_host = format!("sqlite://{}?mode=rwc", db_path.display());

        let endpoint = EndpointDef {
            table_name: "t".to_string(),
            mutable_fields: vec!["name".to_string()],
            db_drive: DbDrive { drive: Drive::Sqlite, host: "main".to_string() },
            ..Default::default()
        };
        let job = JobDef {
            jobs: vec![
                JobStep { step_type: StepType::Api, api_key: Some("ep".to_string()), operation: Some(Operation::Modify), ..Default::default() },
                JobStep {
                    step_type: StepType::Script,
                    script_type: Some("js".to_string()),
                    script_content: Some("throw".to_string()),
                    ..Default::default()
                },
            ],
            transaction: true,
            ..Default::default()
        };
        let registry = registry_with_sqlite_host("f1", job, "ep", endpoint, &sqlite_host);
        let orchestrator = Arc::new(Orchestrator::new(Arc::clone(&registry), RateLimiter::new()));
        let driver = Arc::new(DriverAdapter::new(registry.get_db_config()));

        // Lay down the target table ahead of time, on the same file the job
        // executor will open through the same `DriverAdapter`.
        let mut setup = driver.connection(Drive::Sqlite, "main").await.unwrap();
        setup.execute("CREATE TABLE t (name TEXT)", &[]).await.unwrap();
        drop(setup);

        let mut executor = JobExecutor::new(registry, orchestrator, driver, RateLimiter::new());
        executor.register_executor(Arc::new(AlwaysFailExecutor));

        let params = StandardParams { body: HashMap::from([("name".to_string(), json!("x"))]), ..Default::default() };
        let result = executor.run("f1", &params, "c1").await;

        assert!(!result.success);
        assert_eq!(result.steps.len(), 2);
        assert!(result.steps[0].success, "api insert step should have run before the script step failed");
        assert!(!result.steps[1].success);
        assert_eq!(result.steps[0].step_name, "step_0_api");
        assert_eq!(result.steps[1].step_name, "step_1_script");

        // Rolled back: the row never persisted once the connection closed.
        let mut verify = driver.connection(Drive::Sqlite, "main").await.unwrap();
        let rows = verify.query("SELECT * FROM t", &[]).await.unwrap();
        assert!(rows.is_empty(), "insert from the failed job must have been rolled back");
    }

    #[tokio::test]
    async fn script_step_failure_is_recorded_as_unsuccessful_step() {
        let job = JobDef {
            jobs: vec![JobStep {
                step_type: StepType::Script,
                script_type: Some("js".to_string()),
                script_content: Some("boom".to_string()),
                ..Default::default()
            }],
            transaction: false,
            ..Default::default()
        };
        let registry = registry_with("j1", job, "ep", sqlite_endpoint());
        let orchestrator = Arc::new(Orchestrator::new(Arc::clone(&registry), RateLimiter::new()));
        let driver = Arc::new(DriverAdapter::new(registry.get_db_config()));
        let mut executor = JobExecutor::new(registry, orchestrator, driver, RateLimiter::new());
        executor.register_executor(Arc::new(AlwaysFailExecutor));
        let result = executor.run("j1", &StandardParams::default(), "c1").await;
        assert!(!result.success);
        assert_eq!(result.steps.len(), 1);
        assert!(!result.steps[0].success);
        assert_eq!(result.steps[0].step_name, "step_0_script");
    }
}
