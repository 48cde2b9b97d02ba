//! Declarative configuration documents: `EndpointDef`, `JobDef`,
//! `AuthConfig`, `DbConfig`, `StandardParams`.
//!
//! These are pure data — no behaviour lives here. The SQL builder and the
//! request orchestrator consume these types but are defined in other
//! crates (`flowgate-db`, `flowgate-core`) to keep the registry a leaf
//! dependency.

use std::{collections::HashMap, path::PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Logical datasource dialect. Only the three dialects the engine compiles
/// SQL for — no Postgres, no generic "other".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Drive {
    Mysql,
    Mssql,
    Sqlite,
}

impl Drive {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mysql => "mysql",
            Self::Mssql => "mssql",
            Self::Sqlite => "sqlite",
        }
    }
}

impl std::fmt::Display for Drive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A logical datasource key: dialect + host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DbDrive {
    pub drive: Drive,
    pub host: String,
}

/// Where a single incoming parameter is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ParamSource {
    Path,
    Query,
    Body,
    #[default]
    All,
}

/// Declared coercion target type for a resolved parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    #[default]
    String,
    Int,
    Long,
    Double,
    Boolean,
}

/// A single validator configuration. Kept loosely typed (`type` tag plus a
/// free-form parameter map) so adding a new validator is a runtime match
/// arm, not a schema migration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ValidatorSpec {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: Option<String>,
    #[serde(flatten)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

/// One entry of `EndpointDef.paramsMapping`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParamMapping {
    pub field: String,
    pub alias: Option<String>,
    pub source: ParamSource,
    pub data_type: DataType,
    pub validators: Vec<ValidatorSpec>,
}

impl Default for ParamMapping {
    fn default() -> Self {
        Self {
            field: String::new(),
            alias: None,
            source: ParamSource::default(),
            data_type: DataType::default(),
            validators: Vec::new(),
        }
    }
}

impl ParamMapping {
    /// The key this mapping emits into the resolved parameter map: `alias`
    /// if present, else `field`.
    #[must_use]
    pub fn output_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.field)
    }
}

/// `AND`/`OR` combinator for a `conditionSchema` entry's expanded fragments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Logic {
    #[default]
    And,
    Or,
}

/// How a single incoming parameter expands over one or more columns.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ConditionSchemaEntry {
    pub fields: Vec<String>,
    pub operator: String,
    pub logic: Logic,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortSpec {
    pub field: String,
    #[serde(default)]
    pub order: SortOrder,
}

/// A declarative endpoint: table, columns, allowed filters, mutable
/// fields, sort, pagination behaviour, auth rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EndpointDef {
    pub table_name: String,
    pub db_drive: DbDrive,
    pub field: Vec<String>,
    pub params_mapping: Vec<ParamMapping>,
    pub condition_schema: HashMap<String, ConditionSchemaEntry>,
    pub sort: Vec<SortSpec>,
    pub mutable_fields: Vec<String>,
    pub pk: String,
    pub action: Option<String>,
    pub preset_params: HashMap<String, serde_json::Value>,
    pub shallow_to_deep_threshold: u32,
    pub require_auth: bool,
    pub auth_config: Option<AuthConfig>,
    /// Populated by the registry at load time, never present in the
    /// source document.
    #[serde(skip)]
    pub source_file: Option<PathBuf>,
    #[serde(skip)]
    pub loaded_at: Option<DateTime<Utc>>,
}

impl Default for EndpointDef {
    fn default() -> Self {
        Self {
            table_name: String::new(),
            db_drive: DbDrive { drive: Drive::Mysql, host: String::new() },
            field: vec!["*".to_string()],
            params_mapping: Vec::new(),
            condition_schema: HashMap::new(),
            sort: Vec::new(),
            mutable_fields: Vec::new(),
            pk: "id".to_string(),
            action: None,
            preset_params: HashMap::new(),
            shallow_to_deep_threshold: 0,
            require_auth: false,
            auth_config: None,
            source_file: None,
            loaded_at: None,
        }
    }
}

impl EndpointDef {
    /// `true` if this definition is structurally usable: non-empty table.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.table_name.trim().is_empty()
    }
}

/// A job step: either a nested API call or a script invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JobStep {
    #[serde(rename = "type")]
    pub step_type: StepType,
    pub api_key: Option<String>,
    pub operation: Option<Operation>,
    pub script_type: Option<String>,
    pub script_content: Option<String>,
}

impl Default for JobStep {
    fn default() -> Self {
        Self {
            step_type: StepType::Api,
            api_key: None,
            operation: None,
            script_type: None,
            script_content: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepType {
    Api,
    Script,
}

/// The CRUD-ish operation an API step or direct request performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Modify,
    List,
    Page,
    DeepPage,
}

/// An ordered composite of steps executed under one transactional
/// envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JobDef {
    pub jobs: Vec<JobStep>,
    pub transaction: bool,
    pub require_auth: bool,
    pub auth_config: Option<AuthConfig>,
    #[serde(skip)]
    pub source_file: Option<PathBuf>,
    #[serde(skip)]
    pub loaded_at: Option<DateTime<Utc>>,
}

impl Default for JobDef {
    fn default() -> Self {
        Self {
            jobs: Vec::new(),
            transaction: true,
            require_auth: false,
            auth_config: None,
            source_file: None,
            loaded_at: None,
        }
    }
}

impl JobDef {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.jobs.is_empty()
    }
}

/// The six supported digest/HMAC algorithms for signature verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureAlgorithm {
    Md5,
    Sha1,
    Sha256,
    Hmacmd5,
    Hmacsha1,
    Hmacsha256,
}

/// Auth, signature, rate-limit and audit/slow-log policy. Global and
/// per-endpoint/job instances merge field-wise (non-null override wins).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthConfig {
    pub signature_expire: Option<u64>,
    pub rate_limit_window: Option<u64>,
    pub rate_limit_max: Option<u32>,
    pub interval_min: Option<u64>,
    pub signature_algorithm: Option<SignatureAlgorithm>,
    pub audit_field_prefix: Option<String>,
    pub audit_signature: Option<String>,
    pub audit_timestamp: Option<String>,
    pub secret: Option<String>,
    pub slow_log: Option<bool>,
    pub slow_log_threshold: Option<u64>,
    pub log_level: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            signature_expire: None,
            rate_limit_window: None,
            rate_limit_max: None,
            interval_min: None,
            signature_algorithm: None,
            audit_field_prefix: None,
            audit_signature: None,
            audit_timestamp: None,
            secret: None,
            slow_log: None,
            slow_log_threshold: None,
            log_level: None,
        }
    }
}

impl AuthConfig {
    /// Field-wise merge: every non-`None` field of `self` (the override)
    /// wins over `base` (the global config). A pure function rather than
    /// a reflective field-copy merge.
    #[must_use]
    pub fn merge_over(&self, base: &Self) -> Self {
        Self {
            signature_expire: self.signature_expire.or(base.signature_expire),
            rate_limit_window: self.rate_limit_window.or(base.rate_limit_window),
            rate_limit_max: self.rate_limit_max.or(base.rate_limit_max),
            interval_min: self.interval_min.or(base.interval_min),
            signature_algorithm: self.signature_algorithm.or(base.signature_algorithm),
            audit_field_prefix: self.audit_field_prefix.clone().or_else(|| base.audit_field_prefix.clone()),
            audit_signature: self.audit_signature.clone().or_else(|| base.audit_signature.clone()),
            audit_timestamp: self.audit_timestamp.clone().or_else(|| base.audit_timestamp.clone()),
            secret: self.secret.clone().or_else(|| base.secret.clone()),
            slow_log: self.slow_log.or(base.slow_log),
            slow_log_threshold: self.slow_log_threshold.or(base.slow_log_threshold),
            log_level: self.log_level.clone().or_else(|| base.log_level.clone()),
        }
    }

    #[must_use]
    pub fn signature_expire_secs(&self) -> u64 {
        self.signature_expire.unwrap_or(300)
    }

    #[must_use]
    pub fn rate_limit_window_secs(&self) -> u64 {
        self.rate_limit_window.unwrap_or(60)
    }

    #[must_use]
    pub fn rate_limit_max_reqs(&self) -> u32 {
        self.rate_limit_max.unwrap_or(100)
    }

    #[must_use]
    pub fn interval_min_ms(&self) -> u64 {
        self.interval_min.unwrap_or(0)
    }

    #[must_use]
    pub fn audit_field_prefix_str(&self) -> &str {
        self.audit_field_prefix.as_deref().unwrap_or("audit_")
    }

    #[must_use]
    pub fn audit_signature_key(&self) -> &str {
        self.audit_signature.as_deref().unwrap_or("signature")
    }

    #[must_use]
    pub fn audit_timestamp_key(&self) -> &str {
        self.audit_timestamp.as_deref().unwrap_or("timestamp")
    }

    #[must_use]
    pub fn slow_log_enabled(&self) -> bool {
        self.slow_log.unwrap_or(false)
    }

    /// `threshold = authConfig?.slowLogThreshold ?? 1000` — see DESIGN
    /// NOTES on the source's unboxing bug; this is the fixed contract.
    #[must_use]
    pub fn slow_log_threshold_ms(&self) -> u64 {
        self.slow_log_threshold.unwrap_or(1000)
    }
}

/// Pool sizing policy for one dialect/name entry of `DbConfig`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PoolPolicy {
    pub max: u32,
    pub min_idle: u32,
    pub connection_timeout_ms: u64,
    pub idle_timeout_ms: u64,
}

impl Default for PoolPolicy {
    fn default() -> Self {
        Self { max: 10, min_idle: 0, connection_timeout_ms: 5_000, idle_timeout_ms: 600_000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceSpec {
    pub host: String,
    #[serde(default)]
    pub pool: PoolPolicy,
}

/// Three name→spec mappings, one per dialect.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct DbConfig {
    pub mysql: HashMap<String, DataSourceSpec>,
    pub mssql: HashMap<String, DataSourceSpec>,
    pub sqlite: HashMap<String, DataSourceSpec>,
}

impl DbConfig {
    #[must_use]
    pub fn lookup(&self, drive: Drive, host: &str) -> Option<&DataSourceSpec> {
        match drive {
            Drive::Mysql => self.mysql.get(host),
            Drive::Mssql => self.mssql.get(host),
            Drive::Sqlite => self.sqlite.get(host),
        }
    }
}

/// One scalar-or-list parameter bucket (path, query, or body).
pub type ParamBucket = HashMap<String, serde_json::Value>;

/// The wire shape fed in from an HTTP/RPC front-end: three keyed mappings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StandardParams {
    #[serde(default)]
    pub path: ParamBucket,
    #[serde(default)]
    pub query: ParamBucket,
    #[serde(default)]
    pub body: ParamBucket,
}

impl StandardParams {
    /// Probe `path` → `body` → `query`, in that order, for `name`.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&serde_json::Value> {
        self.path.get(name).or_else(|| self.body.get(name)).or_else(|| self.query.get(name))
    }

    /// Union of every key across all three buckets, used to build the
    /// signature's canonical string and for rate-limit client
    /// fingerprinting fallbacks.
    #[must_use]
    pub fn merged(&self) -> ParamBucket {
        let mut out = self.query.clone();
        out.extend(self.body.clone());
        out.extend(self.path.clone());
        out
    }
}
