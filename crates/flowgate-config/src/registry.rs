//! The configuration registry: load, classify, validate and hot-swap
//! `EndpointDef`/`JobDef`/`DbConfig`/`AuthConfig` documents from a
//! filesystem tree.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Arc, OnceLock},
};

use dashmap::DashMap;
use flowgate_error::{FlowgateError, LoadReport, Result};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::{
    formats::{deserialize_bytes, CANDIDATE_EXTENSIONS},
    model::{AuthConfig, DbConfig, EndpointDef, JobDef},
};

/// Which document kind a listener is being notified about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKind {
    Db,
    Sql,
    Job,
    Auth,
}

/// Filename-prefix → document-kind classification table. Longest match
/// wins; a file whose basename matches neither prefix is skipped.
const CLASSIFIERS: &[(&str, ConfigKind)] = &[("sql-config", ConfigKind::Sql), ("job-config", ConfigKind::Job)];

type Listener = Box<dyn Fn(ConfigKind) + Send + Sync>;

/// Process-wide identity guard: `ConfigRegistry::open` is effectively a
/// per-process singleton keyed by `baseDir`, implemented as an explicit
/// identity check rather than relying on class-initialisation guarantees.
static BASE_DIR_IDENTITY: OnceLock<PathBuf> = OnceLock::new();

/// Hot-reloadable, prefix-classified configuration registry.
pub struct ConfigRegistry {
    base_dir: PathBuf,
    sql: DashMap<String, Arc<EndpointDef>>,
    job: DashMap<String, Arc<JobDef>>,
    db: RwLock<Arc<DbConfig>>,
    auth: RwLock<Arc<AuthConfig>>,
    listeners: RwLock<Vec<Listener>>,
    write_gate: RwLock<()>,
}

impl ConfigRegistry {
    /// Open the process-singleton registry rooted at `base_dir`. A second
    /// call from elsewhere in the process with a *different* `base_dir`
    /// fails — the instance is effectively singleton-per-process.
    pub fn open(base_dir: impl Into<PathBuf>) -> Result<Arc<Self>> {
        let base_dir = base_dir.into();
        let established = BASE_DIR_IDENTITY.get_or_init(|| base_dir.clone());
        if established != &base_dir {
            return Err(FlowgateError::config(format!(
                "config registry already initialised with base_dir {}; cannot reopen with {}",
                established.display(),
                base_dir.display()
            )));
        }
        Ok(Self::new_unchecked(base_dir))
    }

    /// Construct a registry without the process-identity check. Intended
    /// for tests that need more than one independent registry in the same
    /// process.
    #[must_use]
    pub fn new_unchecked(base_dir: impl Into<PathBuf>) -> Arc<Self> {
        Arc::new(Self {
            base_dir: base_dir.into(),
            sql: DashMap::new(),
            job: DashMap::new(),
            db: RwLock::new(Arc::new(DbConfig::default())),
            auth: RwLock::new(Arc::new(AuthConfig::default())),
            listeners: RwLock::new(Vec::new()),
            write_gate: RwLock::new(()),
        })
    }

    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[must_use]
    pub fn get_sql_config(&self, api_key: &str) -> Option<Arc<EndpointDef>> {
        self.sql.get(api_key).map(|e| Arc::clone(e.value()))
    }

    #[must_use]
    pub fn get_job_config(&self, job_key: &str) -> Option<Arc<JobDef>> {
        self.job.get(job_key).map(|e| Arc::clone(e.value()))
    }

    /// Insert an endpoint definition directly, bypassing the filesystem
    /// loader. Exposed for dependent crates' tests (orchestrator, job
    /// executor) that need a populated registry without standing up a
    /// config tree on disk.
    pub fn test_seed_sql(&self, api_key: &str, endpoint: EndpointDef) {
        self.sql.insert(api_key.to_string(), Arc::new(endpoint));
    }

    /// See [`Self::test_seed_sql`].
    pub fn test_seed_job(&self, job_key: &str, job: JobDef) {
        self.job.insert(job_key.to_string(), Arc::new(job));
    }

    #[must_use]
    pub fn get_db_config(&self) -> Arc<DbConfig> {
        Arc::clone(&self.db.read())
    }

    /// The effective auth config: `override` field-wise merged over the
    /// global config, falling back to just the global config when no
    /// override is given.
    #[must_use]
    pub fn get_effective_auth(&self, over: Option<&AuthConfig>) -> AuthConfig {
        let global = self.auth.read();
        match over {
            Some(o) => o.merge_over(&global),
            None => (**global).clone(),
        }
    }

    pub fn subscribe(&self, listener: impl Fn(ConfigKind) + Send + Sync + 'static) {
        self.listeners.write().push(Box::new(listener));
    }

    fn notify(&self, kinds: impl IntoIterator<Item = ConfigKind>) {
        let listeners = self.listeners.read();
        for kind in kinds {
            for listener in listeners.iter() {
                let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| listener(kind)));
                if result.is_err() {
                    warn!(?kind, "config registry listener panicked; ignoring");
                }
            }
        }
    }

    /// Full bootstrap: load `db-config`, `auth-config`, then every
    /// `sql-config*`/`job-config*` file matching `pattern` under
    /// `base_dir`.
    pub fn load_all(&self, pattern: &str) -> Result<LoadReport> {
        let _gate = self.write_gate.write();
        let mut report = LoadReport::default();

        self.load_db_config_locked(&mut report)?;
        self.load_auth_config_locked(&mut report);

        let mut touched = Vec::new();
        self.incremental_load_locked(pattern, &mut report, &mut touched);
        touched.push(ConfigKind::Db);
        touched.push(ConfigKind::Auth);
        drop(_gate);
        self.notify(touched);
        Ok(report)
    }

    /// Rescan only files matching `pattern` (sql/job documents). Used both
    /// at startup and by the hot-reload watcher.
    pub fn incremental_load(&self, pattern: &str) -> LoadReport {
        let _gate = self.write_gate.write();
        let mut report = LoadReport::default();
        let mut touched = Vec::new();
        self.incremental_load_locked(pattern, &mut report, &mut touched);
        drop(_gate);
        self.notify(touched);
        report
    }

    fn incremental_load_locked(&self, pattern: &str, report: &mut LoadReport, touched: &mut Vec<ConfigKind>) {
        let full_pattern = self.base_dir.join(pattern);
        let full_pattern = full_pattern.to_string_lossy().into_owned();
        let entries = match glob::glob(&full_pattern) {
            Ok(paths) => paths,
            Err(e) => {
                warn!(pattern = %full_pattern, error = %e, "invalid config glob pattern");
                return;
            },
        };

        let mut touched_sql = false;
        let mut touched_job = false;

        for entry in entries {
            let path = match entry {
                Ok(p) => p,
                Err(e) => {
                    warn!(error = %e, "error walking config tree");
                    continue;
                },
            };
            if !path.is_file() {
                continue;
            }
            let Some(ext) = path.extension().and_then(|e| e.to_str()) else { continue };
            if !CANDIDATE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else { continue };

            let Some(kind) = classify(stem) else {
                debug!(file = %path.display(), "config file matches no known prefix; skipped");
                continue;
            };

            match kind {
                ConfigKind::Sql => {
                    if self.load_map_into::<EndpointDef>(&path, &self.sql, report) {
                        touched_sql = true;
                    }
                },
                ConfigKind::Job => {
                    if self.load_map_into::<JobDef>(&path, &self.job, report) {
                        touched_job = true;
                    }
                },
                ConfigKind::Db | ConfigKind::Auth => unreachable!("not produced by classify()"),
            }
        }

        if touched_sql {
            touched.push(ConfigKind::Sql);
        }
        if touched_job {
            touched.push(ConfigKind::Job);
        }
    }

    /// Load one file as `map<string, T>`, validating and upserting each
    /// entry. Malformed entries are skipped, not fatal; a malformed *file*
    /// (the top-level document doesn't parse as a map at all) is also
    /// only a warning — missing SQL/Job files are not required.
    fn load_map_into<T>(&self, path: &Path, target: &DashMap<String, Arc<T>>, report: &mut LoadReport) -> bool
    where
        T: DeserializeOwned + Validatable + 'static,
    {
        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) => {
                report.push_warning(&path.display().to_string(), &FlowgateError::config(e.to_string()));
                return false;
            },
        };
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
        let raw: HashMap<String, serde_json::Value> = match deserialize_bytes(ext, &bytes) {
            Ok(m) => m,
            Err(e) => {
                report.push_warning(&path.display().to_string(), &e);
                return false;
            },
        };

        let mut any = false;
        for (key, value) in raw {
            let key = key.trim().to_string();
            if key.is_empty() || value.is_null() {
                report.push_warning(&key, &FlowgateError::config("empty key or null value"));
                continue;
            }
            let mut entry: T = match serde_json::from_value(value) {
                Ok(e) => e,
                Err(e) => {
                    report.push_warning(&key, &FlowgateError::config(e.to_string()));
                    continue;
                },
            };
            if !entry.is_valid() {
                report.push_warning(&key, &FlowgateError::config("failed validation"));
                continue;
            }
            entry.stamp_source(path.to_path_buf());
            target.insert(key, Arc::new(entry));
            any = true;
        }
        any
    }

    fn load_db_config_locked(&self, report: &mut LoadReport) -> Result<()> {
        match self.read_known::<DbConfig>("db-config") {
            Ok(Some(cfg)) => {
                *self.db.write() = Arc::new(cfg);
                Ok(())
            },
            Ok(None) => Err(FlowgateError::config("db-config is required and was not found")),
            Err(e) => {
                report.push_warning("db-config", &e);
                Err(e)
            },
        }
    }

    fn load_auth_config_locked(&self, report: &mut LoadReport) {
        match self.read_known::<AuthConfig>("auth-config") {
            Ok(Some(cfg)) => *self.auth.write() = Arc::new(cfg),
            Ok(None) => debug!("auth-config not found; using defaults"),
            Err(e) => report.push_warning("auth-config", &e),
        }
    }

    /// Try `{base_dir}/config/{stem}.{ext}` for each candidate extension
    /// in order, returning the first that parses.
    fn read_known<T: DeserializeOwned>(&self, stem: &str) -> Result<Option<T>> {
        for ext in CANDIDATE_EXTENSIONS {
            let path = self.base_dir.join("config").join(format!("{stem}.{ext}"));
            if !path.is_file() {
                continue;
            }
            let bytes = std::fs::read(&path)
                .map_err(|e| FlowgateError::config(format!("reading {}: {e}", path.display())))?;
            return deserialize_bytes(ext, &bytes).map(Some);
        }
        Ok(None)
    }
}

fn classify(filename_stem: &str) -> Option<ConfigKind> {
    CLASSIFIERS
        .iter()
        .filter(|(prefix, _)| filename_stem.starts_with(prefix))
        .max_by_key(|(prefix, _)| prefix.len())
        .map(|(_, kind)| *kind)
}

/// Per-entry validation hook implemented by `EndpointDef`/`JobDef`, plus a
/// write-once provenance stamp used by the registry at load time.
pub trait Validatable {
    fn is_valid(&self) -> bool;
    fn stamp_source(&mut self, path: PathBuf);
}

impl Validatable for EndpointDef {
    fn is_valid(&self) -> bool {
        Self::is_valid(self)
    }

    fn stamp_source(&mut self, path: PathBuf) {
        self.source_file = Some(path);
        self.loaded_at = Some(chrono::Utc::now());
    }
}

impl Validatable for JobDef {
    fn is_valid(&self) -> bool {
        Self::is_valid(self)
    }

    fn stamp_source(&mut self, path: PathBuf) {
        self.source_file = Some(path);
        self.loaded_at = Some(chrono::Utc::now());
    }
}
