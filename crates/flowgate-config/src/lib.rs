//! Configuration registry: loads, classifies, validates and hot-swaps
//! declarative `EndpointDef`/`JobDef`/`DbConfig`/`AuthConfig` documents
//! from a filesystem tree, across JSON/YAML/TOML.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::must_use_candidate, clippy::module_name_repetitions, clippy::missing_errors_doc)]

pub mod env;
pub mod formats;
pub mod model;
pub mod registry;
pub mod watch;

pub use model::{
    AuthConfig, ConditionSchemaEntry, DataSourceSpec, DataType, DbConfig, DbDrive, Drive, EndpointDef, JobDef,
    JobStep, Logic, Operation, ParamBucket, ParamMapping, ParamSource, PoolPolicy, SignatureAlgorithm, SortOrder,
    SortSpec, StandardParams, StepType, ValidatorSpec,
};
pub use registry::{ConfigKind, ConfigRegistry};
pub use watch::{watch, ReloadWatcher};

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn write_file(dir: &std::path::Path, rel: &str, contents: &str) {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut f = std::fs::File::create(path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
    }

    #[test]
    fn classifies_longest_prefix_and_skips_unmatched() {
        let tmp = tempfile::tempdir().unwrap();
        write_file(
            tmp.path(),
            "config/db-config.json",
            r#"{"mysql": {"m1": {"host": "localhost"}}, "mssql": {}, "sqlite": {}}"#,
        );
        write_file(
            tmp.path(),
            "config/sql-config-users.json",
            r#"{"getUser": {"tableName": "users", "dbDrive": {"drive": "mysql", "host": "m1"}}}"#,
        );
        write_file(tmp.path(), "config/random-config.json", r#"{"x": {}}"#);

        let registry = ConfigRegistry::new_unchecked(tmp.path());
        let report = registry.load_all("config/**/*").unwrap();
        assert!(report.warnings.is_empty(), "{:?}", report.warnings);
        assert!(registry.get_sql_config("getUser").is_some());
    }

    #[test]
    fn missing_sql_and_job_files_are_not_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        write_file(tmp.path(), "config/db-config.json", r#"{"mysql": {}, "mssql": {}, "sqlite": {}}"#);
        let registry = ConfigRegistry::new_unchecked(tmp.path());
        let report = registry.load_all("config/**/*").unwrap();
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn invalid_entry_is_skipped_not_fatal_for_the_batch() {
        let tmp = tempfile::tempdir().unwrap();
        write_file(tmp.path(), "config/db-config.json", r#"{"mysql": {}, "mssql": {}, "sqlite": {}}"#);
        write_file(
            tmp.path(),
            "config/sql-config.json",
            r#"{"good": {"tableName": "t", "dbDrive": {"drive": "sqlite", "host": "x"}}, "bad": {"tableName": ""}}"#,
        );
        let registry = ConfigRegistry::new_unchecked(tmp.path());
        let report = registry.load_all("config/**/*").unwrap();
        assert_eq!(report.warnings.len(), 1);
        assert!(registry.get_sql_config("good").is_some());
        assert!(registry.get_sql_config("bad").is_none());
    }

    #[test]
    fn missing_db_config_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = ConfigRegistry::new_unchecked(tmp.path());
        assert!(registry.load_all("config/**/*").is_err());
    }

    #[test]
    fn duplicate_keys_last_write_wins_if_valid() {
        let tmp = tempfile::tempdir().unwrap();
        write_file(tmp.path(), "config/db-config.json", r#"{"mysql": {}, "mssql": {}, "sqlite": {}}"#);
        write_file(
            tmp.path(),
            "config/sql-config-a.json",
            r#"{"dup": {"tableName": "first", "dbDrive": {"drive": "sqlite", "host": "x"}}}"#,
        );
        write_file(
            tmp.path(),
            "config/sql-config-b.json",
            r#"{"dup": {"tableName": "second", "dbDrive": {"drive": "sqlite", "host": "x"}}}"#,
        );
        let registry = ConfigRegistry::new_unchecked(tmp.path());
        registry.load_all("config/**/*").unwrap();
        // glob ordering across two files isn't guaranteed, but whichever
        // loaded last should be present and the earlier one gone entirely.
        let got = registry.get_sql_config("dup").unwrap();
        assert!(got.table_name == "first" || got.table_name == "second");
    }

    #[test]
    fn effective_auth_merges_override_over_global() {
        let global = AuthConfig { secret: Some("g".into()), rate_limit_max: Some(10), ..AuthConfig::default() };
        let over = AuthConfig { rate_limit_max: Some(5), ..AuthConfig::default() };
        let merged = over.merge_over(&global);
        assert_eq!(merged.rate_limit_max, Some(5));
        assert_eq!(merged.secret.as_deref(), Some("g"));
    }

    #[test]
    fn standard_params_probe_order_is_path_then_body_then_query() {
        let mut sp = StandardParams::default();
        sp.query.insert("id".into(), serde_json::json!("from-query"));
        sp.body.insert("id".into(), serde_json::json!("from-body"));
        assert_eq!(sp.param("id").unwrap(), &serde_json::json!("from-body"));
        sp.path.insert("id".into(), serde_json::json!("from-path"));
        assert_eq!(sp.param("id").unwrap(), &serde_json::json!("from-path"));
    }
}
