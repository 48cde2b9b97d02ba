//! Driver adapter: per-dialect connection pool acquisition.
//!
//! Pools are lazily materialised the first time a `(dialect, host)` pair
//! is requested, guarded by a lock so concurrent first-requests don't
//! race to build duplicate pools (double-checked initialisation).

use std::sync::Arc;

use dashmap::DashMap;
use flowgate_config::{DataSourceSpec, DbConfig, Drive};
use flowgate_error::{FlowgateError, Result};
use parking_lot::{Mutex, MutexGuard};

use crate::traits::Connection;

#[cfg(feature = "mysql")]
mod mysql_conn;
#[cfg(feature = "mssql")]
mod mssql_conn;
#[cfg(feature = "sqlite")]
mod sqlite_conn;

enum DialectPool {
    #[cfg(feature = "mysql")]
    MySql(sqlx::MySqlPool),
    #[cfg(feature = "sqlite")]
    Sqlite(sqlx::SqlitePool),
    #[cfg(feature = "mssql")]
    Mssql(bb8::Pool<bb8_tiberius::ConnectionManager>),
}

/// Lazily-materialised per-dialect connection pools, keyed by the
/// `(dialect, host)` datasource key.
pub struct DriverAdapter {
    db_config: Arc<DbConfig>,
    pools: DashMap<(Drive, String), Arc<DialectPool>>,
    init_lock: Mutex<()>,
}

impl DriverAdapter {
    #[must_use]
    pub fn new(db_config: Arc<DbConfig>) -> Self {
        Self { db_config, pools: DashMap::new(), init_lock: Mutex::new(()) }
    }

    /// Acquire a checked-out connection for `(dialect, host)`, building
    /// the pool on first use.
    ///
    /// # Errors
    ///
    /// Returns a non-retryable [`FlowgateError::Driver`] if `host` is not
    /// registered under `dialect` in the `DbConfig`, or if the pool
    /// cannot be built/checked out.
    pub async fn connection(&self, dialect: Drive, host: &str) -> Result<Box<dyn Connection>> {
        let key = (dialect, host.to_string());
        let pool = if let Some(existing) = self.pools.get(&key) {
            Arc::clone(existing.value())
        } else {
            let guard = self.init_lock.lock();
            // Double-checked: another task may have built it while we
            // waited for the lock.
            let pool = if let Some(existing) = self.pools.get(&key) {
                Arc::clone(existing.value())
            } else {
                let spec = self
                    .db_config
                    .lookup(dialect, host)
                    .ok_or_else(|| FlowgateError::driver(format!("unknown datasource {dialect}/{host}")))?
                    .clone();
                let built = Arc::new(self.build_pool(dialect, &spec).await?);
                self.pools.insert(key.clone(), Arc::clone(&built));
                built
            };
            MutexGuard::unlock_fair(guard);
            pool
        };

        self.checkout(dialect, &pool).await
    }

    async fn build_pool(&self, dialect: Drive, spec: &DataSourceSpec) -> Result<DialectPool> {
        match dialect {
            #[cfg(feature = "mysql")]
            Drive::Mysql => mysql_conn::build_pool(spec).await.map(DialectPool::MySql),
            #[cfg(feature = "sqlite")]
            Drive::Sqlite => sqlite_conn::build_pool(spec).await.map(DialectPool::Sqlite),
            #[cfg(feature = "mssql")]
            Drive::Mssql => mssql_conn::build_pool(spec).await.map(DialectPool::Mssql),
            #[allow(unreachable_patterns)]
            other => Err(FlowgateError::driver(format!("dialect {other} not compiled in (missing feature)"))),
        }
    }

    async fn checkout(&self, dialect: Drive, pool: &DialectPool) -> Result<Box<dyn Connection>> {
        match (dialect, pool) {
            #[cfg(feature = "mysql")]
            (Drive::Mysql, DialectPool::MySql(p)) => mysql_conn::checkout(p).await,
            #[cfg(feature = "sqlite")]
            (Drive::Sqlite, DialectPool::Sqlite(p)) => sqlite_conn::checkout(p).await,
            #[cfg(feature = "mssql")]
            (Drive::Mssql, DialectPool::Mssql(p)) => mssql_conn::checkout(p).await,
            #[allow(unreachable_patterns)]
            _ => Err(FlowgateError::driver("dialect/pool mismatch")),
        }
    }
}
