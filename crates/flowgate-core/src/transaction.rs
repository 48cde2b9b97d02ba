//! Per-job transactional envelope over N datasource connections:
//! acquire-once-per-datasource, commit-or-rollback-all.
//!
//! This threads an explicit [`JobRunContext`] value down the job
//! executor's call stack instead of caching connections behind ambient
//! state — no thread-local, no inter-thread ordering obligations to
//! reason about.

use flowgate_db::Connection;
use flowgate_error::{FlowgateError, Result};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TxStatus {
    Fresh,
    Begun,
    Committed,
    RolledBack,
}

struct CachedConnection {
    conn: Box<dyn Connection>,
    transactional: bool,
    status: TxStatus,
}

/// The per-job connection cache: one entry per datasource key (`dialect +
/// host`), opened lazily by the first step that needs it and held until
/// job completion. Connections are tracked in insertion order so commits
/// happen in declaration order.
#[derive(Default)]
pub struct JobRunContext {
    order: Vec<String>,
    connections: std::collections::HashMap<String, CachedConnection>,
}

impl JobRunContext {
    #[must_use]
    pub fn new() -> Self {
        Self { order: Vec::new(), connections: std::collections::HashMap::new() }
    }

    /// Fetch the cached connection for `key`, opening (and, if
    /// `transactional`, beginning a transaction on) a fresh one via
    /// `opener` on first use.
    ///
    /// # Errors
    ///
    /// Propagates whatever `opener` or `begin`/`set_autocommit` return.
    pub async fn get_or_open<F, Fut>(&mut self, key: &str, transactional: bool, opener: F) -> Result<&mut Box<dyn Connection>>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<Box<dyn Connection>>>,
    {
        if !self.connections.contains_key(key) {
            let mut conn = opener().await?;
            let status = if transactional {
                conn.set_autocommit(false).await?;
                conn.begin().await?;
                TxStatus::Begun
            } else {
                TxStatus::Fresh
            };
            self.connections.insert(key.to_string(), CachedConnection { conn, transactional, status });
            self.order.push(key.to_string());
        }
        Ok(&mut self.connections.get_mut(key).expect("just inserted").conn)
    }

    /// Commit every registered transactional connection, in insertion
    /// order. If any commit fails after others already succeeded, roll
    /// back *every* registered connection as a best-effort compensation
    /// and report the partial-commit condition — already-committed work
    /// cannot be rewound, only flagged.
    ///
    /// # Errors
    ///
    /// [`FlowgateError::Transaction`] if any commit failed.
    pub async fn commit_all(&mut self) -> Result<()> {
        let mut committed_any = false;
        for key in self.order.clone() {
            let Some(entry) = self.connections.get_mut(&key) else { continue };
            if entry.transactional && entry.status == TxStatus::Begun {
                match entry.conn.commit().await {
                    Ok(()) => {
                        entry.status = TxStatus::Committed;
                        committed_any = true;
                    },
                    Err(e) => {
                        warn!(datasource = %key, error = %e, "commit failed; rolling back all registered connections");
                        self.rollback_all().await;
                        return Err(FlowgateError::Transaction {
                            message: format!("commit failed on datasource '{key}': {e}"),
                            partial_commit: committed_any,
                        });
                    },
                }
            }
        }
        Ok(())
    }

    /// Roll back every registered transactional connection that is still
    /// open. Per-connection rollback errors are logged, never propagated
    /// — a failed rollback must not prevent the others from being
    /// attempted.
    pub async fn rollback_all(&mut self) {
        for key in self.order.clone() {
            let Some(entry) = self.connections.get_mut(&key) else { continue };
            if entry.transactional && entry.status == TxStatus::Begun {
                if let Err(e) = entry.conn.rollback().await {
                    warn!(datasource = %key, error = %e, "rollback failed");
                } else {
                    entry.status = TxStatus::RolledBack;
                }
            }
        }
    }

    /// Close every cached connection, restoring autocommit where
    /// possible, and clear the cache. Always run in the job executor's
    /// `finally`-equivalent path, regardless of success or failure.
    pub async fn close_all(&mut self) {
        for key in self.order.drain(..) {
            if let Some(mut entry) = self.connections.remove(&key) {
                if entry.transactional {
                    if let Err(e) = entry.conn.set_autocommit(true).await {
                        warn!(datasource = %key, error = %e, "failed to restore autocommit while closing connection");
                    }
                }
            }
        }
        self.connections.clear();
    }

}

/// Build the `(dialect, host)` datasource key used to index
/// [`JobRunContext`] entries.
#[must_use]
pub fn datasource_key(drive: flowgate_config::Drive, host: &str) -> String {
    format!("{drive}/{host}")
}
