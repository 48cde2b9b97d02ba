//! The connection contract the orchestrator and job executor depend on.
//! Concrete implementations live behind the `mysql`/`mssql`/`sqlite`
//! Cargo features in [`crate::pool`]; the connection-pool *library* for
//! each backend is an external collaborator the core only reaches
//! through this trait.

use async_trait::async_trait;
use flowgate_error::Result;

use crate::types::{ExecResult, QueryParam, RowMap};

/// A checked-out database connection capable of running a compiled
/// statement and of participating in the transactional envelope.
#[async_trait]
pub trait Connection: Send {
    /// Run a query that returns rows (LIST/PAGE/DEEP_PAGE).
    async fn query(&mut self, sql: &str, args: &[QueryParam]) -> Result<Vec<RowMap>>;

    /// Run a statement that mutates rows (MODIFY), returning affected-row
    /// count and, for an INSERT against an auto-increment PK, the first
    /// generated key.
    async fn execute(&mut self, sql: &str, args: &[QueryParam]) -> Result<ExecResult>;

    /// Disable autocommit and start a transaction.
    async fn begin(&mut self) -> Result<()>;

    async fn commit(&mut self) -> Result<()>;

    async fn rollback(&mut self) -> Result<()>;

    /// Restore autocommit, best-effort, as part of connection teardown.
    async fn set_autocommit(&mut self, on: bool) -> Result<()>;
}
