//! Connection trait for the embedded graph store

use crate::{Result, Row};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Result of a statement that modifies data (INSERT/UPDATE/DELETE)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    /// Number of rows changed by the statement
    pub changes: u64,
    /// Rowid of the most recently inserted row
    pub last_insert_rowid: i64,
}

/// A handle to the embedded graph store
///
/// This is the capability the connection pool hands out to callers. The
/// pool owns all lifecycle bookkeeping; callers only ever see this trait.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Execute a statement that modifies data, returning change counts
    async fn run(&self, sql: &str, params: &[Value]) -> Result<RunResult>;

    /// Execute a query and return the first row, if any
    async fn get(&self, sql: &str, params: &[Value]) -> Result<Option<Row>>;

    /// Execute a query and return all rows
    async fn all(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>>;

    /// Execute a batch of statements without parameters or results
    async fn exec(&self, sql: &str) -> Result<()>;

    /// Cheap liveness round-trip, used by pool validation
    async fn ping(&self) -> Result<()>;

    /// Close the connection
    async fn close(&self) -> Result<()>;

    /// Check if the connection is closed
    fn is_closed(&self) -> bool;
}
