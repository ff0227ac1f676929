//! Storage service collaborator seam.
//!
//! The engine talks to the table service exclusively through [`TableStore`]:
//! upsert-one, paged query with continuation, partition-scoped batch submit
//! with per-operation outcomes, and delete-one. Transport, authentication,
//! and retries all live behind implementations of this trait.

use async_trait::async_trait;
use thiserror::Error;

use crate::row::TableRow;

pub mod memory;

/// Largest number of operations the service accepts in one batch call.
pub const MAX_BATCH_SIZE: usize = 100;

/// Errors surfaced by a storage service implementation.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The filter text was rejected by the service.
    #[error("invalid filter: {0}")]
    InvalidFilter(String),
    /// The continuation token was not one the service issued.
    #[error("invalid continuation token: {0}")]
    InvalidContinuation(String),
    /// A batch exceeded the service's per-call operation limit.
    #[error("batch of {0} operations exceeds the limit of {MAX_BATCH_SIZE}")]
    BatchTooLarge(usize),
    /// The service could not be reached or refused the call.
    #[error("service unavailable: {0}")]
    Unavailable(String),
}

/// One page of query results plus the token to fetch the next page.
#[derive(Debug, Clone)]
pub struct Page {
    /// Rows in this page.
    pub rows: Vec<TableRow>,
    /// Opaque resumption token; `None` when the scan is exhausted.
    pub continuation: Option<String>,
}

/// A single operation inside a partition-scoped batch.
#[derive(Debug, Clone)]
pub enum BatchOp {
    /// Insert-or-replace a row.
    Upsert(TableRow),
    /// Remove the row with this row key.
    Delete {
        /// Row key within the batch's partition.
        row_key: String,
    },
}

impl BatchOp {
    /// The row key this operation targets.
    pub fn row_key(&self) -> &str {
        match self {
            BatchOp::Upsert(row) => &row.row_key,
            BatchOp::Delete { row_key } => row_key,
        }
    }
}

/// Per-operation commit outcome from a batch submit.
#[derive(Debug, Clone)]
pub struct OpOutcome {
    /// Row key the operation targeted.
    pub row_key: String,
    /// Whether the service confirmed the commit.
    pub committed: bool,
    /// Failure reason when not committed.
    pub reason: Option<String>,
}

/// The partitioned table storage service.
///
/// Implementations must be safe for concurrent use; the batch executor
/// fans out calls against a shared handle.
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Insert-or-replace one row.
    async fn upsert(&self, table: &str, row: TableRow) -> Result<(), StoreError>;

    /// Scan a table with filter text, optionally scoped to one partition.
    /// Empty filter text matches every row. Resumes from `continuation`
    /// when given.
    async fn query(
        &self,
        table: &str,
        filter: &str,
        partition_key: Option<&str>,
        continuation: Option<&str>,
    ) -> Result<Page, StoreError>;

    /// Submit an ordered batch scoped to one partition. The batch is
    /// applied in order; the result reports one outcome per operation.
    async fn submit_batch(
        &self,
        table: &str,
        partition_key: &str,
        ops: Vec<BatchOp>,
    ) -> Result<Vec<OpOutcome>, StoreError>;

    /// Remove one row. Removing an absent row is not an error.
    async fn delete(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> Result<(), StoreError>;
}
