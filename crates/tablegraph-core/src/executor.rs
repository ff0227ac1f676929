//! Batch executor: bounded-concurrency fan-out of partition-scoped batches.
//!
//! Each group targets one (table, partition key) pair and is submitted as
//! one batch call, split into sub-batches when it exceeds the service's
//! per-call limit. Groups fail independently; a failing group never cancels
//! siblings already dispatched. Outcomes are aggregated into a
//! [`BatchReport`] identifying the rows confirmed committed and the rest.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::row::RowId;
use crate::store::{BatchOp, TableStore, MAX_BATCH_SIZE};

/// Concurrency bound used when the caller does not supply one.
pub const DEFAULT_PARALLELISM: usize = 4;

/// All operations destined for one (table, partition key) pair, in the
/// order the graph mapper emitted them.
#[derive(Debug)]
pub struct BatchGroup {
    /// Target table.
    pub table: String,
    /// Partition key shared by every op in the group.
    pub partition_key: String,
    /// Ordered operations.
    pub ops: Vec<BatchOp>,
}

/// A row that was not confirmed committed, with the reason.
#[derive(Debug, Clone)]
pub struct FailedRow {
    /// Identity of the row.
    pub id: RowId,
    /// Service-reported or transport-level reason.
    pub reason: String,
}

/// Aggregated outcome of a fan-out.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// Rows the service confirmed committed.
    pub committed: Vec<RowId>,
    /// Rows not confirmed committed.
    pub failed: Vec<FailedRow>,
    /// True when cancellation stopped dispatch before all groups ran.
    pub cancelled: bool,
}

impl BatchReport {
    /// True when every dispatched row committed and nothing was skipped.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && !self.cancelled
    }

    fn merge(&mut self, other: BatchReport) {
        self.committed.extend(other.committed);
        self.failed.extend(other.failed);
        self.cancelled |= other.cancelled;
    }
}

/// Executes batch groups against the storage service.
pub struct BatchExecutor {
    store: Arc<dyn TableStore>,
}

impl BatchExecutor {
    /// Create an executor over the given store handle.
    pub fn new(store: Arc<dyn TableStore>) -> Self {
        Self { store }
    }

    /// Run `groups` with at most `parallelism` in flight.
    ///
    /// A raised `cancel` token stops dispatching new groups; groups already
    /// dispatched run to completion and their outcomes are reported, with
    /// `cancelled` set on the returned report.
    pub async fn execute(
        &self,
        groups: Vec<BatchGroup>,
        parallelism: usize,
        cancel: &CancellationToken,
    ) -> BatchReport {
        let semaphore = Arc::new(Semaphore::new(parallelism.max(1)));
        let mut tasks = JoinSet::new();
        let mut report = BatchReport::default();

        for group in groups {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            let permit = tokio::select! {
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
                _ = cancel.cancelled() => {
                    report.cancelled = true;
                    break;
                }
            };
            let store = self.store.clone();
            tasks.spawn(async move {
                let _permit = permit;
                run_group(store, group).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(group_report) => report.merge(group_report),
                Err(e) => warn!(error = %e, "batch group task failed to join"),
            }
        }
        report
    }
}

/// Submit one group, splitting it at the service batch-size limit.
/// Sub-batches run sequentially, preserving emission order within the group.
async fn run_group(store: Arc<dyn TableStore>, group: BatchGroup) -> BatchReport {
    let BatchGroup {
        table,
        partition_key,
        mut ops,
    } = group;
    debug!(
        table = %table,
        partition = %partition_key,
        ops = ops.len(),
        "dispatching batch group"
    );

    let mut report = BatchReport::default();
    while !ops.is_empty() {
        let rest = if ops.len() > MAX_BATCH_SIZE {
            ops.split_off(MAX_BATCH_SIZE)
        } else {
            Vec::new()
        };
        let row_keys: Vec<String> = ops.iter().map(|op| op.row_key().to_string()).collect();

        match store.submit_batch(&table, &partition_key, ops).await {
            Ok(outcomes) => {
                for outcome in outcomes {
                    let id = RowId::new(&table, &partition_key, &outcome.row_key);
                    if outcome.committed {
                        report.committed.push(id);
                    } else {
                        report.failed.push(FailedRow {
                            id,
                            reason: outcome
                                .reason
                                .unwrap_or_else(|| "not confirmed".to_string()),
                        });
                    }
                }
            }
            Err(e) => {
                warn!(
                    table = %table,
                    partition = %partition_key,
                    error = %e,
                    "batch submit failed"
                );
                for row_key in row_keys {
                    report.failed.push(FailedRow {
                        id: RowId::new(&table, &partition_key, row_key),
                        reason: e.to_string(),
                    });
                }
            }
        }
        ops = rest;
    }
    report
}
