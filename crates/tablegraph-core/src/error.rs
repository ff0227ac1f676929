//! Core error types.

use thiserror::Error;

use crate::executor::BatchReport;
use crate::store::StoreError;

/// Errors raised by the persistence engine.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid entity declaration or unregistered navigation target.
    /// Raised at registration time or on first use; never recoverable by retry.
    #[error("registration error: {0}")]
    Registration(String),

    /// An operation was attempted on a type that was never registered.
    #[error("type '{0}' is not registered")]
    NotRegistered(String),

    /// Predicate compilation failed; a caller bug, not a runtime condition.
    #[error("filter compilation failed: {0}")]
    Compile(#[from] tablegraph_filter::CompileError),

    /// Storage service error on a read path.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// The blocking adapter could not build its runtime.
    #[error("runtime error: {0}")]
    Runtime(#[from] std::io::Error),

    /// Best-effort fan-out completed with unconfirmed rows.
    #[error("persistence failure: {} row(s) not confirmed committed", report.failed.len())]
    Persistence {
        /// Per-row outcomes, including the rows that failed.
        report: BatchReport,
    },

    /// Cancellation was raised; completed group outcomes are surfaced.
    #[error("cancelled after {} committed row(s)", report.committed.len())]
    Cancelled {
        /// Outcomes of groups that completed before cancellation.
        report: BatchReport,
    },

    /// Recursive hydration exceeded the fixed depth bound; the registered
    /// navigation graph is assumed acyclic, so this indicates a cycle.
    #[error("navigation graph exceeded maximum hydration depth {0}")]
    MaxDepth(usize),
}
