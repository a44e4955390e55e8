//! Scheduler error types.

use thiserror::Error;

/// Scheduler error type.
///
/// Only failures of the pass itself (claiming, reconciling) surface here;
/// per-entry failures are recorded on the entries.
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sync_database::DatabaseError),
}

/// Result type alias using SchedulerError.
pub type SchedulerResult<T> = Result<T, SchedulerError>;
