//! Dispatcher error types.

use thiserror::Error;

/// Dispatcher error type.
///
/// Delivery failures are not errors here: they are recorded on the log
/// entry. These variants cover the bookkeeping itself failing.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sync_database::DatabaseError),

    /// Log entry vanished between claim and read-back
    #[error("Sync log entry not found: {0}")]
    EntryNotFound(i64),

    /// Concurrency permits were closed (engine shutting down)
    #[error("Dispatcher is shutting down")]
    ShuttingDown,
}

/// Result type alias using DispatchError.
pub type DispatchResult<T> = Result<T, DispatchError>;
