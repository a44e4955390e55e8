//! Sync log error types.

use thiserror::Error;

/// Sync log error type.
#[derive(Error, Debug)]
pub enum SyncLogError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sync_database::DatabaseError),

    /// An entry with this idempotency key already exists
    #[error("Duplicate idempotency key: {0}")]
    DuplicateIdempotencyKey(String),

    /// Log entry not found
    #[error("Sync log entry not found: {0}")]
    EntryNotFound(i64),

    /// Source entity not found
    #[error("Entity not found: {entity_type} {entity_id}")]
    EntityNotFound {
        entity_type: String,
        entity_id: String,
    },

    /// Only terminal failures can be requeued
    #[error("Sync log entry {0} is not a terminal failure")]
    NotRequeueable(i64),
}

/// Result type alias using SyncLogError.
pub type SyncLogResult<T> = Result<T, SyncLogError>;
