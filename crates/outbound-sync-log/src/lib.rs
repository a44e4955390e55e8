//! Durable outbound sync log.
//!
//! Every logical change to deliver is one row of `outbound_sync_log`, keyed
//! by its idempotency key. Enqueueing the same key twice returns the
//! existing row. Rows are never deleted; they are the audit trail of every
//! write-back.

mod entities;
mod error;
mod store;

pub use entities::EntityRepository;
pub use error::{SyncLogError, SyncLogResult};
pub use store::SyncLog;
