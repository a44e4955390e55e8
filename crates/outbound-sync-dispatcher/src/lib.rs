//! Delivery of outbound sync log entries to their target systems.
//!
//! The [`Dispatcher`] claims an entry, sends it through the registered
//! [`SyncTarget`](sync_target_clients::SyncTarget), and records the outcome:
//!
//! - **success**: log status and the entity's `<target>_sync_hash` are
//!   written in one transaction
//! - **failure**: `retry_count` grows and `next_retry_at` follows
//!   exponential backoff with jitter, until `max_retries` or a permanent
//!   rejection makes the failure terminal
//! - **already delivered**: entries whose content the target already has
//!   are marked `skipped` without a network call

mod backoff;
mod dispatcher;
mod error;

pub use backoff::{compute_backoff, compute_jitter, next_retry_at};
pub use dispatcher::{
    new_claim_token, stale_claim_cutoff, DispatchOutcome, DispatchReport, Dispatcher,
};
pub use error::{DispatchError, DispatchResult};
