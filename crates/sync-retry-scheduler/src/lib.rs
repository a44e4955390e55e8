//! Periodic re-dispatch of due outbound sync entries.
//!
//! Each pass of [`RetryScheduler::run_pending_sync_batch`]:
//!
//! 1. atomically claims up to `batch_size` due entries, oldest
//!    `next_retry_at` first (one `UPDATE ... RETURNING`, so concurrent
//!    schedulers sharing the database never claim the same entry)
//! 2. dispatches every claimed entry once, concurrently, capped per target
//! 3. commits entity hashes for successes whose hash write was deferred
//!
//! A failing entry never aborts the pass; it is counted in the
//! [`BatchReport`] and its state lives on in the log.

mod error;
mod reconciler;
mod report;
mod scheduler;

pub use error::{SchedulerError, SchedulerResult};
pub use reconciler::reconcile_unconfirmed_hashes;
pub use report::BatchReport;
pub use scheduler::{RetryScheduler, SchedulerHandle};
