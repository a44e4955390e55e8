use crate::{reconcile_unconfirmed_hashes, BatchReport, SchedulerResult};
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use outbound_sync_dispatcher::{new_claim_token, stale_claim_cutoff, Dispatcher};
use std::sync::Arc;
use sync_config_and_utils::SyncEngineConfig;
use sync_database::queries;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Claims due log entries and hands them to the [`Dispatcher`].
pub struct RetryScheduler {
    dispatcher: Arc<Dispatcher>,
}

impl RetryScheduler {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    pub fn config(&self) -> &SyncEngineConfig {
        self.dispatcher.config()
    }

    /// Run one scheduling pass now.
    pub async fn run_pending_sync_batch(&self) -> SchedulerResult<BatchReport> {
        self.run_pending_sync_batch_at(Utc::now()).await
    }

    /// Run one scheduling pass as of `now`.
    pub async fn run_pending_sync_batch_at(
        &self,
        now: DateTime<Utc>,
    ) -> SchedulerResult<BatchReport> {
        let config = self.config();
        let batch_size = config.batch_size;
        let stale_before = stale_claim_cutoff(now, config);
        let token = new_claim_token();

        let claim_token = token.clone();
        let claimed = self
            .dispatcher
            .database()
            .call(move |conn| {
                queries::claim_due_entries(conn, &claim_token, now, stale_before, batch_size)
            })
            .await?;

        let mut report = BatchReport {
            claimed: claimed.len(),
            ..BatchReport::default()
        };

        if !claimed.is_empty() {
            debug!(count = claimed.len(), claim_token = %token, "Claimed due sync entries");

            let dispatches = claimed
                .iter()
                .map(|entry| self.dispatcher.dispatch_claimed_at(entry, &token, now));
            let results = join_all(dispatches).await;

            for (entry, result) in claimed.iter().zip(results) {
                match result {
                    Ok(dispatched) => report.record(dispatched.outcome),
                    Err(e) => {
                        error!(id = entry.id, error = %e, "Dispatch bookkeeping failed");
                        report.errors += 1;
                    }
                }
            }
        }

        report.reconciled =
            reconcile_unconfirmed_hashes(self.dispatcher.database(), now, batch_size).await?;

        if !report.is_idle() {
            info!(
                claimed = report.claimed,
                delivered = report.delivered,
                skipped = report.skipped,
                retry_scheduled = report.retry_scheduled,
                failed = report.failed,
                errors = report.errors,
                reconciled = report.reconciled,
                "Sync batch complete"
            );
        }
        Ok(report)
    }

    /// Spawn the periodic loop, one pass every `poll_interval`.
    pub fn start(self: &Arc<Self>) -> SchedulerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let scheduler = Arc::clone(self);

        let join = tokio::spawn(async move {
            let mut ticker = interval(scheduler.config().poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(
                poll_interval_ms = scheduler.config().poll_interval.as_millis() as u64,
                batch_size = scheduler.config().batch_size,
                "Retry scheduler started"
            );

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = scheduler.run_pending_sync_batch().await {
                            warn!(error = %e, "Sync batch failed");
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            info!("Retry scheduler stopped");
        });

        SchedulerHandle { shutdown_tx, join }
    }
}

/// Handle to a running scheduler loop.
pub struct SchedulerHandle {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stop after the pass in progress (if any) and wait for the loop to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.join.await {
            warn!(error = %e, "Retry scheduler task ended abnormally");
        }
    }
}
