use outbound_sync_dispatcher::DispatchOutcome;
use serde::Serialize;

/// Counts for one scheduling pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub claimed: usize,
    pub delivered: usize,
    pub delivered_unreconciled: usize,
    pub skipped: usize,
    pub retry_scheduled: usize,
    pub failed: usize,
    pub claim_lost: usize,
    /// Entries whose bookkeeping failed (claim left to expire).
    pub errors: usize,
    /// Deferred hash commits completed during the pass.
    pub reconciled: usize,
}

impl BatchReport {
    pub(crate) fn record(&mut self, outcome: DispatchOutcome) {
        match outcome {
            DispatchOutcome::Delivered => self.delivered += 1,
            DispatchOutcome::DeliveredUnreconciled => self.delivered_unreconciled += 1,
            DispatchOutcome::Skipped => self.skipped += 1,
            DispatchOutcome::RetryScheduled => self.retry_scheduled += 1,
            DispatchOutcome::Failed => self.failed += 1,
            DispatchOutcome::ClaimLost => self.claim_lost += 1,
            // Batch entries are claimed up front
            DispatchOutcome::NotClaimed => {}
        }
    }

    /// Whether the pass found nothing to do.
    pub fn is_idle(&self) -> bool {
        self.claimed == 0 && self.reconciled == 0
    }
}
