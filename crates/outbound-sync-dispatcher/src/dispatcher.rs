//! Single-entry dispatch: claim, deliver, record.

use crate::{next_retry_at, DispatchError, DispatchResult};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Instant;
use sync_config_and_utils::SyncEngineConfig;
use sync_database::{
    queries, AsyncDatabase, DatabaseError, FailureKind, FailureRecord, SuccessRecord,
    SyncLogEntry, SyncOperation, TargetSystem,
};
use sync_target_clients::{DeliveryError, DeliveryReceipt, DeliveryRequest, TargetRegistry};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

/// What a dispatch attempt did to its entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Delivered; entity hash committed in the same transaction.
    Delivered,
    /// Delivered, but the entity hash could not be written. Left for the
    /// reconciler (`hash_committed = 0`).
    DeliveredUnreconciled,
    /// Target already had this content, or a newer entry replaced it.
    Skipped,
    /// Failed; another attempt is scheduled.
    RetryScheduled,
    /// Failed terminally; needs an operator.
    Failed,
    /// Not claimable (claimed elsewhere or already final); untouched.
    NotClaimed,
    /// Our claim expired and was taken over before the outcome was written.
    ClaimLost,
}

/// Outcome plus the entry as stored afterwards.
#[derive(Debug, Clone)]
pub struct DispatchReport {
    pub outcome: DispatchOutcome,
    pub entry: SyncLogEntry,
}

/// Result of handing a request to a target.
enum Delivery {
    Completed(Result<DeliveryReceipt, DeliveryError>),
    /// The claim was taken over while the entry waited for a permit.
    ClaimLost,
}

/// Facts read before delivery, in one database round trip.
struct Preflight {
    skip_reason: Option<&'static str>,
    external_id: Option<String>,
}

/// Sends claimed log entries to their target systems.
pub struct Dispatcher {
    db: AsyncDatabase,
    targets: TargetRegistry,
    config: SyncEngineConfig,
    permits: HashMap<TargetSystem, Semaphore>,
}

impl Dispatcher {
    pub fn new(db: AsyncDatabase, targets: TargetRegistry, config: SyncEngineConfig) -> Self {
        let permits = TargetSystem::ALL
            .into_iter()
            .map(|system| (system, Semaphore::new(config.per_target_concurrency_limit)))
            .collect();

        Self {
            db,
            targets,
            config,
            permits,
        }
    }

    pub fn config(&self) -> &SyncEngineConfig {
        &self.config
    }

    pub fn database(&self) -> &AsyncDatabase {
        &self.db
    }

    /// Claim and deliver one entry, returning it as stored afterwards.
    ///
    /// An entry that is claimed elsewhere or already final is returned
    /// unchanged without contacting the target.
    pub async fn dispatch(&self, entry: &SyncLogEntry) -> DispatchResult<SyncLogEntry> {
        Ok(self.dispatch_at(entry, Utc::now()).await?.entry)
    }

    /// [`dispatch`](Self::dispatch) with an explicit clock.
    pub async fn dispatch_at(
        &self,
        entry: &SyncLogEntry,
        now: DateTime<Utc>,
    ) -> DispatchResult<DispatchReport> {
        let token = new_claim_token();
        let id = entry.id;
        let claim_token = token.clone();
        let stale_before = stale_claim_cutoff(now, &self.config);

        let claimed = self
            .db
            .call(move |conn| queries::claim_entry(conn, id, &claim_token, now, stale_before))
            .await?;

        match claimed {
            Some(claimed) => self.dispatch_claimed_at(&claimed, &token, now).await,
            None => {
                debug!(id, "Entry not claimable, leaving untouched");
                Ok(DispatchReport {
                    outcome: DispatchOutcome::NotClaimed,
                    entry: self.reload(id).await?,
                })
            }
        }
    }

    /// Deliver an entry this caller has already claimed with `claim_token`.
    pub async fn dispatch_claimed_at(
        &self,
        entry: &SyncLogEntry,
        claim_token: &str,
        now: DateTime<Utc>,
    ) -> DispatchResult<DispatchReport> {
        let preflight = self.preflight(entry).await?;

        if let Some(reason) = preflight.skip_reason {
            return self.record_skip(entry, claim_token, reason, now).await;
        }

        let request = DeliveryRequest::from_entry(entry, preflight.external_id);
        let started = Instant::now();
        let delivery = self
            .deliver(entry, claim_token, &request, now, started)
            .await?;
        let finished_at = now + elapsed_since(started);

        match delivery {
            Delivery::Completed(Ok(receipt)) => {
                self.record_success(entry, claim_token, receipt, finished_at)
                    .await
            }
            Delivery::Completed(Err(err)) => {
                self.record_failure(entry, claim_token, err, finished_at)
                    .await
            }
            Delivery::ClaimLost => self.claim_lost(entry).await,
        }
    }

    async fn preflight(&self, entry: &SyncLogEntry) -> DispatchResult<Preflight> {
        let entry = entry.clone();
        let preflight = self
            .db
            .call(move |conn| {
                let entity = match queries::get_syncable_entity(
                    conn,
                    &entry.entity_type,
                    &entry.entity_id,
                ) {
                    Ok(entity) => entity,
                    Err(DatabaseError::UnknownEntityType(_)) => None,
                    Err(e) => return Err(e),
                };

                let already_delivered = entity
                    .as_ref()
                    .and_then(|entity| entity.sync_hash(entry.target_system))
                    == Some(entry.payload_hash.as_str());

                let skip_reason = if already_delivered {
                    Some("target already has this content")
                } else if queries::has_newer_live_entry(conn, &entry)? {
                    Some("superseded by a newer entry")
                } else {
                    None
                };

                let external_id = match entry.operation {
                    SyncOperation::Create => None,
                    SyncOperation::Update | SyncOperation::Delete => queries::latest_external_id(
                        conn,
                        &entry.entity_type,
                        &entry.entity_id,
                        entry.target_system,
                    )?,
                };

                Ok(Preflight {
                    skip_reason,
                    external_id,
                })
            })
            .await?;
        Ok(preflight)
    }

    /// Send through the target's client, bounded by its permits and the
    /// dispatch timeout. The error is bookkeeping; the delivery outcome
    /// rides in [`Delivery`].
    ///
    /// Waiting for a permit can outlast `claim_ttl`, so the claim is
    /// refreshed once the permit is held and the call is abandoned if
    /// another worker took the entry over meanwhile.
    async fn deliver(
        &self,
        entry: &SyncLogEntry,
        claim_token: &str,
        request: &DeliveryRequest,
        now: DateTime<Utc>,
        started: Instant,
    ) -> DispatchResult<Delivery> {
        let system = entry.target_system;
        let Some(target) = self.targets.get(system) else {
            return Ok(Delivery::Completed(Err(DeliveryError::transient(format!(
                "no client registered for {}",
                system
            )))));
        };

        let Some(semaphore) = self.permits.get(&system) else {
            return Err(DispatchError::ShuttingDown);
        };
        let _permit = semaphore
            .acquire()
            .await
            .map_err(|_| DispatchError::ShuttingDown)?;

        let id = entry.id;
        let token = claim_token.to_string();
        let refreshed_at = now + elapsed_since(started);
        let refreshed = self
            .db
            .call(move |conn| queries::refresh_claim(conn, id, &token, refreshed_at))
            .await?;
        if !refreshed {
            return Ok(Delivery::ClaimLost);
        }

        let timeout = self.config.dispatch_timeout;
        match tokio::time::timeout(timeout, target.deliver(request)).await {
            Ok(result) => Ok(Delivery::Completed(result)),
            Err(_) => Ok(Delivery::Completed(Err(DeliveryError::transient(format!(
                "timed out after {}ms",
                timeout.as_millis()
            ))))),
        }
    }

    async fn record_skip(
        &self,
        entry: &SyncLogEntry,
        claim_token: &str,
        reason: &'static str,
        now: DateTime<Utc>,
    ) -> DispatchResult<DispatchReport> {
        let id = entry.id;
        let token = claim_token.to_string();
        let marked = self
            .db
            .call(move |conn| queries::mark_skipped(conn, id, &token, now))
            .await?;

        if marked {
            info!(id, idempotency_key = %entry.idempotency_key, reason, "Skipped sync entry");
            self.report(id, DispatchOutcome::Skipped).await
        } else {
            self.claim_lost(entry).await
        }
    }

    async fn record_success(
        &self,
        entry: &SyncLogEntry,
        claim_token: &str,
        receipt: DeliveryReceipt,
        finished_at: DateTime<Utc>,
    ) -> DispatchResult<DispatchReport> {
        let success = SuccessRecord {
            external_id: receipt.external_id,
            response_payload: receipt.response,
        };

        let stored = entry.clone();
        let token = claim_token.to_string();
        let record = success.clone();
        let committed = self
            .db
            .call(move |conn| {
                queries::complete_success_with_hash_commit(
                    conn,
                    &stored,
                    &token,
                    &record,
                    finished_at,
                )
            })
            .await;

        let outcome = match committed {
            Ok(true) => DispatchOutcome::Delivered,
            Ok(false) => return self.claim_lost(entry).await,
            Err(DatabaseError::HashCommit(reason)) => {
                error!(
                    id = entry.id,
                    entity_type = %entry.entity_type,
                    entity_id = %entry.entity_id,
                    target = %entry.target_system,
                    error = %reason,
                    "Hash commit failed after delivery, recording success for reconciliation"
                );

                let id = entry.id;
                let token = claim_token.to_string();
                let marked = self
                    .db
                    .call(move |conn| {
                        queries::complete_success_unreconciled(
                            conn,
                            id,
                            &token,
                            &success,
                            finished_at,
                        )
                    })
                    .await?;
                if !marked {
                    return self.claim_lost(entry).await;
                }
                DispatchOutcome::DeliveredUnreconciled
            }
            Err(e) => {
                // Delivered but unrecorded: the claim expires and the retry
                // carries the same idempotency key.
                error!(id = entry.id, error = %e, "Failed to record successful delivery");
                return Err(e.into());
            }
        };

        info!(
            id = entry.id,
            target = %entry.target_system,
            operation = %entry.operation,
            idempotency_key = %entry.idempotency_key,
            "Sync entry delivered"
        );
        self.report(entry.id, outcome).await
    }

    async fn record_failure(
        &self,
        entry: &SyncLogEntry,
        claim_token: &str,
        err: DeliveryError,
        finished_at: DateTime<Utc>,
    ) -> DispatchResult<DispatchReport> {
        let retry_count = entry.retry_count.saturating_add(1);
        let (error_kind, next_attempt) = if err.is_transient() {
            (
                FailureKind::Transient,
                next_retry_at(finished_at, retry_count, &self.config),
            )
        } else {
            (FailureKind::Permanent, None)
        };

        let failure = FailureRecord {
            error_message: err.to_string(),
            error_kind,
            retry_count,
            next_retry_at: next_attempt,
            response_payload: err.response().cloned(),
        };

        let id = entry.id;
        let token = claim_token.to_string();
        let marked = self
            .db
            .call(move |conn| queries::record_failure(conn, id, &token, &failure, finished_at))
            .await?;
        if !marked {
            return self.claim_lost(entry).await;
        }

        let outcome = match next_attempt {
            Some(at) => {
                warn!(
                    id,
                    retry_count,
                    next_retry_at = %at,
                    error = %err,
                    "Sync delivery failed, retry scheduled"
                );
                DispatchOutcome::RetryScheduled
            }
            None => {
                error!(
                    id,
                    retry_count,
                    error_kind = error_kind.as_str(),
                    error = %err,
                    "Sync delivery failed terminally, manual intervention required"
                );
                DispatchOutcome::Failed
            }
        };
        self.report(id, outcome).await
    }

    async fn claim_lost(&self, entry: &SyncLogEntry) -> DispatchResult<DispatchReport> {
        warn!(id = entry.id, "Claim taken over by another worker, leaving entry untouched");
        self.report(entry.id, DispatchOutcome::ClaimLost).await
    }

    async fn report(&self, id: i64, outcome: DispatchOutcome) -> DispatchResult<DispatchReport> {
        Ok(DispatchReport {
            outcome,
            entry: self.reload(id).await?,
        })
    }

    async fn reload(&self, id: i64) -> DispatchResult<SyncLogEntry> {
        self.db
            .call(move |conn| queries::get_sync_log_entry(conn, id))
            .await?
            .ok_or(DispatchError::EntryNotFound(id))
    }
}

fn elapsed_since(started: Instant) -> chrono::Duration {
    chrono::Duration::from_std(started.elapsed()).unwrap_or_else(|_| chrono::Duration::zero())
}

/// Fresh token identifying one claim.
pub fn new_claim_token() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Claims taken at or before this instant are abandoned and may be taken over.
pub fn stale_claim_cutoff(now: DateTime<Utc>, config: &SyncEngineConfig) -> DateTime<Utc> {
    let ttl = chrono::Duration::from_std(config.claim_ttl)
        .unwrap_or_else(|_| chrono::Duration::minutes(5));
    now - ttl
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::future::join_all;
    use outbound_sync_log::{EntityRepository, SyncLog};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use sync_database::SyncStatus;
    use sync_target_clients::RecordingTarget;

    struct Harness {
        log: SyncLog,
        entities: EntityRepository,
        target: Arc<RecordingTarget>,
        dispatcher: Dispatcher,
    }

    fn test_config() -> SyncEngineConfig {
        SyncEngineConfig {
            base_delay: Duration::from_secs(30),
            max_delay: Duration::from_secs(3600),
            max_retries: 3,
            jitter_ratio: 0.0,
            dispatch_timeout: Duration::from_millis(50),
            ..SyncEngineConfig::default()
        }
    }

    async fn harness(config: SyncEngineConfig) -> Harness {
        let db = AsyncDatabase::open_in_memory().await.unwrap();
        let target = Arc::new(RecordingTarget::new(TargetSystem::Splynx));
        let mut targets = TargetRegistry::new();
        targets.register(target.clone());

        Harness {
            log: SyncLog::new(db.clone()),
            entities: EntityRepository::new(db.clone()),
            target,
            dispatcher: Dispatcher::new(db, targets, config),
        }
    }

    async fn enqueue_contact(h: &Harness, key: &str, operation: SyncOperation) -> SyncLogEntry {
        h.entities
            .upsert("contact", "42", json!({"name": "Ada"}))
            .await
            .unwrap();
        h.log
            .enqueue(
                "contact",
                "42",
                TargetSystem::Splynx,
                operation,
                key,
                json!({"name": "Ada"}),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn success_commits_entity_hash() {
        let h = harness(test_config()).await;
        let entry = enqueue_contact(&h, "k1", SyncOperation::Create).await;

        let report = h.dispatcher.dispatch_at(&entry, Utc::now()).await.unwrap();
        assert_eq!(report.outcome, DispatchOutcome::Delivered);
        assert_eq!(report.entry.status, SyncStatus::Success);
        assert_eq!(report.entry.external_id.as_deref(), Some("ext-42"));
        assert!(report.entry.completed_at.is_some());
        assert!(report.entry.hash_committed);
        assert!(report.entry.claim_token.is_none());

        let entity = h.entities.get("contact", "42").await.unwrap().unwrap();
        assert_eq!(entity.sync_hash(TargetSystem::Splynx), Some(entry.payload_hash.as_str()));
        assert!(entity.last_synced_at(TargetSystem::Splynx).is_some());

        let request = &h.target.requests()[0];
        assert_eq!(request.idempotency_key, "k1");
        assert_eq!(request.payload, json!({"name": "Ada"}));
    }

    #[tokio::test]
    async fn final_entries_are_not_redispatched() {
        let h = harness(test_config()).await;
        let entry = enqueue_contact(&h, "k1", SyncOperation::Create).await;

        h.dispatcher.dispatch(&entry).await.unwrap();
        let report = h.dispatcher.dispatch_at(&entry, Utc::now()).await.unwrap();

        assert_eq!(report.outcome, DispatchOutcome::NotClaimed);
        assert_eq!(report.entry.status, SyncStatus::Success);
        assert_eq!(h.target.call_count(), 1);
    }

    #[tokio::test]
    async fn timeout_is_transient_failure_with_backoff() {
        let h = harness(test_config()).await;
        let entry = enqueue_contact(&h, "k1", SyncOperation::Update).await;
        h.target.set_latency(Some(Duration::from_millis(500)));

        let now = Utc::now();
        let report = h.dispatcher.dispatch_at(&entry, now).await.unwrap();

        assert_eq!(report.outcome, DispatchOutcome::RetryScheduled);
        let stored = report.entry;
        assert_eq!(stored.status, SyncStatus::Failed);
        assert_eq!(stored.retry_count, 1);
        assert_eq!(stored.error_kind, Some(FailureKind::Transient));
        assert!(stored.error_message.unwrap().contains("timed out"));

        let next = stored.next_retry_at.unwrap();
        assert!(next >= now + chrono::Duration::seconds(30));
        assert!(next < now + chrono::Duration::seconds(31));

        // Hash never committed on failure
        let entity = h.entities.get("contact", "42").await.unwrap().unwrap();
        assert_eq!(entity.sync_hash(TargetSystem::Splynx), None);
    }

    #[tokio::test]
    async fn permanent_rejection_is_terminal() {
        let h = harness(test_config()).await;
        let entry = enqueue_contact(&h, "k1", SyncOperation::Create).await;
        h.target.push_outcome(Err(DeliveryError::from_status(
            422,
            json!({"error": "invalid email"}),
        )));

        let report = h.dispatcher.dispatch_at(&entry, Utc::now()).await.unwrap();
        assert_eq!(report.outcome, DispatchOutcome::Failed);
        assert_eq!(report.entry.error_kind, Some(FailureKind::Permanent));
        assert!(report.entry.next_retry_at.is_none());
        assert!(report.entry.is_terminal());
        assert_eq!(report.entry.response_payload, Some(json!({"error": "invalid email"})));
    }

    #[tokio::test]
    async fn retries_exhaust_after_max_retries() {
        let h = harness(test_config()).await;
        let entry = enqueue_contact(&h, "k1", SyncOperation::Create).await;

        let mut now = Utc::now();
        let mut outcomes = Vec::new();
        for _ in 0..3 {
            h.target.push_outcome(Err(DeliveryError::transient("503")));
            let report = h.dispatcher.dispatch_at(&entry, now).await.unwrap();
            outcomes.push(report.outcome);
            if let Some(next) = report.entry.next_retry_at {
                now = next;
            }
        }

        assert_eq!(
            outcomes,
            vec![
                DispatchOutcome::RetryScheduled,
                DispatchOutcome::RetryScheduled,
                DispatchOutcome::Failed
            ]
        );
        let stored = h.log.get(entry.id).await.unwrap().unwrap();
        assert_eq!(stored.retry_count, 3);
        assert!(stored.is_terminal());

        // Terminal entries are never claimed again
        let report = h.dispatcher.dispatch_at(&entry, now).await.unwrap();
        assert_eq!(report.outcome, DispatchOutcome::NotClaimed);
        assert_eq!(h.target.call_count(), 3);
    }

    #[tokio::test]
    async fn already_delivered_content_is_skipped() {
        let h = harness(test_config()).await;
        let first = enqueue_contact(&h, "k1", SyncOperation::Create).await;
        h.dispatcher.dispatch(&first).await.unwrap();

        // Same content under another key: nothing new to send
        let second = enqueue_contact(&h, "k2", SyncOperation::Update).await;
        let report = h.dispatcher.dispatch_at(&second, Utc::now()).await.unwrap();

        assert_eq!(report.outcome, DispatchOutcome::Skipped);
        assert_eq!(report.entry.status, SyncStatus::Skipped);
        assert_eq!(h.target.call_count(), 1);
    }

    #[tokio::test]
    async fn superseded_entry_is_skipped() {
        let h = harness(test_config()).await;
        let older = enqueue_contact(&h, "k1", SyncOperation::Create).await;
        h.log
            .enqueue(
                "contact",
                "42",
                TargetSystem::Splynx,
                SyncOperation::Create,
                "k2",
                json!({"name": "Ada L."}),
            )
            .await
            .unwrap();

        let report = h.dispatcher.dispatch_at(&older, Utc::now()).await.unwrap();
        assert_eq!(report.outcome, DispatchOutcome::Skipped);
        assert_eq!(h.target.call_count(), 0);
    }

    #[tokio::test]
    async fn missing_entity_leaves_success_unreconciled() {
        let h = harness(test_config()).await;
        let entry = h
            .log
            .enqueue(
                "contact",
                "ghost",
                TargetSystem::Splynx,
                SyncOperation::Create,
                "k1",
                json!({"name": "Nobody"}),
            )
            .await
            .unwrap();

        let report = h.dispatcher.dispatch_at(&entry, Utc::now()).await.unwrap();
        assert_eq!(report.outcome, DispatchOutcome::DeliveredUnreconciled);
        assert_eq!(report.entry.status, SyncStatus::Success);
        assert!(!report.entry.hash_committed);
        assert!(report.entry.needs_attention());
    }

    #[tokio::test]
    async fn update_carries_external_id_from_create() {
        let h = harness(test_config()).await;
        let created = enqueue_contact(&h, "k1", SyncOperation::Create).await;
        h.dispatcher.dispatch(&created).await.unwrap();

        h.entities
            .upsert("contact", "42", json!({"name": "Ada L."}))
            .await
            .unwrap();
        let update = h
            .log
            .enqueue_if_changed("contact", "42", TargetSystem::Splynx)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(update.operation, SyncOperation::Update);

        let report = h.dispatcher.dispatch_at(&update, Utc::now()).await.unwrap();
        assert_eq!(report.outcome, DispatchOutcome::Delivered);
        assert_eq!(h.target.requests()[1].external_id.as_deref(), Some("ext-42"));
    }

    #[tokio::test]
    async fn unregistered_target_is_transient() {
        let h = harness(test_config()).await;
        let entry = h
            .log
            .enqueue(
                "contact",
                "42",
                TargetSystem::Erpnext,
                SyncOperation::Create,
                "erp-k1",
                json!({}),
            )
            .await
            .unwrap();

        let report = h.dispatcher.dispatch_at(&entry, Utc::now()).await.unwrap();
        assert_eq!(report.outcome, DispatchOutcome::RetryScheduled);
        assert!(report.entry.error_message.unwrap().contains("no client registered"));
    }

    #[tokio::test]
    async fn per_target_concurrency_is_capped() {
        let config = SyncEngineConfig {
            per_target_concurrency_limit: 2,
            dispatch_timeout: Duration::from_secs(5),
            ..test_config()
        };
        let h = harness(config).await;
        h.target.set_latency(Some(Duration::from_millis(30)));

        let mut entries = Vec::new();
        for i in 0..6 {
            let entity_id = format!("c{}", i);
            h.entities.upsert("contact", &entity_id, json!({"i": i})).await.unwrap();
            entries.push(
                h.log
                    .enqueue(
                        "contact",
                        &entity_id,
                        TargetSystem::Splynx,
                        SyncOperation::Create,
                        &format!("k{}", i),
                        json!({"i": i}),
                    )
                    .await
                    .unwrap(),
            );
        }

        let now = Utc::now();
        let dispatches = entries.iter().map(|entry| h.dispatcher.dispatch_at(entry, now));
        let reports = join_all(dispatches).await;

        assert!(reports
            .iter()
            .all(|r| r.as_ref().unwrap().outcome == DispatchOutcome::Delivered));
        assert_eq!(h.target.call_count(), 6);
        assert!(h.target.max_in_flight() <= 2);
    }

    #[tokio::test]
    async fn taken_over_claim_is_not_delivered() {
        let h = harness(test_config()).await;
        let entry = enqueue_contact(&h, "k1", SyncOperation::Create).await;
        let now = Utc::now();
        let db = h.dispatcher.database().clone();

        let id = entry.id;
        let stale_before = now - chrono::Duration::hours(1);
        let claimed = db
            .call(move |conn| queries::claim_entry(conn, id, "waiting-worker", now, stale_before))
            .await
            .unwrap()
            .unwrap();

        // The claim went stale while the worker waited; another worker took it
        let later = now + chrono::Duration::minutes(10);
        let stale_before = stale_claim_cutoff(later, h.dispatcher.config());
        db.call(move |conn| queries::claim_entry(conn, id, "rescuer", later, stale_before))
            .await
            .unwrap()
            .unwrap();

        let report = h
            .dispatcher
            .dispatch_claimed_at(&claimed, "waiting-worker", later)
            .await
            .unwrap();

        assert_eq!(report.outcome, DispatchOutcome::ClaimLost);
        assert_eq!(report.entry.claim_token.as_deref(), Some("rescuer"));
        assert_eq!(h.target.call_count(), 0);
    }
}
