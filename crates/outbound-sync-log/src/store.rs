//! Enqueueing and inspecting outbound sync log entries.

use crate::{SyncLogError, SyncLogResult};
use chrono::Utc;
use serde_json::Value;
use sync_change_detector::{content_hash, detect_change, idempotency_key_for};
use sync_database::{
    queries, AsyncDatabase, DatabaseError, NewSyncLogEntry, StatusCount, SyncLogEntry,
    SyncOperation, TargetSystem,
};
use tracing::{debug, info, warn};

/// Durable log of outbound operations.
#[derive(Clone)]
pub struct SyncLog {
    db: AsyncDatabase,
}

impl SyncLog {
    pub fn new(db: AsyncDatabase) -> Self {
        Self { db }
    }

    /// Database handle shared with the dispatcher and scheduler.
    pub fn database(&self) -> &AsyncDatabase {
        &self.db
    }

    /// Record an outbound operation, or return the entry already recorded
    /// under `idempotency_key`.
    ///
    /// The existing entry is returned as-is whatever its status; a
    /// `success` entry in particular is never re-sent.
    pub async fn enqueue(
        &self,
        entity_type: &str,
        entity_id: &str,
        target_system: TargetSystem,
        operation: SyncOperation,
        idempotency_key: &str,
        payload: Value,
    ) -> SyncLogResult<SyncLogEntry> {
        let new_entry = NewSyncLogEntry {
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            target_system,
            operation,
            idempotency_key: idempotency_key.to_string(),
            payload_hash: content_hash(&payload),
            request_payload: payload,
        };

        match self.insert(new_entry).await {
            Ok(entry) => {
                info!(
                    id = entry.id,
                    entity_type,
                    entity_id,
                    target = %target_system,
                    operation = %operation,
                    idempotency_key,
                    "Enqueued outbound sync"
                );
                Ok(entry)
            }
            Err(SyncLogError::DuplicateIdempotencyKey(key)) => {
                let existing = self
                    .get_by_idempotency_key(&key)
                    .await?
                    .ok_or_else(|| {
                        SyncLogError::Database(DatabaseError::NotFound(format!(
                            "idempotency key {} vanished after collision",
                            key
                        )))
                    })?;
                debug!(
                    id = existing.id,
                    idempotency_key = %key,
                    status = existing.status.as_str(),
                    "Idempotency key already enqueued"
                );
                Ok(existing)
            }
            Err(e) => Err(e),
        }
    }

    async fn insert(&self, new_entry: NewSyncLogEntry) -> SyncLogResult<SyncLogEntry> {
        let key = new_entry.idempotency_key.clone();
        let result = self
            .db
            .call(move |conn| queries::insert_sync_log_entry(conn, &new_entry, Utc::now()))
            .await;

        match result {
            Ok(entry) => Ok(entry),
            Err(DatabaseError::UniqueViolation(_)) => {
                Err(SyncLogError::DuplicateIdempotencyKey(key))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Detect whether an entity changed for `target` and enqueue the
    /// write-back if it did.
    ///
    /// The operation is `delete` for soft-deleted entities, `create` when no
    /// hash was ever committed for the target, `update` otherwise. Returns
    /// `None` when the stored hash already matches, or when a soft-deleted
    /// entity was never delivered to the target.
    pub async fn enqueue_if_changed(
        &self,
        entity_type: &str,
        entity_id: &str,
        target: TargetSystem,
    ) -> SyncLogResult<Option<SyncLogEntry>> {
        let owned_type = entity_type.to_string();
        let owned_id = entity_id.to_string();
        let entity = self
            .db
            .call(move |conn| queries::get_syncable_entity(conn, &owned_type, &owned_id))
            .await?
            .ok_or_else(|| SyncLogError::EntityNotFound {
                entity_type: entity_type.to_string(),
                entity_id: entity_id.to_string(),
            })?;

        let payload = entity.outbound_payload();
        let stored_hash = entity.sync_hash(target);
        let detection = detect_change(&payload, stored_hash);

        if !detection.needs_sync {
            debug!(entity_type, entity_id, target = %target, "Entity unchanged, nothing to sync");
            return Ok(None);
        }

        let operation = match (entity.is_deleted(), stored_hash) {
            (true, None) => {
                debug!(
                    entity_type,
                    entity_id,
                    target = %target,
                    "Deleted entity was never synced to target"
                );
                return Ok(None);
            }
            (true, Some(_)) => SyncOperation::Delete,
            (false, None) => SyncOperation::Create,
            (false, Some(_)) => SyncOperation::Update,
        };

        // A delivered delete clears the stored hash; its own hash keeps a
        // restore's key apart from the original create.
        let previous_hash = match stored_hash {
            Some(hash) => Some(hash.to_string()),
            None => {
                let owned_type = entity_type.to_string();
                let owned_id = entity_id.to_string();
                self.db
                    .call(move |conn| {
                        queries::latest_success_entry(conn, &owned_type, &owned_id, target)
                    })
                    .await?
                    .filter(|latest| latest.operation == SyncOperation::Delete)
                    .map(|latest| latest.payload_hash)
            }
        };

        let key = idempotency_key_for(
            entity_type,
            entity_id,
            target,
            operation,
            previous_hash.as_deref(),
            &detection.new_hash,
        );

        let entry = self
            .enqueue(entity_type, entity_id, target, operation, &key, payload)
            .await?;
        Ok(Some(entry))
    }

    pub async fn get(&self, id: i64) -> SyncLogResult<Option<SyncLogEntry>> {
        let entry = self
            .db
            .call(move |conn| queries::get_sync_log_entry(conn, id))
            .await?;
        Ok(entry)
    }

    pub async fn get_by_idempotency_key(&self, key: &str) -> SyncLogResult<Option<SyncLogEntry>> {
        let key = key.to_string();
        let entry = self
            .db
            .call(move |conn| queries::get_sync_log_entry_by_key(conn, &key))
            .await?;
        Ok(entry)
    }

    /// Full history of one entity towards one target, oldest first.
    pub async fn history(
        &self,
        entity_type: &str,
        entity_id: &str,
        target: TargetSystem,
    ) -> SyncLogResult<Vec<SyncLogEntry>> {
        let entity_type = entity_type.to_string();
        let entity_id = entity_id.to_string();
        let entries = self
            .db
            .call(move |conn| {
                queries::list_entries_for_entity(conn, &entity_type, &entity_id, target)
            })
            .await?;
        Ok(entries)
    }

    pub async fn status_counts(&self) -> SyncLogResult<Vec<StatusCount>> {
        Ok(self.db.call(queries::status_counts).await?)
    }

    /// Terminal failures and successes with an unconfirmed hash commit.
    pub async fn list_needing_attention(&self, limit: usize) -> SyncLogResult<Vec<SyncLogEntry>> {
        let entries = self
            .db
            .call(move |conn| queries::list_entries_needing_attention(conn, limit))
            .await?;
        Ok(entries)
    }

    /// Operator action: retry a terminal failure from scratch.
    pub async fn requeue(&self, id: i64) -> SyncLogResult<SyncLogEntry> {
        let requeued = self
            .db
            .call(move |conn| queries::requeue_entry(conn, id, Utc::now()))
            .await?;

        let entry = self.get(id).await?.ok_or(SyncLogError::EntryNotFound(id))?;
        if !requeued {
            warn!(id, status = entry.status.as_str(), "Refusing to requeue non-terminal entry");
            return Err(SyncLogError::NotRequeueable(id));
        }

        info!(id, idempotency_key = %entry.idempotency_key, "Requeued terminal failure");
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EntityRepository;
    use serde_json::json;
    use sync_database::SyncStatus;

    async fn setup() -> (SyncLog, EntityRepository) {
        let db = AsyncDatabase::open_in_memory().await.unwrap();
        (SyncLog::new(db.clone()), EntityRepository::new(db))
    }

    async fn commit_hash(log: &SyncLog, entity_type: &str, entity_id: &str, hash: &str) {
        let entity_type = entity_type.to_string();
        let entity_id = entity_id.to_string();
        let hash = hash.to_string();
        log.database()
            .call(move |conn| {
                queries::commit_entity_sync_hash(
                    conn,
                    &entity_type,
                    &entity_id,
                    TargetSystem::Splynx,
                    Some(&hash),
                    Utc::now(),
                )
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn enqueue_creates_pending_entry() {
        let (log, _) = setup().await;
        let entry = log
            .enqueue(
                "contact",
                "42",
                TargetSystem::Splynx,
                SyncOperation::Update,
                "k1",
                json!({"name": "Ada"}),
            )
            .await
            .unwrap();

        assert_eq!(entry.status, SyncStatus::Pending);
        assert_eq!(entry.retry_count, 0);
        assert_eq!(entry.payload_hash, content_hash(&json!({"name": "Ada"})));
        assert!(entry.next_retry_at.is_some());
    }

    #[tokio::test]
    async fn double_enqueue_returns_existing_entry() {
        let (log, _) = setup().await;
        let first = log
            .enqueue(
                "contact",
                "42",
                TargetSystem::Splynx,
                SyncOperation::Update,
                "k1",
                json!({"v": 1}),
            )
            .await
            .unwrap();
        let second = log
            .enqueue(
                "contact",
                "42",
                TargetSystem::Splynx,
                SyncOperation::Update,
                "k1",
                json!({"v": 2}),
            )
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.request_payload, json!({"v": 1}));

        let history = log.history("contact", "42", TargetSystem::Splynx).await.unwrap();
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_enqueues_produce_one_row() {
        let (log, _) = setup().await;
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let log = log.clone();
                tokio::spawn(async move {
                    log.enqueue(
                        "contact",
                        "42",
                        TargetSystem::Splynx,
                        SyncOperation::Update,
                        "k1",
                        json!({"name": "Ada"}),
                    )
                    .await
                    .unwrap()
                })
            })
            .collect();

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().id);
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);
    }

    #[tokio::test]
    async fn enqueue_if_changed_infers_operation() {
        let (log, entities) = setup().await;
        entities.upsert("contact", "42", json!({"name": "Ada"})).await.unwrap();

        let created = log
            .enqueue_if_changed("contact", "42", TargetSystem::Splynx)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(created.operation, SyncOperation::Create);

        // Same content again: same key, same entry
        let again = log
            .enqueue_if_changed("contact", "42", TargetSystem::Splynx)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(again.id, created.id);

        // Once the hash is committed, unchanged content needs no sync
        commit_hash(&log, "contact", "42", &created.payload_hash).await;
        assert!(log
            .enqueue_if_changed("contact", "42", TargetSystem::Splynx)
            .await
            .unwrap()
            .is_none());

        entities.upsert("contact", "42", json!({"name": "Ada L."})).await.unwrap();
        let updated = log
            .enqueue_if_changed("contact", "42", TargetSystem::Splynx)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.operation, SyncOperation::Update);
        assert_ne!(updated.id, created.id);

        entities.soft_delete("contact", "42").await.unwrap();
        let deleted = log
            .enqueue_if_changed("contact", "42", TargetSystem::Splynx)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(deleted.operation, SyncOperation::Delete);
    }

    #[tokio::test]
    async fn deleted_entity_never_synced_is_ignored() {
        let (log, entities) = setup().await;
        entities.upsert("invoice", "INV-1", json!({"total": 10})).await.unwrap();
        entities.soft_delete("invoice", "INV-1").await.unwrap();

        let result = log
            .enqueue_if_changed("invoice", "INV-1", TargetSystem::Erpnext)
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn enqueue_if_changed_requires_entity() {
        let (log, _) = setup().await;
        let err = log
            .enqueue_if_changed("contact", "missing", TargetSystem::Splynx)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncLogError::EntityNotFound { .. }));
    }

    #[tokio::test]
    async fn requeue_rejects_non_terminal_entries() {
        let (log, _) = setup().await;
        let entry = log
            .enqueue("contact", "42", TargetSystem::Splynx, SyncOperation::Update, "k1", json!({}))
            .await
            .unwrap();

        let err = log.requeue(entry.id).await.unwrap_err();
        assert!(matches!(err, SyncLogError::NotRequeueable(id) if id == entry.id));
        assert!(matches!(log.requeue(999).await.unwrap_err(), SyncLogError::EntryNotFound(999)));
    }

    #[tokio::test]
    async fn status_counts_reflect_enqueued_entries() {
        let (log, _) = setup().await;
        for key in ["a", "b"] {
            log.enqueue(
                "contact",
                "42",
                TargetSystem::Splynx,
                SyncOperation::Update,
                key,
                json!({}),
            )
            .await
            .unwrap();
        }

        let counts = log.status_counts().await.unwrap();
        assert_eq!(counts.len(), 1);
        assert_eq!(counts[0].status, SyncStatus::Pending);
        assert_eq!(counts[0].count, 2);
        assert!(log.list_needing_attention(10).await.unwrap().is_empty());
    }
}
