//! Access to the syncable tables the engine reads from.

use crate::SyncLogResult;
use chrono::Utc;
use serde_json::Value;
use sync_database::{queries, AsyncDatabase, SyncableEntity};
use tracing::debug;

/// Reads and writes syncable domain rows (contacts, invoices).
///
/// The engine itself only reads entity content and writes the per-target
/// hash columns; the write methods here serve the CLI and tests.
#[derive(Clone)]
pub struct EntityRepository {
    db: AsyncDatabase,
}

impl EntityRepository {
    pub fn new(db: AsyncDatabase) -> Self {
        Self { db }
    }

    pub async fn get(
        &self,
        entity_type: &str,
        entity_id: &str,
    ) -> SyncLogResult<Option<SyncableEntity>> {
        let entity_type = entity_type.to_string();
        let entity_id = entity_id.to_string();
        let entity = self
            .db
            .call(move |conn| queries::get_syncable_entity(conn, &entity_type, &entity_id))
            .await?;
        Ok(entity)
    }

    /// Insert or replace an entity's data. Clears any soft delete.
    pub async fn upsert(
        &self,
        entity_type: &str,
        entity_id: &str,
        data: Value,
    ) -> SyncLogResult<()> {
        let entity_type = entity_type.to_string();
        let entity_id = entity_id.to_string();
        debug!(%entity_type, %entity_id, "Upserting syncable entity");
        self.db
            .call(move |conn| {
                queries::upsert_syncable_entity(conn, &entity_type, &entity_id, &data, Utc::now())
            })
            .await?;
        Ok(())
    }

    /// Soft-delete an entity. Returns false if it was missing or already deleted.
    pub async fn soft_delete(&self, entity_type: &str, entity_id: &str) -> SyncLogResult<bool> {
        let entity_type = entity_type.to_string();
        let entity_id = entity_id.to_string();
        let deleted = self
            .db
            .call(move |conn| {
                queries::soft_delete_syncable_entity(conn, &entity_type, &entity_id, Utc::now())
            })
            .await?;
        Ok(deleted)
    }
}
