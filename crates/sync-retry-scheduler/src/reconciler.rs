//! Completion of deferred entity hash commits.

use crate::SchedulerResult;
use chrono::{DateTime, Utc};
use sync_database::{queries, AsyncDatabase, DatabaseError};
use tracing::{debug, info, warn};

/// Commit the entity hash for up to `limit` successes recorded with
/// `hash_committed = 0`. Returns how many were confirmed.
///
/// Entries whose entity row is still missing stay unreconciled and move
/// behind the others, so a stuck entry cannot hold the batch forever.
pub async fn reconcile_unconfirmed_hashes(
    db: &AsyncDatabase,
    now: DateTime<Utc>,
    limit: usize,
) -> SchedulerResult<usize> {
    let pending = db
        .call(move |conn| queries::list_unreconciled_successes(conn, limit))
        .await?;
    if pending.is_empty() {
        return Ok(0);
    }

    let mut reconciled = 0;
    for entry in pending {
        let id = entry.id;
        let entity = format!("{} {}", entry.entity_type, entry.entity_id);
        let result = db
            .call(move |conn| queries::reconcile_success_hash(conn, &entry, now))
            .await;

        match result {
            Ok(true) => {
                info!(id, %entity, "Reconciled entity sync hash");
                reconciled += 1;
                continue;
            }
            Ok(false) => {
                debug!(id, "Entry reconciled elsewhere");
                continue;
            }
            Err(DatabaseError::NotFound(reason))
            | Err(DatabaseError::UnknownEntityType(reason)) => {
                debug!(id, %entity, reason = %reason, "Entity still unavailable for hash commit");
            }
            Err(e) => warn!(id, %entity, error = %e, "Hash reconciliation failed"),
        }

        if let Err(e) = db
            .call(move |conn| queries::mark_reconcile_attempt(conn, id, now))
            .await
        {
            warn!(id, error = %e, "Failed to record reconciliation attempt");
        }
    }

    Ok(reconciled)
}
