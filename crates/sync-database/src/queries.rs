//! Standalone query functions over a `&Connection`.
//!
//! Every function here is meant to run inside [`crate::AsyncDatabase::call`].
//! Writes that change the state of a claimed log entry are conditional on
//! the caller's claim token, so a worker whose claim expired and was taken
//! over by another worker cannot overwrite the newer outcome.

use crate::{
    syncable_table, DatabaseError, DatabaseResult, EntitySyncState, FailureKind, FailureRecord,
    NewSyncLogEntry, StatusCount, SuccessRecord, SyncLogEntry, SyncOperation, SyncStatus,
    SyncableEntity, TargetSystem,
};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

const LOG_COLUMNS: &str = "id, entity_type, entity_id, target_system, operation, idempotency_key,
    payload_hash, request_payload, response_payload, status, external_id, error_message,
    error_kind, retry_count, next_retry_at, claim_token, claimed_at, hash_committed,
    created_at, updated_at, completed_at";

// ==========================================
// Sync log: reads
// ==========================================

/// Get a log entry by row id.
pub fn get_sync_log_entry(conn: &Connection, id: i64) -> DatabaseResult<Option<SyncLogEntry>> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {LOG_COLUMNS} FROM outbound_sync_log WHERE id = ?1"
    ))?;
    let row = stmt.query_row(params![id], map_raw_entry).optional()?;
    row.map(RawEntry::into_entry).transpose()
}

/// Get a log entry by idempotency key.
pub fn get_sync_log_entry_by_key(
    conn: &Connection,
    idempotency_key: &str,
) -> DatabaseResult<Option<SyncLogEntry>> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {LOG_COLUMNS} FROM outbound_sync_log WHERE idempotency_key = ?1"
    ))?;
    let row = stmt
        .query_row(params![idempotency_key], map_raw_entry)
        .optional()?;
    row.map(RawEntry::into_entry).transpose()
}

/// All log entries for one entity and target, oldest first.
pub fn list_entries_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
    target: TargetSystem,
) -> DatabaseResult<Vec<SyncLogEntry>> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {LOG_COLUMNS} FROM outbound_sync_log
         WHERE entity_type = ?1 AND entity_id = ?2 AND target_system = ?3
         ORDER BY id ASC"
    ))?;
    let rows = stmt
        .query_map(
            params![entity_type, entity_id, target.as_str()],
            map_raw_entry,
        )?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(RawEntry::into_entry).collect()
}

/// External id most recently assigned by the target to this entity.
///
/// `None` once the latest delivered operation was a delete: the remote
/// record is gone and must not be addressed again.
pub fn latest_external_id(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
    target: TargetSystem,
) -> DatabaseResult<Option<String>> {
    let latest = conn
        .query_row(
            "SELECT operation, external_id FROM outbound_sync_log
             WHERE entity_type = ?1 AND entity_id = ?2 AND target_system = ?3
               AND status = 'success'
               AND (external_id IS NOT NULL OR operation = 'delete')
             ORDER BY completed_at DESC, id DESC
             LIMIT 1",
            params![entity_type, entity_id, target.as_str()],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?)),
        )
        .optional()?;

    Ok(match latest {
        Some((operation, _)) if operation == SyncOperation::Delete.as_str() => None,
        Some((_, external_id)) => external_id,
        None => None,
    })
}

/// Latest successful delivery of this entity to `target`.
pub fn latest_success_entry(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
    target: TargetSystem,
) -> DatabaseResult<Option<SyncLogEntry>> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {LOG_COLUMNS} FROM outbound_sync_log
         WHERE entity_type = ?1 AND entity_id = ?2 AND target_system = ?3
           AND status = 'success'
         ORDER BY completed_at DESC, id DESC
         LIMIT 1"
    ))?;
    let row = stmt
        .query_row(params![entity_type, entity_id, target.as_str()], map_raw_entry)
        .optional()?;
    row.map(RawEntry::into_entry).transpose()
}

/// Whether a later log entry for the same entity and target is still live
/// (due, in flight or delivered), making `entry` obsolete.
pub fn has_newer_live_entry(conn: &Connection, entry: &SyncLogEntry) -> DatabaseResult<bool> {
    let exists = conn.query_row(
        "SELECT EXISTS(
             SELECT 1 FROM outbound_sync_log
             WHERE entity_type = ?1 AND entity_id = ?2 AND target_system = ?3
               AND id > ?4
               AND (status IN ('pending', 'success')
                    OR (status = 'failed' AND next_retry_at IS NOT NULL))
         )",
        params![
            entry.entity_type,
            entry.entity_id,
            entry.target_system.as_str(),
            entry.id
        ],
        |row| row.get(0),
    )?;
    Ok(exists)
}

/// Terminal failures and successes whose hash commit is unconfirmed.
pub fn list_entries_needing_attention(
    conn: &Connection,
    limit: usize,
) -> DatabaseResult<Vec<SyncLogEntry>> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {LOG_COLUMNS} FROM outbound_sync_log
         WHERE (status = 'failed' AND next_retry_at IS NULL)
            OR (status = 'success' AND hash_committed = 0)
         ORDER BY updated_at DESC
         LIMIT ?1"
    ))?;
    let rows = stmt
        .query_map(params![limit as i64], map_raw_entry)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(RawEntry::into_entry).collect()
}

/// Success entries whose entity hash commit was not confirmed.
///
/// Entries never tried come first, then the least recently tried, so
/// entries whose entity stays missing rotate to the back.
pub fn list_unreconciled_successes(
    conn: &Connection,
    limit: usize,
) -> DatabaseResult<Vec<SyncLogEntry>> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {LOG_COLUMNS} FROM outbound_sync_log
         WHERE status = 'success' AND hash_committed = 0
         ORDER BY COALESCE(reconcile_attempted_at, 0) ASC, id ASC
         LIMIT ?1"
    ))?;
    let rows = stmt
        .query_map(params![limit as i64], map_raw_entry)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(RawEntry::into_entry).collect()
}

/// Row counts grouped by target and status.
pub fn status_counts(conn: &Connection) -> DatabaseResult<Vec<StatusCount>> {
    let mut stmt = conn.prepare_cached(
        "SELECT target_system, status, COUNT(*) FROM outbound_sync_log
         GROUP BY target_system, status
         ORDER BY target_system, status",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(target, status, count)| {
            Ok(StatusCount {
                target_system: parse_target(&target)?,
                status: SyncStatus::from_str(&status),
                count,
            })
        })
        .collect()
}

// ==========================================
// Sync log: writes
// ==========================================

/// Insert a new pending entry, due immediately.
///
/// A duplicate idempotency key surfaces as [`DatabaseError::UniqueViolation`].
pub fn insert_sync_log_entry(
    conn: &Connection,
    entry: &NewSyncLogEntry,
    now: DateTime<Utc>,
) -> DatabaseResult<SyncLogEntry> {
    let now_ms = now.timestamp_millis();
    let payload = serde_json::to_string(&entry.request_payload)?;

    conn.execute(
        "INSERT INTO outbound_sync_log (entity_type, entity_id, target_system, operation,
            idempotency_key, payload_hash, request_payload, status, retry_count,
            next_retry_at, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'pending', 0, ?8, ?8, ?8)",
        params![
            entry.entity_type,
            entry.entity_id,
            entry.target_system.as_str(),
            entry.operation.as_str(),
            entry.idempotency_key,
            entry.payload_hash,
            payload,
            now_ms,
        ],
    )
    .map_err(DatabaseError::from_write)?;

    let id = conn.last_insert_rowid();
    debug!(id, idempotency_key = %entry.idempotency_key, "Inserted sync log entry");

    get_sync_log_entry(conn, id)?
        .ok_or_else(|| DatabaseError::NotFound("Sync log entry not found after insert".to_string()))
}

/// Atomically claim up to `limit` due entries, oldest `next_retry_at` first.
///
/// An entry is due when it is `pending` or `failed`, has a `next_retry_at`
/// at or before `now`, and carries no live claim. Claims taken at or before
/// `stale_before` are considered abandoned. Claimed rows move to `pending`
/// (in flight) and carry `claim_token`.
pub fn claim_due_entries(
    conn: &Connection,
    claim_token: &str,
    now: DateTime<Utc>,
    stale_before: DateTime<Utc>,
    limit: usize,
) -> DatabaseResult<Vec<SyncLogEntry>> {
    let mut stmt = conn.prepare_cached(&format!(
        "UPDATE outbound_sync_log
         SET status = 'pending', claim_token = ?1, claimed_at = ?2, updated_at = ?2
         WHERE id IN (
             SELECT id FROM outbound_sync_log
             WHERE status IN ('pending', 'failed')
               AND next_retry_at IS NOT NULL
               AND next_retry_at <= ?2
               AND (claim_token IS NULL OR claimed_at <= ?3)
             ORDER BY next_retry_at ASC, id ASC
             LIMIT ?4
         )
         RETURNING {LOG_COLUMNS}"
    ))?;

    let rows = stmt
        .query_map(
            params![
                claim_token,
                now.timestamp_millis(),
                stale_before.timestamp_millis(),
                limit as i64
            ],
            map_raw_entry,
        )?
        .collect::<Result<Vec<_>, _>>()?;

    let mut entries = rows
        .into_iter()
        .map(RawEntry::into_entry)
        .collect::<DatabaseResult<Vec<_>>>()?;
    // RETURNING order is unspecified
    entries.sort_by(|a, b| a.next_retry_at.cmp(&b.next_retry_at).then(a.id.cmp(&b.id)));
    Ok(entries)
}

/// Claim one specific entry regardless of its `next_retry_at`.
///
/// Returns `None` when the entry is terminal, absorbing, or claimed by
/// someone else.
pub fn claim_entry(
    conn: &Connection,
    id: i64,
    claim_token: &str,
    now: DateTime<Utc>,
    stale_before: DateTime<Utc>,
) -> DatabaseResult<Option<SyncLogEntry>> {
    let mut stmt = conn.prepare_cached(&format!(
        "UPDATE outbound_sync_log
         SET status = 'pending', claim_token = ?2, claimed_at = ?3, updated_at = ?3
         WHERE id = ?1
           AND status IN ('pending', 'failed')
           AND next_retry_at IS NOT NULL
           AND (claim_token IS NULL OR claimed_at <= ?4)
         RETURNING {LOG_COLUMNS}"
    ))?;

    let row = stmt
        .query_row(
            params![
                id,
                claim_token,
                now.timestamp_millis(),
                stale_before.timestamp_millis()
            ],
            map_raw_entry,
        )
        .optional()?;
    row.map(RawEntry::into_entry).transpose()
}

/// Restart the claim's age at `now`, right before the outbound call.
///
/// Returns false when the claim was taken over while the entry waited.
pub fn refresh_claim(
    conn: &Connection,
    id: i64,
    claim_token: &str,
    now: DateTime<Utc>,
) -> DatabaseResult<bool> {
    let updated = conn.execute(
        "UPDATE outbound_sync_log
         SET claimed_at = ?3, updated_at = ?3
         WHERE id = ?1 AND claim_token = ?2 AND status = 'pending'",
        params![id, claim_token, now.timestamp_millis()],
    )?;
    Ok(updated == 1)
}

/// Record a failed attempt for a claimed entry and release the claim.
///
/// Returns false when the claim was lost.
pub fn record_failure(
    conn: &Connection,
    id: i64,
    claim_token: &str,
    failure: &FailureRecord,
    now: DateTime<Utc>,
) -> DatabaseResult<bool> {
    let response = failure
        .response_payload
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    let updated = conn.execute(
        "UPDATE outbound_sync_log
         SET status = 'failed',
             error_message = ?3,
             error_kind = ?4,
             retry_count = ?5,
             next_retry_at = ?6,
             response_payload = COALESCE(?7, response_payload),
             claim_token = NULL,
             claimed_at = NULL,
             updated_at = ?8
         WHERE id = ?1 AND claim_token = ?2",
        params![
            id,
            claim_token,
            failure.error_message,
            failure.error_kind.as_str(),
            failure.retry_count,
            failure.next_retry_at.map(|at| at.timestamp_millis()),
            response,
            now.timestamp_millis(),
        ],
    )?;
    Ok(updated == 1)
}

/// Mark a claimed entry as skipped (content already delivered).
pub fn mark_skipped(
    conn: &Connection,
    id: i64,
    claim_token: &str,
    now: DateTime<Utc>,
) -> DatabaseResult<bool> {
    let updated = conn.execute(
        "UPDATE outbound_sync_log
         SET status = 'skipped',
             next_retry_at = NULL,
             claim_token = NULL,
             claimed_at = NULL,
             hash_committed = 1,
             completed_at = ?3,
             updated_at = ?3
         WHERE id = ?1 AND claim_token = ?2",
        params![id, claim_token, now.timestamp_millis()],
    )?;
    Ok(updated == 1)
}

/// Mark a claimed entry as successful and commit the entity hash in the same
/// transaction.
///
/// - `Ok(true)`: both writes committed.
/// - `Ok(false)`: the claim was lost; nothing was written.
/// - `Err(HashCommit)`: the entity write failed; nothing was written.
pub fn complete_success_with_hash_commit(
    conn: &Connection,
    entry: &SyncLogEntry,
    claim_token: &str,
    success: &SuccessRecord,
    now: DateTime<Utc>,
) -> DatabaseResult<bool> {
    let tx = conn.unchecked_transaction()?;

    if !write_success(&tx, entry.id, claim_token, success, true, now)? {
        tx.rollback()?;
        return Ok(false);
    }

    if let Err(e) = commit_entity_sync_hash(
        &tx,
        &entry.entity_type,
        &entry.entity_id,
        entry.target_system,
        entry.committed_hash(),
        now,
    ) {
        tx.rollback()?;
        return Err(DatabaseError::HashCommit(e.to_string()));
    }

    tx.commit()?;
    Ok(true)
}

/// Mark a claimed entry as successful without the hash commit
/// (`hash_committed = 0`), leaving the entity write to the reconciler.
pub fn complete_success_unreconciled(
    conn: &Connection,
    id: i64,
    claim_token: &str,
    success: &SuccessRecord,
    now: DateTime<Utc>,
) -> DatabaseResult<bool> {
    write_success(conn, id, claim_token, success, false, now)
}

fn write_success(
    conn: &Connection,
    id: i64,
    claim_token: &str,
    success: &SuccessRecord,
    hash_committed: bool,
    now: DateTime<Utc>,
) -> DatabaseResult<bool> {
    let response = serde_json::to_string(&success.response_payload)?;
    let updated = conn.execute(
        "UPDATE outbound_sync_log
         SET status = 'success',
             external_id = COALESCE(?3, external_id),
             response_payload = ?4,
             error_message = NULL,
             error_kind = NULL,
             next_retry_at = NULL,
             claim_token = NULL,
             claimed_at = NULL,
             hash_committed = ?5,
             completed_at = ?6,
             updated_at = ?6
         WHERE id = ?1 AND claim_token = ?2",
        params![
            id,
            claim_token,
            success.external_id,
            response,
            hash_committed,
            now.timestamp_millis(),
        ],
    )?;
    Ok(updated == 1)
}

/// Reconciler path: commit the hash of an already-successful entry and flag
/// it confirmed, in one transaction.
pub fn reconcile_success_hash(
    conn: &Connection,
    entry: &SyncLogEntry,
    now: DateTime<Utc>,
) -> DatabaseResult<bool> {
    let tx = conn.unchecked_transaction()?;

    // Only move the entity hash forward if no newer success superseded this one
    let newer_success: bool = tx.query_row(
        "SELECT EXISTS(
             SELECT 1 FROM outbound_sync_log
             WHERE entity_type = ?1 AND entity_id = ?2 AND target_system = ?3
               AND status = 'success' AND hash_committed = 1 AND id > ?4
         )",
        params![
            entry.entity_type,
            entry.entity_id,
            entry.target_system.as_str(),
            entry.id
        ],
        |row| row.get(0),
    )?;

    if !newer_success {
        commit_entity_sync_hash(
            &tx,
            &entry.entity_type,
            &entry.entity_id,
            entry.target_system,
            entry.committed_hash(),
            entry.completed_at.unwrap_or(now),
        )?;
    }

    let updated = tx.execute(
        "UPDATE outbound_sync_log
         SET hash_committed = 1, updated_at = ?2
         WHERE id = ?1 AND status = 'success' AND hash_committed = 0",
        params![entry.id, now.timestamp_millis()],
    )?;

    tx.commit()?;
    Ok(updated == 1)
}

/// Note a reconciliation attempt that could not commit the hash yet.
pub fn mark_reconcile_attempt(
    conn: &Connection,
    id: i64,
    now: DateTime<Utc>,
) -> DatabaseResult<bool> {
    let updated = conn.execute(
        "UPDATE outbound_sync_log
         SET reconcile_attempted_at = ?2
         WHERE id = ?1 AND status = 'success' AND hash_committed = 0",
        params![id, now.timestamp_millis()],
    )?;
    Ok(updated == 1)
}

/// Operator action: make a terminal failure due again with a fresh retry budget.
pub fn requeue_entry(conn: &Connection, id: i64, now: DateTime<Utc>) -> DatabaseResult<bool> {
    let updated = conn.execute(
        "UPDATE outbound_sync_log
         SET status = 'pending',
             retry_count = 0,
             next_retry_at = ?2,
             claim_token = NULL,
             claimed_at = NULL,
             updated_at = ?2
         WHERE id = ?1 AND status = 'failed' AND next_retry_at IS NULL",
        params![id, now.timestamp_millis()],
    )?;
    Ok(updated == 1)
}

// ==========================================
// Syncable entities
// ==========================================

/// Insert or replace the data of a syncable entity (clears soft delete).
pub fn upsert_syncable_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
    data: &Value,
    now: DateTime<Utc>,
) -> DatabaseResult<()> {
    let table = table_for(entity_type)?;
    let data = serde_json::to_string(data)?;
    conn.execute(
        &format!(
            "INSERT INTO {table} (id, data, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3)
             ON CONFLICT(id) DO UPDATE SET
                 data = excluded.data,
                 updated_at = excluded.updated_at,
                 deleted_at = NULL"
        ),
        params![entity_id, data, now.timestamp_millis()],
    )?;
    Ok(())
}

/// Soft-delete a syncable entity.
pub fn soft_delete_syncable_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
    now: DateTime<Utc>,
) -> DatabaseResult<bool> {
    let table = table_for(entity_type)?;
    let updated = conn.execute(
        &format!(
            "UPDATE {table} SET deleted_at = ?2, updated_at = ?2
             WHERE id = ?1 AND deleted_at IS NULL"
        ),
        params![entity_id, now.timestamp_millis()],
    )?;
    Ok(updated == 1)
}

/// Load a syncable entity with its per-target sync state.
pub fn get_syncable_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> DatabaseResult<Option<SyncableEntity>> {
    let table = table_for(entity_type)?;
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT id, data, splynx_sync_hash, last_synced_to_splynx,
                erpnext_sync_hash, last_synced_to_erpnext,
                created_at, updated_at, deleted_at
         FROM {table} WHERE id = ?1"
    ))?;

    let raw = stmt
        .query_row(params![entity_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, Option<i64>>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, Option<i64>>(5)?,
                row.get::<_, i64>(6)?,
                row.get::<_, i64>(7)?,
                row.get::<_, Option<i64>>(8)?,
            ))
        })
        .optional()?;

    let Some((
        id,
        data,
        splynx_hash,
        splynx_at,
        erpnext_hash,
        erpnext_at,
        created,
        updated,
        deleted,
    )) = raw
    else {
        return Ok(None);
    };

    let mut sync_state = HashMap::new();
    sync_state.insert(
        TargetSystem::Splynx,
        EntitySyncState {
            sync_hash: splynx_hash,
            last_synced_at: splynx_at.map(from_millis),
        },
    );
    sync_state.insert(
        TargetSystem::Erpnext,
        EntitySyncState {
            sync_hash: erpnext_hash,
            last_synced_at: erpnext_at.map(from_millis),
        },
    );

    Ok(Some(SyncableEntity {
        entity_type: entity_type.to_string(),
        entity_id: id,
        data: serde_json::from_str(&data)?,
        sync_state,
        created_at: from_millis(created),
        updated_at: from_millis(updated),
        deleted_at: deleted.map(from_millis),
    }))
}

/// Write `<target>_sync_hash` and `last_synced_to_<target>` on the entity.
///
/// A `None` hash clears the stored hash (the entity was deleted remotely).
pub fn commit_entity_sync_hash(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
    target: TargetSystem,
    sync_hash: Option<&str>,
    synced_at: DateTime<Utc>,
) -> DatabaseResult<()> {
    let table = table_for(entity_type)?;
    let updated = conn.execute(
        &format!(
            "UPDATE {table} SET {hash} = ?2, {synced_at} = ?3 WHERE id = ?1",
            hash = target.hash_column(),
            synced_at = target.synced_at_column(),
        ),
        params![entity_id, sync_hash, synced_at.timestamp_millis()],
    )?;

    if updated == 0 {
        return Err(DatabaseError::NotFound(format!(
            "{} {} has no {} row",
            entity_type, entity_id, table
        )));
    }
    Ok(())
}

// ==========================================
// Row mapping helpers
// ==========================================

/// Column values as stored; converted to [`SyncLogEntry`] outside the
/// rusqlite row callback so parse failures keep their own error type.
struct RawEntry {
    id: i64,
    entity_type: String,
    entity_id: String,
    target_system: String,
    operation: String,
    idempotency_key: String,
    payload_hash: String,
    request_payload: String,
    response_payload: Option<String>,
    status: String,
    external_id: Option<String>,
    error_message: Option<String>,
    error_kind: Option<String>,
    retry_count: i64,
    next_retry_at: Option<i64>,
    claim_token: Option<String>,
    claimed_at: Option<i64>,
    hash_committed: bool,
    created_at: i64,
    updated_at: i64,
    completed_at: Option<i64>,
}

fn map_raw_entry(row: &Row<'_>) -> rusqlite::Result<RawEntry> {
    Ok(RawEntry {
        id: row.get(0)?,
        entity_type: row.get(1)?,
        entity_id: row.get(2)?,
        target_system: row.get(3)?,
        operation: row.get(4)?,
        idempotency_key: row.get(5)?,
        payload_hash: row.get(6)?,
        request_payload: row.get(7)?,
        response_payload: row.get(8)?,
        status: row.get(9)?,
        external_id: row.get(10)?,
        error_message: row.get(11)?,
        error_kind: row.get(12)?,
        retry_count: row.get(13)?,
        next_retry_at: row.get(14)?,
        claim_token: row.get(15)?,
        claimed_at: row.get(16)?,
        hash_committed: row.get(17)?,
        created_at: row.get(18)?,
        updated_at: row.get(19)?,
        completed_at: row.get(20)?,
    })
}

impl RawEntry {
    fn into_entry(self) -> DatabaseResult<SyncLogEntry> {
        let operation = SyncOperation::parse(&self.operation).ok_or_else(|| {
            DatabaseError::InvalidData(format!("unknown operation '{}'", self.operation))
        })?;

        Ok(SyncLogEntry {
            id: self.id,
            entity_type: self.entity_type,
            entity_id: self.entity_id,
            target_system: parse_target(&self.target_system)?,
            operation,
            idempotency_key: self.idempotency_key,
            payload_hash: self.payload_hash,
            request_payload: serde_json::from_str(&self.request_payload)?,
            response_payload: self
                .response_payload
                .as_deref()
                .map(serde_json::from_str)
                .transpose()?,
            status: SyncStatus::from_str(&self.status),
            external_id: self.external_id,
            error_message: self.error_message,
            error_kind: self.error_kind.as_deref().and_then(FailureKind::parse),
            retry_count: u32::try_from(self.retry_count).unwrap_or(0),
            next_retry_at: self.next_retry_at.map(from_millis),
            claim_token: self.claim_token,
            claimed_at: self.claimed_at.map(from_millis),
            hash_committed: self.hash_committed,
            created_at: from_millis(self.created_at),
            updated_at: from_millis(self.updated_at),
            completed_at: self.completed_at.map(from_millis),
        })
    }
}

fn parse_target(raw: &str) -> DatabaseResult<TargetSystem> {
    TargetSystem::parse(raw)
        .ok_or_else(|| DatabaseError::InvalidData(format!("unknown target system '{}'", raw)))
}

fn table_for(entity_type: &str) -> DatabaseResult<&'static str> {
    syncable_table(entity_type)
        .ok_or_else(|| DatabaseError::UnknownEntityType(entity_type.to_string()))
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(ms).unwrap_or_else(Utc::now)
}
