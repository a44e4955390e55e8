//! Database migrations.
//!
//! Migrations run in order and are tracked in the `migrations` table.
//! All timestamps are stored as epoch milliseconds.

use crate::DatabaseResult;
use rusqlite::Connection;
use tracing::{debug, info};

/// Current schema version.
pub const CURRENT_VERSION: i32 = 4;

/// Run all pending migrations.
pub fn run_migrations(conn: &Connection) -> DatabaseResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    let current_version: i32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM migrations",
        [],
        |row| row.get(0),
    )?;

    info!(current_version, target_version = CURRENT_VERSION, "Running migrations");

    if current_version < 1 {
        migrate_v1_outbound_sync_log(conn)?;
    }
    if current_version < 2 {
        migrate_v2_syncable_tables(conn)?;
    }
    if current_version < 3 {
        migrate_v3_audit_guards(conn)?;
    }
    if current_version < 4 {
        migrate_v4_reconcile_attempts(conn)?;
    }

    info!("Migrations complete");
    Ok(())
}

fn record_migration(conn: &Connection, version: i32, name: &str) -> DatabaseResult<()> {
    conn.execute(
        "INSERT INTO migrations (version, name) VALUES (?1, ?2)",
        rusqlite::params![version, name],
    )?;
    debug!(version, name, "Migration applied");
    Ok(())
}

/// V1: the outbound sync log.
fn migrate_v1_outbound_sync_log(conn: &Connection) -> DatabaseResult<()> {
    info!("Applying migration v1: outbound_sync_log");

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS outbound_sync_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            target_system TEXT NOT NULL
                CHECK (target_system IN ('splynx', 'erpnext')),
            operation TEXT NOT NULL
                CHECK (operation IN ('create', 'update', 'delete')),
            idempotency_key TEXT NOT NULL,
            payload_hash TEXT NOT NULL,
            request_payload TEXT NOT NULL,
            response_payload TEXT,
            status TEXT NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending', 'success', 'failed', 'skipped')),
            external_id TEXT,
            error_message TEXT,
            error_kind TEXT CHECK (error_kind IS NULL OR error_kind IN ('transient', 'permanent')),
            retry_count INTEGER NOT NULL DEFAULT 0,
            next_retry_at INTEGER,
            claim_token TEXT,
            claimed_at INTEGER,
            hash_committed INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            completed_at INTEGER
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_outbound_sync_log_idempotency_key
            ON outbound_sync_log(idempotency_key);
        CREATE INDEX IF NOT EXISTS idx_outbound_sync_log_due
            ON outbound_sync_log(status, next_retry_at);
        CREATE INDEX IF NOT EXISTS idx_outbound_sync_log_entity
            ON outbound_sync_log(entity_type, entity_id, target_system);
        ",
    )?;

    record_migration(conn, 1, "outbound_sync_log")?;
    Ok(())
}

/// V2: syncable tables carrying per-target hash/timestamp columns.
fn migrate_v2_syncable_tables(conn: &Connection) -> DatabaseResult<()> {
    info!("Applying migration v2: syncable tables");

    for table in ["unified_contacts", "invoices"] {
        conn.execute_batch(&format!(
            "
            CREATE TABLE IF NOT EXISTS {table} (
                id TEXT PRIMARY KEY,
                data TEXT NOT NULL,
                splynx_sync_hash TEXT,
                last_synced_to_splynx INTEGER,
                erpnext_sync_hash TEXT,
                last_synced_to_erpnext INTEGER,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                deleted_at INTEGER
            );

            CREATE INDEX IF NOT EXISTS idx_{table}_updated_at ON {table}(updated_at);
            "
        ))?;
    }

    record_migration(conn, 2, "syncable_tables")?;
    Ok(())
}

/// V3: audit guards on the sync log.
///
/// Log rows are the permanent audit trail: they cannot be deleted, and
/// `success` / `skipped` rows cannot change status.
fn migrate_v3_audit_guards(conn: &Connection) -> DatabaseResult<()> {
    info!("Applying migration v3: audit guards");

    conn.execute_batch(
        "
        CREATE TRIGGER IF NOT EXISTS outbound_sync_log_no_delete
        BEFORE DELETE ON outbound_sync_log
        BEGIN
            SELECT RAISE(ABORT, 'outbound_sync_log rows are permanent');
        END;

        CREATE TRIGGER IF NOT EXISTS outbound_sync_log_absorbing_status
        BEFORE UPDATE OF status ON outbound_sync_log
        WHEN OLD.status IN ('success', 'skipped') AND NEW.status != OLD.status
        BEGIN
            SELECT RAISE(ABORT, 'success and skipped are final');
        END;

        CREATE INDEX IF NOT EXISTS idx_outbound_sync_log_unreconciled
            ON outbound_sync_log(id)
            WHERE status = 'success' AND hash_committed = 0;
        ",
    )?;

    record_migration(conn, 3, "audit_guards")?;
    Ok(())
}

/// V4: track reconciliation attempts so unresolvable entries rotate.
fn migrate_v4_reconcile_attempts(conn: &Connection) -> DatabaseResult<()> {
    info!("Applying migration v4: reconcile attempts");

    conn.execute_batch(
        "
        ALTER TABLE outbound_sync_log ADD COLUMN reconcile_attempted_at INTEGER;
        ",
    )?;

    record_migration(conn, 4, "reconcile_attempts")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn applied_versions(conn: &Connection) -> Vec<i32> {
        let mut stmt = conn
            .prepare("SELECT version FROM migrations ORDER BY version")
            .unwrap();
        stmt.query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<i32>, _>>()
            .unwrap()
    }

    #[test]
    fn migrations_apply_all_versions() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        assert_eq!(applied_versions(&conn), vec![1, 2, 3, 4]);
    }

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();
        assert_eq!(applied_versions(&conn).len(), CURRENT_VERSION as usize);
    }

    #[test]
    fn log_rows_cannot_be_deleted() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        conn.execute(
            "INSERT INTO outbound_sync_log (entity_type, entity_id, target_system, operation,
                idempotency_key, payload_hash, request_payload, created_at, updated_at)
             VALUES ('contact', '1', 'splynx', 'create', 'k', 'h', '{}', 0, 0)",
            [],
        )
        .unwrap();

        let result = conn.execute("DELETE FROM outbound_sync_log", []);
        assert!(result.is_err());
    }

    #[test]
    fn success_status_is_final() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        conn.execute(
            "INSERT INTO outbound_sync_log (entity_type, entity_id, target_system, operation,
                idempotency_key, payload_hash, request_payload, status, created_at, updated_at)
             VALUES ('contact', '1', 'splynx', 'create', 'k', 'h', '{}', 'success', 0, 0)",
            [],
        )
        .unwrap();

        let result = conn.execute("UPDATE outbound_sync_log SET status = 'failed'", []);
        assert!(result.is_err());

        // Non-status columns stay writable (hash reconciliation)
        conn.execute("UPDATE outbound_sync_log SET hash_committed = 1", [])
            .unwrap();
    }
}
