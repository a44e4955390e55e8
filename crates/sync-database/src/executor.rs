//! Async SQLite executor using a dedicated background thread.
//!
//! - One dedicated thread owns the connection; queries arrive over a channel
//!   and run in FIFO order.
//! - Callers `.await` results without blocking Tokio worker threads.
//! - Several processes (or several `AsyncDatabase`s in one process) may open
//!   the same file: WAL mode plus `busy_timeout` serialize their writers, and
//!   the claim queries in [`crate::queries`] are single statements so the
//!   database arbitrates concurrent schedulers.
//!
//! ```ignore
//! let db = AsyncDatabase::open(path).await?;
//! let due = db.call(move |conn| queries::claim_due_entries(conn, &token, now, stale, 50)).await?;
//! ```

use crate::{migrations, DatabaseError, DatabaseResult};
use std::path::Path;
use tokio_rusqlite::Connection;
use tracing::{debug, info};

const FILE_PRAGMAS: &str = "
    PRAGMA journal_mode = WAL;
    PRAGMA synchronous = NORMAL;
    PRAGMA foreign_keys = ON;
    PRAGMA cache_size = -64000;
    PRAGMA temp_store = MEMORY;
    PRAGMA busy_timeout = 5000;
";

const MEMORY_PRAGMAS: &str = "
    PRAGMA foreign_keys = ON;
    PRAGMA temp_store = MEMORY;
";

fn from_tokio_rusqlite(e: tokio_rusqlite::Error) -> DatabaseError {
    match e {
        tokio_rusqlite::Error::Rusqlite(e) => DatabaseError::Sqlite(e),
        tokio_rusqlite::Error::ConnectionClosed => {
            DatabaseError::Connection("Connection closed".to_string())
        }
        other => DatabaseError::Connection(other.to_string()),
    }
}

/// Async SQLite database with a dedicated executor thread.
#[derive(Clone)]
pub struct AsyncDatabase {
    conn: Connection,
    path: String,
}

impl AsyncDatabase {
    /// Open (or create) a database file, enable WAL and run migrations.
    pub async fn open(path: &Path) -> DatabaseResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let path_str = path.to_string_lossy().to_string();
        info!(path = %path_str, "Opening sync database");

        let conn = Connection::open(path)
            .await
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;

        let db = Self {
            conn,
            path: path_str,
        };
        db.initialize(FILE_PRAGMAS).await?;

        info!(path = %db.path, "Sync database initialized with WAL mode");
        Ok(db)
    }

    /// Open a private in-memory database (tests, dry runs).
    pub async fn open_in_memory() -> DatabaseResult<Self> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;

        let db = Self {
            conn,
            path: ":memory:".to_string(),
        };
        db.initialize(MEMORY_PRAGMAS).await?;
        Ok(db)
    }

    async fn initialize(&self, pragmas: &'static str) -> DatabaseResult<()> {
        self.call(move |conn| {
            conn.execute_batch(pragmas)?;
            migrations::run_migrations(conn)
        })
        .await
    }

    /// Execute a closure on the database connection.
    ///
    /// The closure runs on the dedicated SQLite thread; it must only run SQL
    /// and light row mapping. No network calls, no hashing, no locks.
    pub async fn call<F, T>(&self, f: F) -> DatabaseResult<T>
    where
        F: FnOnce(&rusqlite::Connection) -> DatabaseResult<T> + Send + 'static,
        T: Send + 'static,
    {
        // The inner DatabaseResult rides inside tokio_rusqlite's Ok so that
        // our own error variants survive the trip across the channel.
        let outer = self.conn.call(move |conn| Ok(f(conn))).await;

        match outer {
            Ok(inner) => inner,
            Err(e) => Err(from_tokio_rusqlite(e)),
        }
    }

    /// Get the database file path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Check that the executor thread is alive and the schema is readable.
    pub async fn health_check(&self) -> DatabaseResult<()> {
        self.call(|conn| {
            conn.query_row("SELECT COUNT(*) FROM migrations", [], |row| {
                row.get::<_, i64>(0)
            })?;
            Ok(())
        })
        .await?;
        debug!(path = %self.path, "Database health check passed");
        Ok(())
    }
}
