//! SQLite persistence for the outbound sync engine.
//!
//! This crate provides:
//! - Async SQLite executor with a dedicated thread ([`AsyncDatabase`])
//! - Versioned migrations for `outbound_sync_log` and the syncable tables
//! - Model types for log entries and syncable entities
//! - Query functions for enqueueing, claiming and completing log entries
//!
//! # Usage
//!
//! ```ignore
//! let db = AsyncDatabase::open(path).await?;
//! let entry = db.call(move |conn| queries::get_sync_log_entry(conn, id)).await?;
//! ```
//!
//! Only SQL belongs inside `db.call()`; network calls and hashing happen
//! outside so the single database thread is never blocked on them.

mod error;
mod executor;
mod migrations;
mod models;
pub mod queries;

pub use error::{DatabaseError, DatabaseResult};
pub use executor::AsyncDatabase;
pub use migrations::{run_migrations, CURRENT_VERSION};
pub use models::*;
