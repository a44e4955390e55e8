//! Daemon wiring: engine construction, the scheduler loop and operator commands.

mod commands;
mod init;
mod lifecycle;

pub use commands::{
    delete_entity, enqueue_change, requeue_entry, show_history, show_status, upsert_entity,
};
pub use init::{build_engine, Engine};
pub use lifecycle::{run_daemon, run_once};
