//! Outsync daemon - writes locally-originated entity changes back to Splynx and ERPNext.

mod app;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use sync_config_and_utils::{init_logging, Config, Paths};
use sync_database::TargetSystem;

/// Outsync daemon command-line interface.
#[derive(Parser, Debug)]
#[command(name = "outsync-daemon")]
#[command(about = "Outbound sync daemon for Splynx and ERPNext write-back")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error). Defaults to the configured level
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Base directory for runtime files (config, database, logs). Defaults to ~/.outsync
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the retry scheduler until interrupted
    Run {
        /// Also log to stderr
        #[arg(short, long)]
        foreground: bool,
    },
    /// Run a single scheduling pass and print its report
    RunOnce,
    /// Show log counts and entries that need an operator
    Status {
        /// Maximum entries listed
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Store (or replace) the local copy of an entity
    Upsert {
        entity_type: String,
        entity_id: String,
        /// Entity data as a JSON object
        data: String,
    },
    /// Soft-delete the local copy of an entity
    Delete {
        entity_type: String,
        entity_id: String,
    },
    /// Enqueue a write-back if the entity changed since its last sync
    Enqueue {
        entity_type: String,
        entity_id: String,
        #[arg(value_parser = parse_target)]
        target: TargetSystem,
    },
    /// Show every log entry of one entity towards one target
    History {
        entity_type: String,
        entity_id: String,
        #[arg(value_parser = parse_target)]
        target: TargetSystem,
    },
    /// Retry a terminally failed entry from scratch
    Requeue { id: i64 },
}

fn parse_target(s: &str) -> Result<TargetSystem, String> {
    TargetSystem::parse(s).ok_or_else(|| format!("unknown target system '{}' (splynx, erpnext)", s))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let paths = match cli.base_dir {
        Some(base) => Paths::with_base_dir(base),
        None => Paths::new()?,
    };
    paths.ensure_dirs()?;
    let config = Config::load(&paths)?;

    let level = cli.log_level.as_deref().unwrap_or(&config.log_level);
    let foreground = matches!(cli.command, None | Some(Commands::Run { foreground: true }));
    init_logging("outsync-daemon", level, &paths, foreground);

    let engine = app::build_engine(&config, &paths).await?;

    match cli.command {
        Some(Commands::Run { .. }) | None => app::run_daemon(engine).await?,
        Some(Commands::RunOnce) => app::run_once(&engine).await?,
        Some(Commands::Status { limit }) => app::show_status(&engine, limit).await?,
        Some(Commands::Upsert {
            entity_type,
            entity_id,
            data,
        }) => app::upsert_entity(&engine, &entity_type, &entity_id, &data).await?,
        Some(Commands::Delete {
            entity_type,
            entity_id,
        }) => app::delete_entity(&engine, &entity_type, &entity_id).await?,
        Some(Commands::Enqueue {
            entity_type,
            entity_id,
            target,
        }) => app::enqueue_change(&engine, &entity_type, &entity_id, target).await?,
        Some(Commands::History {
            entity_type,
            entity_id,
            target,
        }) => app::show_history(&engine, &entity_type, &entity_id, target).await?,
        Some(Commands::Requeue { id }) => app::requeue_entry(&engine, id).await?,
    }

    Ok(())
}
