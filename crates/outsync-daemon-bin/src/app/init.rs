//! Engine construction from configuration.

use outbound_sync_dispatcher::Dispatcher;
use outbound_sync_log::{EntityRepository, SyncLog};
use std::sync::Arc;
use sync_config_and_utils::{Config, Paths};
use sync_database::AsyncDatabase;
use sync_retry_scheduler::RetryScheduler;
use sync_target_clients::TargetRegistry;
use tracing::{info, warn};

/// Everything the daemon commands operate on, sharing one database handle.
pub struct Engine {
    pub log: SyncLog,
    pub entities: EntityRepository,
    pub scheduler: Arc<RetryScheduler>,
}

/// Open the database and build the dispatcher and scheduler from `config`.
pub async fn build_engine(
    config: &Config,
    paths: &Paths,
) -> Result<Engine, Box<dyn std::error::Error>> {
    let engine_config = config.engine.to_engine_config();
    let targets = TargetRegistry::from_config(config, engine_config.dispatch_timeout)?;
    if targets.systems().is_empty() {
        warn!("No target systems configured; due entries will be rescheduled");
    }

    let db = AsyncDatabase::open(&paths.database_file()).await?;
    db.health_check().await?;

    info!(
        database = %db.path(),
        targets = ?targets.systems(),
        batch_size = engine_config.batch_size,
        max_retries = engine_config.max_retries,
        "Sync engine initialized"
    );

    let dispatcher = Dispatcher::new(db.clone(), targets, engine_config);
    Ok(Engine {
        log: SyncLog::new(db.clone()),
        entities: EntityRepository::new(db),
        scheduler: Arc::new(RetryScheduler::new(Arc::new(dispatcher))),
    })
}
