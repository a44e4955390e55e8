//! Scheduler loop and single-pass runs.

use super::Engine;
use tracing::{error, info};

/// Run the scheduler loop until SIGINT or SIGTERM.
pub async fn run_daemon(engine: Engine) -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting outsync daemon");
    let handle = engine.scheduler.start();

    shutdown_signal().await;

    info!("Received shutdown signal, finishing current pass");
    handle.shutdown().await;
    info!("Outsync daemon stopped");
    Ok(())
}

/// Run one pass and print its report as JSON.
pub async fn run_once(engine: &Engine) -> Result<(), Box<dyn std::error::Error>> {
    let report = engine.scheduler.run_pending_sync_batch().await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
