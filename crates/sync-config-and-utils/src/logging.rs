//! Logging initialization for the sync daemon.
//!
//! Thin wrapper over the observability package: structured JSONL to the
//! daemon's log file, compact stderr output in foreground mode.

use crate::Paths;

/// Initialize logging for a service.
///
/// `RUST_LOG` takes precedence over `level` when set.
pub fn init_logging(service_name: &str, level: &str, paths: &Paths, foreground: bool) {
    observability::init_with_config(observability::LogConfig {
        service_name: service_name.into(),
        default_level: level.into(),
        log_path: Some(paths.log_file()),
        also_stderr: foreground,
    });
}
