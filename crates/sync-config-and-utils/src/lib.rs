//! Configuration, paths, errors and logging setup shared by the outsync crates.

mod config;
mod engine;
mod error;
mod logging;
mod paths;

pub use config::{Config, TargetSettings, DEFAULT_LOG_LEVEL};
pub use engine::{EngineSettings, SyncEngineConfig};
pub use error::{CoreError, CoreResult};
pub use logging::init_logging;
pub use paths::Paths;
