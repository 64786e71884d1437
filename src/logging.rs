//! Logging setup
//!
//! Installs a `tracing` subscriber according to a [`LoggingConfig`]. The
//! `RUST_LOG` environment variable overrides the configured level.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::core::{AbilityError, AbilityResult, LoggingConfig};

/// File name prefix for rolling log files
const LOG_FILE_PREFIX: &str = "ability-engine.log";

/// Initialize the global subscriber
///
/// Keep the returned guard alive until shutdown so buffered lines are flushed.
pub fn init_logging(config: &LoggingConfig) -> AbilityResult<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| AbilityError::invalid_config(format!("invalid log level: {}", e)))?;

    let (writer, guard) = match &config.directory {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            tracing_appender::non_blocking(appender)
        }
        None => tracing_appender::non_blocking(std::io::stderr()),
    };

    let result = if config.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(writer))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).with_writer(writer))
            .try_init()
    };
    result.map_err(|e| AbilityError::invalid_config(format!("logging already initialized: {}", e)))?;

    tracing::debug!(level = config.level.as_str(), json = config.json, "logging initialized");
    Ok(guard)
}
