//! Engine Configuration
//!
//! Configuration types for the engine and its logging.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::{AbilityError, AbilityResult};

/// Default nesting limit for `$and` / `$or` / `$elemMatch`
pub const DEFAULT_MAX_CONDITION_DEPTH: usize = 32;

/// Configuration for building abilities
///
/// ```ignore
/// let config = EngineConfig::new()
///     .with_max_condition_depth(8)
///     .with_logging(LoggingConfig::new().with_json(true));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum nesting of logical and `$elemMatch` operators in a condition.
    /// Deeper trees never match.
    #[serde(default = "default_max_condition_depth")]
    pub max_condition_depth: usize,

    /// Logging setup used by the binary
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_max_condition_depth() -> usize {
    DEFAULT_MAX_CONDITION_DEPTH
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_condition_depth: DEFAULT_MAX_CONDITION_DEPTH,
            logging: LoggingConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load and validate a configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> AbilityResult<Self> {
        let file = File::open(path.as_ref())?;
        let reader = BufReader::new(file);
        let config: EngineConfig = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the maximum condition nesting depth
    pub fn with_max_condition_depth(mut self, depth: usize) -> Self {
        self.max_condition_depth = depth;
        self
    }

    /// Set the logging configuration
    pub fn with_logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = logging;
        self
    }

    /// Check that all values are within range
    pub fn validate(&self) -> AbilityResult<()> {
        if self.max_condition_depth == 0 {
            return Err(AbilityError::invalid_config(
                "max_condition_depth must be at least 1",
            ));
        }
        if self.logging.level.trim().is_empty() {
            return Err(AbilityError::invalid_config("logging.level must not be empty"));
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive (overridden by `RUST_LOG`)
    #[serde(default = "default_level")]
    pub level: String,

    /// Emit JSON lines instead of human readable output
    #[serde(default)]
    pub json: bool,

    /// Write logs to a daily rolling file in this directory instead of stderr
    pub directory: Option<PathBuf>,
}

fn default_level() -> String {
    "warn".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
            directory: None,
        }
    }
}

impl LoggingConfig {
    /// Create a logging configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default filter directive
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    /// Enable or disable JSON output
    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    /// Log to files in the given directory
    pub fn with_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.directory = Some(dir.into());
        self
    }
}
