//! Core types for the engine
//!
//! - `EngineConfig` / `LoggingConfig` - Configuration
//! - `AbilityError` - Error types

pub mod config;
pub mod error;

pub use config::{EngineConfig, LoggingConfig, DEFAULT_MAX_CONDITION_DEPTH};
pub use error::{AbilityError, AbilityResult};
