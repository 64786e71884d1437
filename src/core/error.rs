//! Engine error types
//!
//! Only construction problems surface as errors. Evaluation of a built
//! `Ability` never fails; malformed conditions resolve to a non-match.

use thiserror::Error;

/// Errors that can occur while loading configuration or building an ability
#[derive(Error, Debug)]
pub enum AbilityError {
    /// One element of the rule source is not a valid permission rule
    #[error("Rule {index} rejected: {reason}")]
    RuleRejected { index: usize, reason: String },

    /// The rule source as a whole is not a sequence of rules
    #[error("Invalid rule source: {0}")]
    InvalidRuleSource(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AbilityError {
    /// Create a rule rejection for the rule at `index`
    pub fn rule_rejected(index: usize, reason: impl Into<String>) -> Self {
        AbilityError::RuleRejected {
            index,
            reason: reason.into(),
        }
    }

    /// Create an invalid configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        AbilityError::InvalidConfig(msg.into())
    }
}

/// Result type alias for engine operations
pub type AbilityResult<T> = Result<T, AbilityError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AbilityError::rule_rejected(3, "missing field `action`");
        assert_eq!(err.to_string(), "Rule 3 rejected: missing field `action`");

        let err = AbilityError::InvalidRuleSource("expected an array".into());
        assert_eq!(err.to_string(), "Invalid rule source: expected an array");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: AbilityError = io_err.into();
        assert!(matches!(err, AbilityError::Io(_)));
    }

    #[test]
    fn test_error_from_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: AbilityError = json_err.into();
        assert!(matches!(err, AbilityError::Serialization(_)));
    }
}
