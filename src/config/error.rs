//! Configuration error types.

use std::fmt;

/// Error raised while resolving a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Required value absent (and no environment fallback).
    Missing { key: String },
    /// Value present but not acceptable.
    Invalid { key: String, message: String },
    /// Redaction policy is not usable.
    Redaction { key: String, message: String },
    /// Value could not be parsed into the expected type.
    Parse {
        key: String,
        value: String,
        error: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(key: &str, message: impl Into<String>) -> Self {
        ConfigError::Invalid {
            key: key.into(),
            message: message.into(),
        }
    }

    pub(crate) fn redaction(key: &str, message: impl Into<String>) -> Self {
        ConfigError::Redaction {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Whether this is a redaction policy error rather than a general one.
    pub fn is_redaction(&self) -> bool {
        matches!(self, ConfigError::Redaction { .. })
    }

    /// Configuration key the error refers to.
    pub fn key(&self) -> &str {
        match self {
            ConfigError::Missing { key }
            | ConfigError::Invalid { key, .. }
            | ConfigError::Redaction { key, .. }
            | ConfigError::Parse { key, .. } => key,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing { key } => {
                write!(f, "missing required configuration: {}", key)
            }
            ConfigError::Invalid { key, message } => {
                write!(f, "invalid value for {}: {}", key, message)
            }
            ConfigError::Redaction { key, message } => {
                write!(f, "invalid redaction policy ({}): {}", key, message)
            }
            ConfigError::Parse { key, value, error } => {
                write!(f, "failed to parse {}='{}': {}", key, value, error)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
