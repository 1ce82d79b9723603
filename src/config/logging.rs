//! Logging configuration.

use super::parse::{env_opt, env_or};
use super::{ConfigError, LogLevel};

/// Crate target used in default filters.
const CRATE_TARGET: &str = "req_insight";

/// Logging configuration for [`crate::logging::init_logging`].
#[derive(Clone, Debug)]
pub struct LoggingConfig {
    /// `tracing` filter directive.
    pub filter: String,
    /// Service name stamped on every line.
    pub service_name: String,
}

impl LoggingConfig {
    /// Load configuration from environment variables.
    ///
    /// Priority: LOG_LEVEL > RUST_LOG > default
    ///
    /// LOG_LEVEL accepts simple values: trace, debug, info, warn, error.
    /// RUST_LOG accepts full filter syntax: `req_insight=debug,request=info`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            filter: Self::resolve_log_filter(),
            service_name: env_or("SERVICE_NAME", CRATE_TARGET),
        })
    }

    /// Configuration matching a resolved config's service and level.
    ///
    /// `RUST_LOG` still wins when set, so operators can widen the filter.
    pub fn for_service(service_name: &str, level: LogLevel) -> Self {
        let filter = env_opt("RUST_LOG").unwrap_or_else(|| Self::level_filter(level.as_str()));
        Self {
            filter,
            service_name: service_name.to_string(),
        }
    }

    /// Filter covering this crate and emitted request records.
    fn level_filter(level: &str) -> String {
        format!("{}={},request={}", CRATE_TARGET, level, level)
    }

    /// Resolve log filter from environment.
    ///
    /// Priority: LOG_LEVEL > RUST_LOG > default (info)
    fn resolve_log_filter() -> String {
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            let level = level.to_lowercase();
            match level.as_str() {
                "trace" | "debug" | "info" | "warn" | "error" => {
                    return Self::level_filter(&level);
                }
                _ => {
                    // Logging is not up yet
                    eprintln!(
                        "Warning: Invalid LOG_LEVEL '{}', expected: trace, debug, info, warn, error",
                        level
                    );
                }
            }
        }

        if let Ok(filter) = std::env::var("RUST_LOG") {
            return filter;
        }

        Self::level_filter("info")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_log_level_priority() {
        env::remove_var("LOG_LEVEL");
        env::remove_var("RUST_LOG");

        assert_eq!(LoggingConfig::resolve_log_filter(), "req_insight=info,request=info");

        env::set_var("RUST_LOG", "req_insight=warn");
        assert_eq!(LoggingConfig::resolve_log_filter(), "req_insight=warn");

        // LOG_LEVEL takes priority over RUST_LOG
        env::set_var("LOG_LEVEL", "debug");
        assert_eq!(LoggingConfig::resolve_log_filter(), "req_insight=debug,request=debug");

        // Invalid LOG_LEVEL falls through
        env::set_var("LOG_LEVEL", "loud");
        assert_eq!(LoggingConfig::resolve_log_filter(), "req_insight=warn");

        env::remove_var("LOG_LEVEL");
        env::remove_var("RUST_LOG");
    }

    #[test]
    fn test_level_filter() {
        assert_eq!(LoggingConfig::level_filter("error"), "req_insight=error,request=error");
    }
}
