//! Value parsing helpers shared by the resolvers.

use std::str::FromStr;

use super::ConfigError;

/// Get environment variable with default value.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get optional environment variable (None if empty or missing).
pub fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.is_empty())
}

/// Trimmed value, `None` when missing or blank.
pub fn non_blank(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

/// Parse an optional string with `FromStr`, falling back to `default`.
pub fn parse_or<T: FromStr>(key: &str, value: Option<&str>, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match value {
        Some(v) => v.parse().map_err(|e: T::Err| ConfigError::Parse {
            key: key.into(),
            value: v.to_string(),
            error: e.to_string(),
        }),
        None => Ok(default),
    }
}

/// A byte count given as a number: finite, non-negative and integral.
pub fn byte_count(key: &str, value: f64) -> Result<usize, ConfigError> {
    if !value.is_finite() {
        return Err(ConfigError::invalid(key, "must be a finite number"));
    }
    if value < 0.0 {
        return Err(ConfigError::invalid(key, "must be >= 0"));
    }
    if value.fract() != 0.0 {
        return Err(ConfigError::invalid(key, "must be a whole number of bytes"));
    }
    if value > usize::MAX as f64 {
        return Err(ConfigError::invalid(key, "too large"));
    }
    Ok(value as usize)
}

/// Trim and lowercase a list of names; blank entries are rejected.
pub fn name_list(key: &str, names: &[String]) -> Result<Vec<String>, String> {
    names
        .iter()
        .enumerate()
        .map(|(i, n)| {
            let n = n.trim();
            if n.is_empty() {
                Err(format!("{}[{}] is blank", key, i))
            } else {
                Ok(n.to_ascii_lowercase())
            }
        })
        .collect()
}
