//! Redaction policy.

use std::collections::BTreeSet;

use serde::Deserialize;

use super::parse::name_list;
use super::ConfigError;

/// Default replacement token.
pub const DEFAULT_REPLACEMENT: &str = "[REDACTED]";

/// Headers redacted when no list is configured.
pub const DEFAULT_REDACT_HEADERS: &[&str] = &["authorization", "cookie", "set-cookie", "x-api-key"];

/// Resolved redaction policy. Header and query names are lowercased and
/// trimmed, JSON paths trimmed, the replacement is non-empty.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RedactionPolicy {
    pub headers: BTreeSet<String>,
    pub query_params: BTreeSet<String>,
    pub json_paths: Vec<String>,
    pub replacement: String,
}

impl Default for RedactionPolicy {
    fn default() -> Self {
        Self {
            headers: DEFAULT_REDACT_HEADERS.iter().map(|s| s.to_string()).collect(),
            query_params: BTreeSet::new(),
            json_paths: Vec::new(),
            replacement: DEFAULT_REPLACEMENT.to_string(),
        }
    }
}

/// A partial redaction policy: the `redact` section of a raw config, or a
/// per-request override. A list that is set replaces the base list.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RedactionOverride {
    pub headers: Option<Vec<String>>,
    pub query_params: Option<Vec<String>>,
    pub json_paths: Option<Vec<String>>,
    pub replacement: Option<String>,
}

impl RedactionOverride {
    pub fn headers<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.headers = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn query_params<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.query_params = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn json_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.json_paths = Some(paths.into_iter().map(Into::into).collect());
        self
    }

    pub fn replacement(mut self, token: impl Into<String>) -> Self {
        self.replacement = Some(token.into());
        self
    }
}

impl RedactionPolicy {
    /// Layer `over` on top of this policy, validating the new values.
    pub fn merge(&self, over: &RedactionOverride) -> Result<Self, ConfigError> {
        let headers = match &over.headers {
            Some(list) => name_list("redact.headers", list)
                .map_err(|m| ConfigError::redaction("redact.headers", m))?
                .into_iter()
                .collect(),
            None => self.headers.clone(),
        };

        let query_params = match &over.query_params {
            Some(list) => name_list("redact.queryParams", list)
                .map_err(|m| ConfigError::redaction("redact.queryParams", m))?
                .into_iter()
                .collect(),
            None => self.query_params.clone(),
        };

        let json_paths = match &over.json_paths {
            Some(list) => {
                let mut paths = Vec::with_capacity(list.len());
                for (i, p) in list.iter().enumerate() {
                    let p = p.trim();
                    if p.is_empty() {
                        return Err(ConfigError::redaction(
                            "redact.jsonPaths",
                            format!("redact.jsonPaths[{}] is blank", i),
                        ));
                    }
                    paths.push(p.to_string());
                }
                paths
            }
            None => self.json_paths.clone(),
        };

        let replacement = match &over.replacement {
            Some(r) if r.trim().is_empty() => {
                return Err(ConfigError::redaction(
                    "redact.replacement",
                    "replacement token must not be empty",
                ));
            }
            Some(r) => r.clone(),
            None => self.replacement.clone(),
        };

        Ok(Self {
            headers,
            query_params,
            json_paths,
            replacement,
        })
    }

    /// Whether the header (lowercased name) is in the redact set.
    pub fn redacts_header(&self, name: &str) -> bool {
        self.headers.contains(name)
    }
}
