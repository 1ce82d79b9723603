//! Trace exporter target.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use percent_encoding::percent_decode_str;
use serde::Deserialize;

use super::parse::{non_blank, parse_or};
use super::ConfigError;

/// Environment variable consulted when no endpoint is configured.
pub const ENDPOINT_ENV: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";

/// Path suffix for OTLP/HTTP trace ingestion.
pub const TRACES_PATH: &str = "/v1/traces";

/// Default export timeout.
pub const DEFAULT_EXPORT_TIMEOUT: Duration = Duration::from_millis(10_000);

/// How finished spans are handed to the exporter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ExportMode {
    /// Queue and export in the background.
    #[default]
    Batch,
    /// Export each span as it ends.
    Immediate,
}

impl ExportMode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ExportMode::Batch => "batch",
            ExportMode::Immediate => "immediate",
        }
    }
}

impl fmt::Display for ExportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "batch" => Ok(ExportMode::Batch),
            "immediate" => Ok(ExportMode::Immediate),
            other => Err(format!(
                "unknown export mode '{}', expected: batch, immediate",
                other
            )),
        }
    }
}

/// `exporter` section of a raw config.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RawExporter {
    pub headers: Option<BTreeMap<String, String>>,
    pub timeout_ms: Option<u64>,
    /// `batch` or `immediate`.
    pub mode: Option<String>,
}

/// Resolved exporter target.
#[derive(Clone, PartialEq, Eq)]
pub struct ExporterConfig {
    /// Full trace ingestion URL, credentials removed.
    pub endpoint: String,
    /// Headers sent with every export request.
    pub headers: BTreeMap<String, String>,
    pub timeout: Duration,
    pub mode: ExportMode,
}

// Header values may hold credentials.
impl fmt::Debug for ExporterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExporterConfig")
            .field("endpoint", &self.endpoint)
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .field("timeout", &self.timeout)
            .field("mode", &self.mode)
            .finish()
    }
}

impl ExporterConfig {
    /// Resolve the exporter from the explicit endpoint (falling back to
    /// [`ENDPOINT_ENV`] via `env`) and the optional `exporter` section.
    pub(crate) fn resolve(
        endpoint: Option<&str>,
        raw: Option<&RawExporter>,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let endpoint = non_blank(endpoint)
            .or_else(|| non_blank(env(ENDPOINT_ENV).as_deref()))
            .ok_or_else(|| ConfigError::Missing {
                key: "endpoint".into(),
            })?;

        let (endpoint, credentials) = normalize_endpoint(&endpoint)?;

        let mut headers = BTreeMap::new();
        if let Some(explicit) = raw.and_then(|r| r.headers.as_ref()) {
            for (name, value) in explicit {
                let name = name.trim();
                if name.is_empty() {
                    return Err(ConfigError::invalid("exporter.headers", "blank header name"));
                }
                headers.insert(name.to_string(), value.clone());
            }
        }

        if let Some(basic) = credentials {
            let has_auth = headers.keys().any(|k| k.eq_ignore_ascii_case("authorization"));
            if !has_auth {
                headers.insert("authorization".to_string(), basic);
            }
        }

        let timeout = match raw.and_then(|r| r.timeout_ms) {
            Some(0) => {
                return Err(ConfigError::invalid("exporter.timeoutMs", "must be greater than 0"));
            }
            Some(ms) => Duration::from_millis(ms),
            None => DEFAULT_EXPORT_TIMEOUT,
        };

        let mode = parse_or(
            "exporter.mode",
            raw.and_then(|r| r.mode.as_deref()),
            ExportMode::default(),
        )?;

        Ok(Self {
            endpoint,
            headers,
            timeout,
            mode,
        })
    }
}

/// Validate an `http(s)` endpoint, strip credentials, enforce the traces
/// path. Returns the URL and a `Basic` authorization value if the URL
/// carried `user:password`.
fn normalize_endpoint(raw: &str) -> Result<(String, Option<String>), ConfigError> {
    let invalid = |msg: &str| ConfigError::invalid("endpoint", msg);

    let (scheme, rest) = raw
        .split_once("://")
        .ok_or_else(|| invalid("must be an absolute http(s) URL"))?;
    let scheme = scheme.to_ascii_lowercase();
    if scheme != "http" && scheme != "https" {
        return Err(invalid("scheme must be http or https"));
    }

    let authority_end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let (authority, tail) = rest.split_at(authority_end);
    let (userinfo, host) = match authority.rsplit_once('@') {
        Some((user, host)) => (Some(user), host),
        None => (None, authority),
    };
    if host.is_empty() {
        return Err(invalid("missing host"));
    }

    let tail = tail.split('#').next().unwrap_or("");
    let (path, query) = match tail.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (tail, None),
    };
    let path = path.trim_end_matches('/');

    let mut url = format!("{}://{}{}", scheme, host, path);
    if !path.ends_with(TRACES_PATH) {
        url.push_str(TRACES_PATH);
    }
    if let Some(q) = query.filter(|q| !q.is_empty()) {
        url.push('?');
        url.push_str(q);
    }

    url.parse::<http::Uri>()
        .map_err(|e| ConfigError::invalid("endpoint", e.to_string()))?;

    Ok((url, userinfo.and_then(basic_auth)))
}

fn basic_auth(userinfo: &str) -> Option<String> {
    let (user, password) = userinfo.split_once(':').unwrap_or((userinfo, ""));
    let user = percent_decode_str(user).decode_utf8_lossy();
    let password = percent_decode_str(password).decode_utf8_lossy();
    if user.is_empty() && password.is_empty() {
        return None;
    }
    let token = STANDARD.encode(format!("{}:{}", user, password));
    Some(format!("Basic {}", token))
}
