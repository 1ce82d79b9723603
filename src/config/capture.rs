//! Capture policy.

use serde::Deserialize;

use crate::capture::BodyMode;

use super::parse::{byte_count, parse_or};
use super::ConfigError;

/// Default body capture limit.
pub const DEFAULT_MAX_BODY_BYTES: usize = 8192;

/// What is captured for each request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CapturePolicy {
    pub request_headers: bool,
    pub response_headers: bool,
    pub request_body: BodyMode,
    pub response_body: BodyMode,
    pub max_body_bytes: usize,
}

impl Default for CapturePolicy {
    fn default() -> Self {
        Self {
            request_headers: true,
            response_headers: true,
            request_body: BodyMode::None,
            response_body: BodyMode::None,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

/// A partial capture policy: the `capture` section of a raw config, or a
/// per-request override. Unset fields keep the base value.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CaptureOverride {
    pub request_headers: Option<bool>,
    pub response_headers: Option<bool>,
    /// `none`, `text` or `base64`.
    pub request_body: Option<String>,
    pub response_body: Option<String>,
    pub max_body_bytes: Option<f64>,
}

impl CaptureOverride {
    pub fn request_body(mut self, mode: BodyMode) -> Self {
        self.request_body = Some(mode.as_str().to_string());
        self
    }

    pub fn response_body(mut self, mode: BodyMode) -> Self {
        self.response_body = Some(mode.as_str().to_string());
        self
    }

    pub fn headers(mut self, request: bool, response: bool) -> Self {
        self.request_headers = Some(request);
        self.response_headers = Some(response);
        self
    }

    pub fn max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = Some(limit as f64);
        self
    }
}

impl CapturePolicy {
    /// Layer `over` on top of this policy, validating the new values.
    pub fn merge(&self, over: &CaptureOverride) -> Result<Self, ConfigError> {
        let max_body_bytes = match over.max_body_bytes {
            Some(v) => byte_count("capture.maxBodyBytes", v)?,
            None => self.max_body_bytes,
        };

        Ok(Self {
            request_headers: over.request_headers.unwrap_or(self.request_headers),
            response_headers: over.response_headers.unwrap_or(self.response_headers),
            request_body: parse_or(
                "capture.requestBody",
                over.request_body.as_deref(),
                self.request_body,
            )?,
            response_body: parse_or(
                "capture.responseBody",
                over.response_body.as_deref(),
                self.response_body,
            )?,
            max_body_bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let policy = CapturePolicy::default();
        assert!(policy.request_headers);
        assert!(policy.response_headers);
        assert_eq!(policy.request_body, BodyMode::None);
        assert_eq!(policy.max_body_bytes, 8192);
    }

    #[test]
    fn test_merge_subset() {
        let base = CapturePolicy::default();
        let merged = base
            .merge(&CaptureOverride::default().request_body(BodyMode::Text).max_body_bytes(16))
            .unwrap();

        assert_eq!(merged.request_body, BodyMode::Text);
        assert_eq!(merged.response_body, BodyMode::None);
        assert_eq!(merged.max_body_bytes, 16);
        assert!(merged.request_headers);
        // Base untouched
        assert_eq!(base, CapturePolicy::default());
    }

    #[test]
    fn test_merge_rejects_bad_values() {
        let base = CapturePolicy::default();

        let bad_mode = CaptureOverride {
            response_body: Some("json".into()),
            ..Default::default()
        };
        assert!(matches!(base.merge(&bad_mode), Err(ConfigError::Parse { .. })));

        let bad_limit = CaptureOverride {
            max_body_bytes: Some(-5.0),
            ..Default::default()
        };
        assert!(matches!(base.merge(&bad_limit), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_deserialize_camel_case() {
        let over: CaptureOverride =
            serde_json::from_str(r#"{"requestBody":"base64","maxBodyBytes":1024,"responseHeaders":false}"#).unwrap();
        let merged = CapturePolicy::default().merge(&over).unwrap();
        assert_eq!(merged.request_body, BodyMode::Base64);
        assert_eq!(merged.max_body_bytes, 1024);
        assert!(!merged.response_headers);
    }
}
