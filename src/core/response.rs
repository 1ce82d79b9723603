//! Normalized response as handed over by an adapter at completion.

use serde::{Deserialize, Serialize};

use super::{CapturedBody, Headers};

/// Runtime-independent description of a finished response.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<Headers>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<CapturedBody>,
    /// Unix epoch milliseconds. "Now" when missing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time_ms: Option<u64>,
}

impl NormalizedResponse {
    /// Response with a status code.
    pub fn new(status: u16) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Build from an `http::Response`, copying status and headers.
    pub fn from_http<B>(res: &http::Response<B>) -> Self {
        Self {
            status: Some(res.status().as_u16()),
            headers: Some(Headers::from_header_map(res.headers())),
            ..Self::default()
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.get_or_insert_with(Headers::new).append(name, value);
        self
    }

    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = Some(headers);
        self
    }

    pub fn with_body(mut self, body: CapturedBody) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_end_time(mut self, millis: u64) -> Self {
        self.end_time_ms = Some(millis);
        self
    }

    /// First value of a response header.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.as_ref().and_then(|h| h.get_first(name))
    }
}
