//! Normalized inbound request as handed over by an adapter.

use serde::{Deserialize, Serialize};

use super::{CapturedBody, Headers};

/// Runtime-independent description of an inbound request.
///
/// Adapters build one per request. `route`, `request_id` and `body` may be
/// filled in later through the request context, before the request is
/// finished.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedRequest {
    pub method: String,
    /// Request target as received: origin-form path or absolute URL.
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
    #[serde(default)]
    pub headers: Headers,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<CapturedBody>,
    /// Explicit identifier supplied by the caller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Transport peer address, `ip` or `ip:port`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_address: Option<String>,
    /// Unix epoch milliseconds. Filled with "now" at start if missing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time_ms: Option<u64>,
}

impl NormalizedRequest {
    /// Create a request with only method and URL set.
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            ..Self::default()
        }
    }

    /// Build from an `http::Request`, copying method, URI and headers.
    ///
    /// The body is not read; capture it separately with
    /// [`crate::capture::CaptureBody`].
    pub fn from_http<B>(req: &http::Request<B>) -> Self {
        Self {
            method: req.method().as_str().to_string(),
            url: req.uri().to_string(),
            headers: Headers::from_header_map(req.headers()),
            ..Self::default()
        }
    }

    pub fn with_route(mut self, route: impl Into<String>) -> Self {
        self.route = Some(route.into());
        self
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body(mut self, body: CapturedBody) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    pub fn with_remote_address(mut self, addr: impl Into<String>) -> Self {
        self.remote_address = Some(addr.into());
        self
    }

    pub fn with_start_time(mut self, millis: u64) -> Self {
        self.start_time_ms = Some(millis);
        self
    }

    /// Path component of the URL.
    #[inline]
    pub fn path(&self) -> &str {
        url_path(&self.url)
    }
}

/// Path of a request target: origin dropped, query and fragment cut.
/// Returns `/` for an empty path.
pub fn url_path(url: &str) -> &str {
    let rest = match url.find("://") {
        Some(idx) if !url[..idx].contains('/') => {
            let after = &url[idx + 3..];
            match after.find(['/', '?', '#']) {
                Some(i) => &after[i..],
                None => "",
            }
        }
        _ => url,
    };

    let end = rest.find(['?', '#']).unwrap_or(rest.len());
    let path = &rest[..end];
    if path.is_empty() {
        "/"
    } else {
        path
    }
}
