//! Span interface between the emitter and a tracing backend.
//!
//! The emitter talks to spans only through [`Tracer`] and [`ActiveSpan`].
//! Every span operation is fallible; the emitter logs failures and moves on.

use std::fmt;

use serde_json::Value;

use crate::core::Attributes;
use crate::trace_context::TraceContext;

/// Attribute keys written on request spans.
pub mod keys {
    // HTTP semantic conventions
    pub const HTTP_REQUEST_METHOD: &str = "http.request.method";
    pub const URL_FULL: &str = "url.full";
    pub const URL_PATH: &str = "url.path";
    pub const CLIENT_ADDRESS: &str = "client.address";
    pub const HTTP_ROUTE: &str = "http.route";
    pub const HTTP_RESPONSE_STATUS_CODE: &str = "http.response.status_code";
    pub const ERROR_TYPE: &str = "error.type";

    /// Prefix for captured request headers: `http.request.header.<name>`.
    pub const HTTP_REQUEST_HEADER_PREFIX: &str = "http.request.header.";
    /// Prefix for captured response headers.
    pub const HTTP_RESPONSE_HEADER_PREFIX: &str = "http.response.header.";

    // Captured bodies
    pub const HTTP_REQUEST_BODY: &str = "http.request.body";
    pub const HTTP_REQUEST_BODY_SIZE: &str = "http.request.body.size";
    pub const HTTP_REQUEST_BODY_ENCODING: &str = "http.request.body.encoding";
    pub const HTTP_REQUEST_BODY_TRUNCATED: &str = "http.request.body.truncated";
    pub const HTTP_RESPONSE_BODY: &str = "http.response.body";
    pub const HTTP_RESPONSE_BODY_SIZE: &str = "http.response.body.size";
    pub const HTTP_RESPONSE_BODY_ENCODING: &str = "http.response.body.encoding";
    pub const HTTP_RESPONSE_BODY_TRUNCATED: &str = "http.response.body.truncated";

    // Identity
    pub const REQUEST_ID: &str = "request.id";
    pub const ENDUSER_ID: &str = "enduser.id";
    pub const TENANT_ID: &str = "tenant.id";
    pub const SESSION_ID: &str = "session.id";

    // Resource
    pub const SERVICE_NAME: &str = "service.name";
    pub const SERVICE_VERSION: &str = "service.version";
    pub const DEPLOYMENT_ENVIRONMENT: &str = "deployment.environment";
}

/// A span operation failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanError {
    pub operation: &'static str,
    pub message: String,
}

impl SpanError {
    pub fn new(operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            operation,
            message: message.into(),
        }
    }
}

impl fmt::Display for SpanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "span {} failed: {}", self.operation, self.message)
    }
}

impl std::error::Error for SpanError {}

/// Final span status.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SpanStatus {
    #[default]
    Unset,
    Ok,
    Error(String),
}

/// Parameters for opening a span.
#[derive(Debug, Clone, Default)]
pub struct SpanOptions {
    /// Unix epoch milliseconds.
    pub start_time_ms: Option<u64>,
    /// Incoming trace to continue.
    pub parent: Option<TraceContext>,
    pub attributes: Vec<(&'static str, Value)>,
}

/// An open span.
pub trait ActiveSpan: Send {
    /// 32 hex chars.
    fn trace_id(&self) -> String;

    /// 16 hex chars.
    fn span_id(&self) -> String;

    fn set_attribute(&mut self, key: &str, value: Value) -> Result<(), SpanError>;

    fn add_event(&mut self, name: &str, time_ms: u64, attributes: &Attributes) -> Result<(), SpanError>;

    fn update_name(&mut self, name: &str) -> Result<(), SpanError>;

    fn set_status(&mut self, status: SpanStatus) -> Result<(), SpanError>;

    /// Close the span. `end_time_ms` defaults to now.
    fn end(&mut self, end_time_ms: Option<u64>) -> Result<(), SpanError>;
}

/// Opens spans.
pub trait Tracer: Send + Sync {
    fn start_span(&self, name: &str, options: SpanOptions) -> Box<dyn ActiveSpan>;
}
