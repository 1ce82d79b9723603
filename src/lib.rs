//! req_insight - request instrumentation core.
//!
//! Turns a normalized inbound request and its response into one structured,
//! redacted [`RequestLog`] and one trace span, independent of the HTTP
//! runtime that served the request.
//!
//! # Features
//!
//! - **Bounded capture**: request/response bodies kept up to a byte budget,
//!   with true sizes and truncation flags
//! - **Redaction**: headers, cookie families, URL query parameters and JSON
//!   paths rewritten before anything leaves the process
//! - **Sortable ids**: UUIDv7-based request ids, base-48 prefixed
//! - **Span interface**: [`observability::Tracer`], with an OpenTelemetry
//!   OTLP pipeline behind the `otel` feature
//! - **Structured logging**: JSON lines through `tracing`
//!
//! # Architecture
//!
//! Adapters translate their runtime's request into a [`NormalizedRequest`],
//! call [`Emitter::start`], mutate the returned [`RequestContext`] while the
//! request runs, and finally call [`Emitter::finish`]:
//!
//! ```text
//! NormalizedRequest ─► start ─► RequestContext ─► finish ─► RequestLog
//!                                                  │
//!                              span ◄──────────────┼──► sink / metrics / hooks
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use req_insight::{Emitter, NormalizedRequest, NormalizedResponse, RawConfig};
//!
//! let config = RawConfig::new("checkout").with_endpoint("http://collector:4318").resolve()?;
//! req_insight::logging::init_logging(&config.logging())?;
//!
//! let emitter = Emitter::new(config);
//! let ctx = emitter.start(NormalizedRequest::new("GET", "/users/7"));
//! ctx.set_route("/users/:id");
//! let log = emitter.finish(&ctx, NormalizedResponse::new(200), None);
//! ```

/// Package version from Cargo.toml
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod capture;
pub mod config;
pub mod core;
pub mod emitter;
pub mod encoding;
pub mod id;
pub mod logging;
pub mod observability;
pub mod redact;
pub mod route;
pub mod trace_context;

// Re-exports for convenience
pub use capture::{BodyMode, CaptureBody, PendingBody};
pub use config::{CaptureOverride, ConfigError, RawConfig, RedactionOverride, ResolvedConfig};
pub use core::{
    CapturedBody, ErrorDetail, HeaderValue, Headers, NormalizedRequest, NormalizedResponse,
    RequestLog,
};
pub use emitter::{Actor, DeferredBodies, Emitter, EmitterHook, LogSink, RequestContext};
pub use id::generate_request_id;
pub use redact::is_sensitive_header;
pub use route::normalize_route;
