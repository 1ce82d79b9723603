//! Request lifecycle: start, mutate through the context, finish.
//!
//! ```text
//! start(request) ──► RequestContext ──► set_actor / set_attribute / ...
//!                                              │
//!             RequestLog ◄── finish(ctx, response, error)
//! ```
//!
//! `finish` consumes the request state: it resolves the identifier, applies
//! the capture and redaction policies, writes and ends the span, then hands
//! the record to the sink, the metrics and the hooks. Span and hook
//! failures are logged at `warn` and never reach the caller.
//!
//! # Example
//!
//! ```rust,ignore
//! use req_insight::{Emitter, NormalizedRequest, NormalizedResponse, RawConfig};
//!
//! let emitter = Emitter::from_raw(&RawConfig::new("checkout").with_endpoint("http://collector:4318"))?;
//! let ctx = emitter.start(NormalizedRequest::new("GET", "/users/7").with_route("/users/:id"));
//! ctx.set_attribute("cart.items", 3);
//! let log = emitter.finish(&ctx, NormalizedResponse::new(200), None);
//! ```

mod client_addr;
mod context;
mod hooks;

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::capture::PendingBody;
use crate::config::{ConfigError, RawConfig, ResolvedConfig};
use crate::core::{
    now_millis, url_path, CapturedBody, ErrorDetail, HeaderValue, Headers, Iso8601Timestamp,
    NormalizedRequest, NormalizedResponse, RequestLog,
};
use crate::id::generate_request_id;
use crate::observability::{
    keys, ActiveSpan, EmitterMetrics, NoopTracer, SpanOptions, SpanStatus, Tracer,
};
use crate::redact::Redactor;
use crate::trace_context::TraceContext;

pub use client_addr::client_address;
pub use context::{Actor, RequestContext};
pub use hooks::{EmitterHook, HookError, LogSink, TracingSink};

use context::{Registry, RequestState};
use hooks::HookChain;

/// Method reported when a request is finished without live state.
pub const UNKNOWN_METHOD: &str = "UNKNOWN";

const CONTENT_TYPE: &str = "content-type";

/// Builds request logs and spans from normalized requests.
pub struct Emitter {
    registry: Arc<Registry>,
    tracer: Arc<dyn Tracer>,
    sink: Arc<dyn LogSink>,
    hooks: HookChain,
}

impl Emitter {
    /// Emitter with no exporter (ids only) logging through `tracing`.
    pub fn new(config: ResolvedConfig) -> Self {
        Self::builder(config).build()
    }

    /// Resolve a raw configuration and build a default emitter.
    pub fn from_raw(raw: &RawConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(raw.resolve()?))
    }

    pub fn builder(config: ResolvedConfig) -> EmitterBuilder {
        EmitterBuilder::new(config)
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.registry.config
    }

    pub fn metrics(&self) -> Option<&EmitterMetrics> {
        self.registry.metrics.as_ref()
    }

    /// Requests started but not finished yet.
    pub fn in_flight(&self) -> usize {
        self.registry.live()
    }

    /// Register a request and open its span.
    pub fn start(&self, mut request: NormalizedRequest) -> RequestContext {
        let start_time = *request.start_time_ms.get_or_insert_with(now_millis);
        request.request_id = non_blank(request.request_id.as_deref());
        request.route = request.route.as_deref().map(|r| self.registry.apply_route(r));

        let name = span_name(
            &request.method,
            request.route.as_deref().unwrap_or_else(|| request.path()),
        );

        let mut attributes = vec![
            (keys::HTTP_REQUEST_METHOD, Value::String(request.method.clone())),
            (keys::URL_PATH, Value::String(request.path().to_string())),
        ];
        if let Some(ref route) = request.route {
            attributes.push((keys::HTTP_ROUTE, Value::String(route.clone())));
        }
        if let Some(ref id) = request.request_id {
            attributes.push((keys::REQUEST_ID, Value::String(id.clone())));
        }

        let span = self.tracer.start_span(
            &name,
            SpanOptions {
                start_time_ms: Some(start_time),
                parent: TraceContext::from_headers(&request.headers),
                attributes,
            },
        );
        let (trace_id, span_id) = (span.trace_id(), span.span_id());

        let snapshot = (!self.hooks.is_empty()).then(|| request.clone());
        let handle = self.registry.insert(RequestState::new(request, span));
        let ctx = RequestContext::new(handle, Arc::clone(&self.registry), trace_id, span_id);

        debug!(handle, span = %name, trace_id = ctx.trace_id(), "Request started");

        if let Some(ref req) = snapshot {
            self.hooks.on_request(req, &ctx, self.metrics());
        }
        ctx
    }

    /// Finish a request and return its redacted record.
    ///
    /// `error` takes precedence over one set through the context. Calling
    /// this twice, or with a context from another emitter, yields a minimal
    /// record (method `UNKNOWN`, empty URL) and emits nothing.
    pub fn finish(
        &self,
        ctx: &RequestContext,
        response: NormalizedResponse,
        error: Option<ErrorDetail>,
    ) -> RequestLog {
        let state = if Arc::ptr_eq(&ctx.registry, &self.registry) {
            self.registry.take(ctx.handle)
        } else {
            None
        };

        match state {
            Some(state) => self.finalize(ctx, state, response, error),
            None => self.finish_without_state(ctx, &response, error),
        }
    }

    /// Wait for bodies still being streamed, then [`Emitter::finish`].
    ///
    /// A deferred request body replaces one set earlier; a deferred response
    /// body replaces `response.body`.
    pub async fn finish_deferred(
        &self,
        ctx: &RequestContext,
        mut response: NormalizedResponse,
        error: Option<ErrorDetail>,
        pending: DeferredBodies,
    ) -> RequestLog {
        let (request_body, response_body) =
            futures_util::future::join(resolve(pending.request), resolve(pending.response)).await;

        if let Some(body) = request_body {
            if Arc::ptr_eq(&ctx.registry, &self.registry) {
                self.registry
                    .with(ctx.handle, |state| state.request.body = Some(body));
            }
        }
        if let Some(body) = response_body {
            response.body = Some(body);
        }

        self.finish(ctx, response, error)
    }

    fn finalize(
        &self,
        ctx: &RequestContext,
        state: RequestState,
        response: NormalizedResponse,
        error: Option<ErrorDetail>,
    ) -> RequestLog {
        let config = &self.registry.config;
        let RequestState {
            request,
            mut span,
            capture,
            redaction,
            attributes,
            events,
            actor,
            session_id,
            error: context_error,
        } = state;

        let request_id = self.resolve_request_id(request.request_id.as_deref(), &response);
        ctx.set_resolved_id(&request_id);

        let start_time = request.start_time_ms.unwrap_or_else(now_millis);
        let end_time = response.end_time_ms.unwrap_or_else(now_millis);

        let capture = match capture {
            Some(ref over) => config.capture.merge(over).unwrap_or_else(|e| {
                self.override_failed(&e);
                config.capture.clone()
            }),
            None => config.capture.clone(),
        };
        let redaction = match redaction {
            Some(ref over) => config.redaction.merge(over).unwrap_or_else(|e| {
                self.override_failed(&e);
                config.redaction.clone()
            }),
            None => config.redaction.clone(),
        };

        let request_ct = request.headers.get_first(CONTENT_TYPE).map(str::to_string);
        let response_ct = response.header(CONTENT_TYPE).map(str::to_string);

        let raw = RequestLog {
            request_id,
            trace_id: span.trace_id(),
            span_id: span.span_id(),
            service: config.service.name.clone(),
            method: request.method.clone(),
            url: request.url.clone(),
            route: request.route.clone(),
            status: response.status,
            duration_ms: end_time.saturating_sub(start_time),
            request_headers: capture.request_headers.then(|| request.headers.clone()),
            response_headers: if capture.response_headers {
                response.headers
            } else {
                None
            },
            request_body: request
                .body
                .map(|b| b.restrict(capture.request_body, capture.max_body_bytes)),
            response_body: response
                .body
                .map(|b| b.restrict(capture.response_body, capture.max_body_bytes)),
            tenant_id: actor.tenant_id,
            user_id: actor.user_id,
            session_id,
            error: error.or(context_error),
            attributes: (!attributes.is_empty()).then_some(attributes),
            events: (!events.is_empty()).then_some(events),
            timestamp: Iso8601Timestamp::now().to_string(),
        };

        let mut log = Redactor::new(&redaction).redact_log(&raw, request_ct.as_deref(), response_ct.as_deref());
        if config.route.normalize {
            log.route = log.route.map(|r| self.registry.apply_route(&r));
        }

        let client = client_address(&request.headers, request.remote_address.as_deref(), &redaction);
        self.write_span(span.as_mut(), &log, client.as_deref());
        if let Err(e) = span.end(Some(end_time)) {
            self.registry.span_failed(&e);
        }

        if let Some(metrics) = self.metrics() {
            metrics.record_request(&log.method, log.route.as_deref(), log.status, log.duration_ms);
            if let Some(ref b) = log.request_body {
                metrics.record_body("request", b.total_bytes, b.truncated);
            }
            if let Some(ref b) = log.response_body {
                metrics.record_body("response", b.total_bytes, b.truncated);
            }
        }

        hooks::emit_guarded(self.sink.as_ref(), &log, self.metrics());
        self.hooks.on_finish(&log, self.metrics());

        debug!(
            request_id = %log.request_id,
            duration_ms = log.duration_ms,
            "Request finished"
        );
        log
    }

    fn finish_without_state(
        &self,
        ctx: &RequestContext,
        response: &NormalizedResponse,
        error: Option<ErrorDetail>,
    ) -> RequestLog {
        let request_id = self.resolve_request_id(ctx.request_id().as_deref(), response);
        ctx.set_resolved_id(&request_id);

        warn!(
            handle = ctx.handle,
            request_id = %request_id,
            "Finish without live request state, returning minimal record"
        );
        if let Some(m) = self.metrics() {
            m.record_failure("state");
        }

        RequestLog {
            request_id,
            trace_id: ctx.trace_id().to_string(),
            span_id: ctx.span_id().to_string(),
            service: self.registry.config.service.name.clone(),
            method: UNKNOWN_METHOD.to_string(),
            url: String::new(),
            status: response.status,
            error,
            timestamp: Iso8601Timestamp::now().to_string(),
            ..RequestLog::default()
        }
    }

    /// Explicit id > configured response header > generated.
    fn resolve_request_id(&self, explicit: Option<&str>, response: &NormalizedResponse) -> String {
        non_blank(explicit)
            .or_else(|| non_blank(response.header(&self.registry.config.request_id_header)))
            .unwrap_or_else(generate_request_id)
    }

    fn override_failed(&self, err: &ConfigError) {
        warn!(key = err.key(), error = %err, "Invalid per-request override, using base policy");
        if let Some(m) = self.metrics() {
            m.record_failure("override");
        }
    }

    fn write_span(&self, span: &mut dyn ActiveSpan, log: &RequestLog, client: Option<&str>) {
        let mut attrs: Vec<(String, Value)> = vec![
            (keys::HTTP_REQUEST_METHOD.into(), Value::String(log.method.clone())),
            (keys::URL_FULL.into(), Value::String(log.url.clone())),
            (keys::URL_PATH.into(), Value::String(url_path(&log.url).to_string())),
            (keys::REQUEST_ID.into(), Value::String(log.request_id.clone())),
        ];

        let mut push_str = |key: &str, value: Option<&str>| {
            if let Some(v) = value {
                attrs.push((key.to_string(), Value::String(v.to_string())));
            }
        };
        push_str(keys::CLIENT_ADDRESS, client);
        push_str(keys::HTTP_ROUTE, log.route.as_deref());
        push_str(keys::ENDUSER_ID, log.user_id.as_deref());
        push_str(keys::TENANT_ID, log.tenant_id.as_deref());
        push_str(keys::SESSION_ID, log.session_id.as_deref());

        if let Some(status) = log.status {
            attrs.push((keys::HTTP_RESPONSE_STATUS_CODE.into(), Value::from(status)));
        }
        if let Some(ref headers) = log.request_headers {
            header_attributes(&mut attrs, keys::HTTP_REQUEST_HEADER_PREFIX, headers);
        }
        if let Some(ref headers) = log.response_headers {
            header_attributes(&mut attrs, keys::HTTP_RESPONSE_HEADER_PREFIX, headers);
        }
        if let Some(ref body) = log.request_body {
            body_attributes(&mut attrs, REQUEST_BODY_KEYS, body);
        }
        if let Some(ref body) = log.response_body {
            body_attributes(&mut attrs, RESPONSE_BODY_KEYS, body);
        }

        let status = match (&log.error, log.status) {
            (Some(err), _) => {
                attrs.push((keys::ERROR_TYPE.into(), Value::String(err.error_type.clone())));
                SpanStatus::Error(err.message.clone())
            }
            (None, Some(code)) if code >= 500 => {
                attrs.push((keys::ERROR_TYPE.into(), Value::String(code.to_string())));
                SpanStatus::Error(format!("HTTP {}", code))
            }
            _ => SpanStatus::Unset,
        };

        for (key, value) in attrs {
            if let Err(e) = span.set_attribute(&key, value) {
                self.registry.span_failed(&e);
            }
        }

        if let Some(ref route) = log.route {
            if let Err(e) = span.update_name(&span_name(&log.method, route)) {
                self.registry.span_failed(&e);
            }
        }

        if status != SpanStatus::Unset {
            if let Err(e) = span.set_status(status) {
                self.registry.span_failed(&e);
            }
        }
    }
}

impl fmt::Debug for Emitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("service", &self.registry.config.service.name)
            .field("hooks", &self.hooks.names())
            .field("in_flight", &self.in_flight())
            .finish_non_exhaustive()
    }
}

/// Configures an [`Emitter`].
pub struct EmitterBuilder {
    config: ResolvedConfig,
    tracer: Option<Arc<dyn Tracer>>,
    sink: Option<Arc<dyn LogSink>>,
    metrics: Option<EmitterMetrics>,
    hooks: HookChain,
}

impl EmitterBuilder {
    fn new(config: ResolvedConfig) -> Self {
        Self {
            config,
            tracer: None,
            sink: None,
            metrics: None,
            hooks: HookChain::default(),
        }
    }

    /// Span backend. Defaults to [`NoopTracer`].
    pub fn tracer(mut self, tracer: Arc<dyn Tracer>) -> Self {
        self.tracer = Some(tracer);
        self
    }

    /// Record destination. Defaults to [`TracingSink`].
    pub fn sink<S: LogSink + 'static>(mut self, sink: S) -> Self {
        self.sink = Some(Arc::new(sink));
        self
    }

    pub fn metrics(mut self, metrics: EmitterMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Add a hook. Hooks run in the order they are added.
    pub fn hook<H: EmitterHook + 'static>(mut self, hook: H) -> Self {
        self.hooks.push(Arc::new(hook));
        self
    }

    pub fn build(self) -> Emitter {
        Emitter {
            registry: Arc::new(Registry::new(Arc::new(self.config), self.metrics)),
            tracer: self.tracer.unwrap_or_else(|| Arc::new(NoopTracer)),
            sink: self.sink.unwrap_or_else(|| Arc::new(TracingSink)),
            hooks: self.hooks,
        }
    }
}

/// Body captures that complete after the response head is known.
#[derive(Debug, Default)]
pub struct DeferredBodies {
    pub request: Option<PendingBody>,
    pub response: Option<PendingBody>,
}

impl DeferredBodies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(mut self, pending: PendingBody) -> Self {
        self.request = Some(pending);
        self
    }

    pub fn response(mut self, pending: PendingBody) -> Self {
        self.response = Some(pending);
        self
    }
}

async fn resolve(pending: Option<PendingBody>) -> Option<CapturedBody> {
    match pending {
        Some(p) => p.resolve().await,
        None => None,
    }
}

const REQUEST_BODY_KEYS: [&str; 4] = [
    keys::HTTP_REQUEST_BODY,
    keys::HTTP_REQUEST_BODY_SIZE,
    keys::HTTP_REQUEST_BODY_ENCODING,
    keys::HTTP_REQUEST_BODY_TRUNCATED,
];

const RESPONSE_BODY_KEYS: [&str; 4] = [
    keys::HTTP_RESPONSE_BODY,
    keys::HTTP_RESPONSE_BODY_SIZE,
    keys::HTTP_RESPONSE_BODY_ENCODING,
    keys::HTTP_RESPONSE_BODY_TRUNCATED,
];

fn body_attributes(out: &mut Vec<(String, Value)>, [value, size, encoding, truncated]: [&str; 4], body: &CapturedBody) {
    if let Some(ref v) = body.value {
        out.push((value.into(), Value::String(v.clone())));
    }
    out.push((size.into(), Value::from(body.total_bytes)));
    out.push((encoding.into(), Value::String(body.encoding.to_string())));
    out.push((truncated.into(), Value::Bool(body.truncated)));
}

fn header_attributes(out: &mut Vec<(String, Value)>, prefix: &str, headers: &Headers) {
    for (name, value) in headers.iter() {
        let values = match value {
            HeaderValue::One(v) => vec![Value::String(v.clone())],
            HeaderValue::Many(vs) => vs.iter().cloned().map(Value::String).collect(),
        };
        out.push((format!("{}{}", prefix, name), Value::Array(values)));
    }
}

fn span_name(method: &str, target: &str) -> String {
    format!("{} {}", method, target)
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
