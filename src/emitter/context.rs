//! Per-request state registry and the context handle adapters hold.
//!
//! State lives in the emitter's registry keyed by a handle id. A
//! [`RequestContext`] only looks state up; finishing removes the entry, so
//! every later mutation on any clone of the context is a no-op.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{CaptureOverride, RedactionOverride, ResolvedConfig};
use crate::core::{now_millis, Attributes, CapturedBody, ErrorDetail, LogEvent, NormalizedRequest};
use crate::observability::{keys, ActiveSpan, EmitterMetrics, SpanError};

use super::hooks::catch_panic;

/// Who made the request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Actor {
    pub tenant_id: Option<String>,
    pub user_id: Option<String>,
}

impl Actor {
    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            tenant_id: None,
            user_id: Some(user_id.into()),
        }
    }

    pub fn tenant(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: Some(tenant_id.into()),
            user_id: None,
        }
    }

    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }
}

/// Live state of one request, consumed at finish.
pub(crate) struct RequestState {
    pub(crate) request: NormalizedRequest,
    pub(crate) span: Box<dyn ActiveSpan>,
    pub(crate) capture: Option<CaptureOverride>,
    pub(crate) redaction: Option<RedactionOverride>,
    pub(crate) attributes: Attributes,
    pub(crate) events: Vec<LogEvent>,
    pub(crate) actor: Actor,
    pub(crate) session_id: Option<String>,
    pub(crate) error: Option<ErrorDetail>,
}

impl RequestState {
    pub(crate) fn new(request: NormalizedRequest, span: Box<dyn ActiveSpan>) -> Self {
        Self {
            request,
            span,
            capture: None,
            redaction: None,
            attributes: Attributes::new(),
            events: Vec::new(),
            actor: Actor::default(),
            session_id: None,
            error: None,
        }
    }
}

/// One request's state. Emptied when the request is finished.
type Slot = Arc<Mutex<Option<RequestState>>>;

/// Handle → state map shared by an emitter and its contexts.
///
/// The map lock only guards lookups; span calls run under the request's
/// own slot lock, so a slow span backend stalls only its own request.
pub(crate) struct Registry {
    pub(crate) config: Arc<ResolvedConfig>,
    pub(crate) metrics: Option<EmitterMetrics>,
    next_id: AtomicU64,
    states: Mutex<HashMap<u64, Slot>>,
}

impl Registry {
    pub(crate) fn new(config: Arc<ResolvedConfig>, metrics: Option<EmitterMetrics>) -> Self {
        Self {
            config,
            metrics,
            next_id: AtomicU64::new(1),
            states: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u64, Slot>> {
        self.states.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn insert(&self, state: RequestState) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock().insert(id, Arc::new(Mutex::new(Some(state))));
        id
    }

    /// Remove the state. Waits for a mutation already running on it.
    pub(crate) fn take(&self, id: u64) -> Option<RequestState> {
        let slot = self.lock().remove(&id)?;
        let state = lock_slot(&slot).take();
        state
    }

    /// Run `f` on live state; `None` once finished.
    pub(crate) fn with<R>(&self, id: u64, f: impl FnOnce(&mut RequestState) -> R) -> Option<R> {
        let slot = self.lock().get(&id).cloned()?;
        let mut guard = lock_slot(&slot);
        guard.as_mut().map(f)
    }

    /// Apply the route policy, keeping the raw route if a custom
    /// normalizer panics.
    pub(crate) fn apply_route(&self, route: &str) -> String {
        match catch_panic(|| self.config.route.apply(route)) {
            Ok(normalized) => normalized,
            Err(e) => {
                warn!(route, error = %e, "Route normalizer failed, keeping raw route");
                if let Some(ref m) = self.metrics {
                    m.record_failure("route");
                }
                route.to_string()
            }
        }
    }

    pub(crate) fn live(&self) -> usize {
        self.lock().len()
    }

    /// Log and count a failed span operation.
    pub(crate) fn span_failed(&self, err: &SpanError) {
        warn!(operation = err.operation, error = %err.message, "Span update failed");
        if let Some(ref m) = self.metrics {
            m.record_failure("span");
        }
    }
}

// A panicking span implementation must not take the request down.
fn lock_slot(slot: &Slot) -> MutexGuard<'_, Option<RequestState>> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Cloneable handle to one in-flight request.
///
/// Mutations update the request state and mirror onto the open span. They
/// are silently ignored once the request has been finished.
#[derive(Clone)]
pub struct RequestContext {
    pub(crate) handle: u64,
    pub(crate) registry: Arc<Registry>,
    trace_id: Arc<str>,
    span_id: Arc<str>,
    resolved_id: Arc<Mutex<Option<String>>>,
}

impl RequestContext {
    pub(crate) fn new(handle: u64, registry: Arc<Registry>, trace_id: String, span_id: String) -> Self {
        Self {
            handle,
            registry,
            trace_id: trace_id.into(),
            span_id: span_id.into(),
            resolved_id: Arc::new(Mutex::new(None)),
        }
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    pub fn span_id(&self) -> &str {
        &self.span_id
    }

    /// The request identifier: the resolved one after finish, otherwise the
    /// explicit one if set.
    pub fn request_id(&self) -> Option<String> {
        if let Some(id) = self.resolved().clone() {
            return Some(id);
        }
        self.registry
            .with(self.handle, |s| s.request.request_id.clone())
            .flatten()
    }

    /// Whether the request has been finished.
    pub fn is_finished(&self) -> bool {
        self.registry.with(self.handle, |_| ()).is_none()
    }

    /// Store the context in `http` extensions so later layers can find it.
    pub fn attach(&self, extensions: &mut http::Extensions) {
        extensions.insert(self.clone());
    }

    pub fn from_extensions(extensions: &http::Extensions) -> Option<Self> {
        extensions.get::<Self>().cloned()
    }

    /// Record the authenticated tenant and/or user. Unset fields are kept.
    pub fn set_actor(&self, actor: Actor) {
        self.update(|state, fail| {
            if let Some(tenant) = actor.tenant_id {
                mirror(state, keys::TENANT_ID, Value::String(tenant.clone()), fail);
                state.actor.tenant_id = Some(tenant);
            }
            if let Some(user) = actor.user_id {
                mirror(state, keys::ENDUSER_ID, Value::String(user.clone()), fail);
                state.actor.user_id = Some(user);
            }
        });
    }

    pub fn set_session(&self, session_id: impl Into<String>) {
        let session_id = session_id.into();
        self.update(|state, fail| {
            mirror(state, keys::SESSION_ID, Value::String(session_id.clone()), fail);
            state.session_id = Some(session_id);
        });
    }

    /// Set a custom attribute on the record and the span.
    pub fn set_attribute(&self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        self.update(|state, fail| {
            if let Err(e) = state.span.set_attribute(&key, value.clone()) {
                fail(&e);
            }
            state.attributes.insert(key, value);
        });
    }

    /// Append a timestamped event.
    pub fn add_event(&self, name: impl Into<String>, attributes: Option<Attributes>) {
        let event = LogEvent {
            name: name.into(),
            timestamp_ms: now_millis(),
            attributes,
        };
        self.update(|state, fail| {
            let empty = Attributes::new();
            let attrs = event.attributes.as_ref().unwrap_or(&empty);
            if let Err(e) = state.span.add_event(&event.name, event.timestamp_ms, attrs) {
                fail(&e);
            }
            state.events.push(event);
        });
    }

    /// Record the error that failed the request. The last one wins.
    pub fn set_error(&self, error: ErrorDetail) {
        self.update(|state, fail| {
            mirror(state, keys::ERROR_TYPE, Value::String(error.error_type.clone()), fail);
            state.error = Some(error);
        });
    }

    /// Set the route once it is known. Ignored if a route is already set.
    pub fn set_route(&self, route: impl AsRef<str>) {
        let route = self.registry.apply_route(route.as_ref());
        self.update(|state, fail| {
            if state.request.route.is_some() {
                debug!(route = %route, "Route already set, ignoring");
                return;
            }
            mirror(state, keys::HTTP_ROUTE, Value::String(route.clone()), fail);
            let name = format!("{} {}", state.request.method, route);
            if let Err(e) = state.span.update_name(&name) {
                fail(&e);
            }
            state.request.route = Some(route);
        });
    }

    /// Set an explicit identifier. Blank values and a second id are ignored.
    pub fn set_request_id(&self, id: impl AsRef<str>) {
        let id = id.as_ref().trim();
        if id.is_empty() {
            return;
        }
        self.update(|state, fail| {
            if state.request.request_id.is_some() {
                debug!(request_id = %id, "Request id already set, ignoring");
                return;
            }
            mirror(state, keys::REQUEST_ID, Value::String(id.to_string()), fail);
            state.request.request_id = Some(id.to_string());
        });
    }

    /// Attach the captured request body. Ignored if one is already set.
    pub fn set_request_body(&self, body: CapturedBody) {
        self.update(|state, _| {
            if state.request.body.is_none() {
                state.request.body = Some(body);
            }
        });
    }

    /// Per-request capture policy, merged at finish. Replaces an earlier
    /// override.
    pub fn override_capture(&self, over: CaptureOverride) {
        self.update(|state, _| state.capture = Some(over));
    }

    /// Per-request redaction policy, merged at finish. Replaces an earlier
    /// override.
    pub fn override_redaction(&self, over: RedactionOverride) {
        self.update(|state, _| state.redaction = Some(over));
    }

    pub(crate) fn set_resolved_id(&self, id: &str) {
        *self.resolved() = Some(id.to_string());
    }

    fn resolved(&self) -> MutexGuard<'_, Option<String>> {
        self.resolved_id
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn update(&self, f: impl FnOnce(&mut RequestState, &dyn Fn(&SpanError))) {
        let registry = &self.registry;
        let applied = registry.with(self.handle, |state| f(state, &|e: &SpanError| registry.span_failed(e)));
        if applied.is_none() {
            debug!(handle = self.handle, "Request already finished, mutation ignored");
        }
    }
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("handle", &self.handle)
            .field("trace_id", &self.trace_id)
            .field("span_id", &self.span_id)
            .finish_non_exhaustive()
    }
}

fn mirror(state: &mut RequestState, key: &str, value: Value, fail: &dyn Fn(&SpanError)) {
    if let Err(e) = state.span.set_attribute(key, value) {
        fail(&e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RawConfig;
    use crate::observability::{InMemoryTracer, SpanOptions, SpanStatus, Tracer};
    use serde_json::json;
    use std::sync::mpsc::{self, Receiver, Sender};
    use std::thread;
    use std::time::Duration;

    fn registry() -> Arc<Registry> {
        let config = RawConfig::new("svc")
            .with_endpoint("http://collector:4318")
            .resolve_with_env(|_| None)
            .unwrap();
        Arc::new(Registry::new(Arc::new(config), None))
    }

    fn context(tracer: &InMemoryTracer) -> RequestContext {
        let registry = registry();
        let span = tracer.start_span("GET /users/7", SpanOptions::default());
        let (trace_id, span_id) = (span.trace_id(), span.span_id());
        let handle = registry.insert(RequestState::new(NormalizedRequest::new("GET", "/users/7"), span));
        RequestContext::new(handle, registry, trace_id, span_id)
    }

    fn end(ctx: &RequestContext) -> RequestState {
        let mut state = ctx.registry.take(ctx.handle).unwrap();
        state.span.end(None).unwrap();
        state
    }

    #[test]
    fn test_mutations_mirror_onto_span() {
        let tracer = InMemoryTracer::new();
        let ctx = context(&tracer);

        ctx.set_actor(Actor::user("u-1").with_tenant("acme"));
        ctx.set_session("sess-9");
        ctx.set_attribute("cart.items", 3);
        ctx.add_event("cache.miss", None);
        ctx.set_route("/users/:id");
        ctx.set_request_id("  req-42 ");

        let state = end(&ctx);
        assert_eq!(state.actor.user_id.as_deref(), Some("u-1"));
        assert_eq!(state.session_id.as_deref(), Some("sess-9"));
        assert_eq!(state.request.route.as_deref(), Some("/users/{id}"));
        assert_eq!(state.request.request_id.as_deref(), Some("req-42"));
        assert_eq!(state.events.len(), 1);

        let span = &tracer.finished_spans()[0];
        assert_eq!(span.name, "GET /users/{id}");
        assert_eq!(span.attribute(keys::ENDUSER_ID), Some(&json!("u-1")));
        assert_eq!(span.attribute(keys::TENANT_ID), Some(&json!("acme")));
        assert_eq!(span.attribute("cart.items"), Some(&json!(3)));
        assert_eq!(span.events[0].name, "cache.miss");
    }

    #[test]
    fn test_set_once_fields() {
        let tracer = InMemoryTracer::new();
        let ctx = context(&tracer);

        ctx.set_route("/a");
        ctx.set_route("/b");
        ctx.set_request_id("   ");
        ctx.set_request_id("first");
        ctx.set_request_id("second");
        ctx.set_request_body(CapturedBody::text("one"));
        ctx.set_request_body(CapturedBody::text("two"));

        let state = end(&ctx);
        assert_eq!(state.request.route.as_deref(), Some("/a"));
        assert_eq!(state.request.request_id.as_deref(), Some("first"));
        assert_eq!(state.request.body.unwrap().value.as_deref(), Some("one"));
    }

    #[test]
    fn test_mutations_after_finish_are_ignored() {
        let tracer = InMemoryTracer::new();
        let ctx = context(&tracer);
        let clone = ctx.clone();
        end(&ctx);

        assert!(clone.is_finished());
        clone.set_attribute("late", true);
        clone.set_error(ErrorDetail::new("late", "Error"));
        assert_eq!(clone.registry.live(), 0);
        assert!(tracer.finished_spans()[0].attribute("late").is_none());
    }

    #[test]
    fn test_failing_span_does_not_block_state() {
        let tracer = InMemoryTracer::failing();
        let ctx = context(&tracer);
        ctx.set_attribute("k", "v");
        ctx.set_error(ErrorDetail::new("boom", "IoError"));

        let state = ctx.registry.take(ctx.handle).unwrap();
        assert_eq!(state.attributes.get("k"), Some(&json!("v")));
        assert_eq!(state.error.unwrap().message, "boom");
    }

    #[test]
    fn test_extensions_roundtrip() {
        let tracer = InMemoryTracer::new();
        let ctx = context(&tracer);
        let mut ext = http::Extensions::new();
        ctx.attach(&mut ext);

        let found = RequestContext::from_extensions(&ext).unwrap();
        assert_eq!(found.trace_id(), ctx.trace_id());
        assert_eq!(found.handle, ctx.handle);
    }

    /// Span whose attribute writes park until released.
    struct GatedSpan {
        entered: Sender<()>,
        release: Receiver<()>,
    }

    impl ActiveSpan for GatedSpan {
        fn trace_id(&self) -> String {
            "0af7651916cd43dd8448eb211c80319c".into()
        }

        fn span_id(&self) -> String {
            "b7ad6b7169203331".into()
        }

        fn set_attribute(&mut self, _key: &str, _value: Value) -> Result<(), SpanError> {
            let _ = self.entered.send(());
            let _ = self.release.recv();
            Ok(())
        }

        fn add_event(&mut self, _name: &str, _time_ms: u64, _attributes: &Attributes) -> Result<(), SpanError> {
            Ok(())
        }

        fn update_name(&mut self, _name: &str) -> Result<(), SpanError> {
            Ok(())
        }

        fn set_status(&mut self, _status: SpanStatus) -> Result<(), SpanError> {
            Ok(())
        }

        fn end(&mut self, _end_time_ms: Option<u64>) -> Result<(), SpanError> {
            Ok(())
        }
    }

    #[test]
    fn test_slow_span_stalls_only_its_request() {
        let registry = registry();
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let gated = GatedSpan {
            entered: entered_tx,
            release: release_rx,
        };
        let slow_handle = registry.insert(RequestState::new(NormalizedRequest::new("GET", "/slow"), Box::new(gated)));
        let slow = RequestContext::new(slow_handle, Arc::clone(&registry), String::new(), String::new());

        let tracer = InMemoryTracer::new();
        let span = tracer.start_span("GET /fast", SpanOptions::default());
        let fast_handle = registry.insert(RequestState::new(NormalizedRequest::new("GET", "/fast"), span));
        let fast = RequestContext::new(fast_handle, Arc::clone(&registry), String::new(), String::new());

        let parked = thread::spawn(move || slow.set_attribute("slow", true));
        entered_rx.recv().unwrap();

        let (done_tx, done_rx) = mpsc::channel();
        let other = Arc::clone(&registry);
        thread::spawn(move || {
            fast.set_attribute("fast", 1);
            fast.set_route("/fast");
            let state = other.take(fast.handle).unwrap();
            done_tx.send(state.attributes.get("fast").cloned()).unwrap();
        });
        let fast_attr = done_rx.recv_timeout(Duration::from_secs(5));

        release_tx.send(()).unwrap();
        parked.join().unwrap();

        assert_eq!(fast_attr.unwrap(), Some(json!(1)));
        let state = registry.take(slow_handle).unwrap();
        assert_eq!(state.attributes.get("slow"), Some(&json!(true)));
        assert_eq!(registry.live(), 0);
    }
}
