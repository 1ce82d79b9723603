//! Caller-supplied lifecycle hooks and log sinks.
//!
//! Hooks run in registration order. A hook that returns an error or panics,
//! or a sink that panics, is logged at `warn` and skipped; the request
//! carries on.
//!
//! ```text
//! start  → on_request (every hook)
//! finish → sink → on_error (if an error was captured) → on_response
//! ```

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::warn;

use crate::core::{ErrorDetail, NormalizedRequest, RequestLog};
use crate::observability::EmitterMetrics;

use super::RequestContext;

/// Error returned by a hook.
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// Observer of the request lifecycle.
pub trait EmitterHook: Send + Sync {
    /// Name used in warnings.
    fn name(&self) -> &'static str;

    /// Called once the request state is registered. The context is live,
    /// so the hook may already set actor, attributes and so on.
    fn on_request(&self, _req: &NormalizedRequest, _ctx: &RequestContext) -> Result<(), HookError> {
        Ok(())
    }

    /// Called with the final, redacted record.
    fn on_response(&self, _log: &RequestLog) -> Result<(), HookError> {
        Ok(())
    }

    /// Called before `on_response` when the record carries an error.
    fn on_error(&self, _log: &RequestLog, _error: &ErrorDetail) -> Result<(), HookError> {
        Ok(())
    }
}

/// Destination of finished request records.
pub trait LogSink: Send + Sync {
    fn emit(&self, log: &RequestLog);
}

/// Default sink: one `request` line through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn emit(&self, log: &RequestLog) {
        crate::logging::log_request(log);
    }
}

impl<F> LogSink for F
where
    F: Fn(&RequestLog) + Send + Sync,
{
    fn emit(&self, log: &RequestLog) {
        self(log)
    }
}

/// Ordered hook list with failure isolation.
#[derive(Clone, Default)]
pub(crate) struct HookChain {
    hooks: Vec<Arc<dyn EmitterHook>>,
}

impl HookChain {
    pub(crate) fn push(&mut self, hook: Arc<dyn EmitterHook>) {
        self.hooks.push(hook);
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    pub(crate) fn names(&self) -> Vec<&'static str> {
        self.hooks.iter().map(|h| h.name()).collect()
    }

    pub(crate) fn on_request(
        &self,
        req: &NormalizedRequest,
        ctx: &RequestContext,
        metrics: Option<&EmitterMetrics>,
    ) {
        for hook in &self.hooks {
            guarded(hook.name(), "on_request", metrics, || hook.on_request(req, ctx));
        }
    }

    pub(crate) fn on_finish(&self, log: &RequestLog, metrics: Option<&EmitterMetrics>) {
        for hook in &self.hooks {
            if let Some(ref error) = log.error {
                guarded(hook.name(), "on_error", metrics, || hook.on_error(log, error));
            }
            guarded(hook.name(), "on_response", metrics, || hook.on_response(log));
        }
    }
}

/// Run a hook, swallowing errors and panics.
fn guarded<F>(hook: &'static str, phase: &'static str, metrics: Option<&EmitterMetrics>, f: F)
where
    F: FnOnce() -> Result<(), HookError>,
{
    let failure = match catch_panic(f) {
        Ok(Ok(())) => return,
        Ok(Err(e)) => e.to_string(),
        Err(panic) => panic,
    };

    warn!(hook, phase, error = %failure, "Hook failed");
    if let Some(m) = metrics {
        m.record_failure("hook");
    }
}

/// Run caller-supplied code, turning a panic into its message.
pub(crate) fn catch_panic<T>(f: impl FnOnce() -> T) -> Result<T, String> {
    catch_unwind(AssertUnwindSafe(f)).map_err(|payload| panic_message(payload.as_ref()))
}

/// Deliver a record to the sink. A panicking sink is logged and counted.
pub(crate) fn emit_guarded(sink: &dyn LogSink, log: &RequestLog, metrics: Option<&EmitterMetrics>) {
    if let Err(e) = catch_panic(|| sink.emit(log)) {
        warn!(request_id = %log.request_id, error = %e, "Log sink failed");
        if let Some(m) = metrics {
            m.record_failure("sink");
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}
