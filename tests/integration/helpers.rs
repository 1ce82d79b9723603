//! Test helpers and utilities

use std::sync::{Arc, Mutex};

use req_insight::observability::{EmitterMetrics, InMemoryTracer, RecordedSpan};
use req_insight::{Emitter, RawConfig, RequestLog, ResolvedConfig};

/// Emitter wired to an in-memory tracer, a collecting sink and metrics.
pub struct TestEmitter {
    pub emitter: Emitter,
    pub tracer: InMemoryTracer,
    pub logs: Arc<Mutex<Vec<RequestLog>>>,
}

#[allow(dead_code)]
impl TestEmitter {
    /// Default test configuration for service `checkout`.
    pub fn new() -> Self {
        Self::with_config(resolve(base_config()))
    }

    pub fn with_config(config: ResolvedConfig) -> Self {
        let tracer = InMemoryTracer::new();
        let logs: Arc<Mutex<Vec<RequestLog>>> = Arc::default();
        let sink_logs = Arc::clone(&logs);

        let emitter = Emitter::builder(config)
            .tracer(Arc::new(tracer.clone()))
            .sink(move |log: &RequestLog| sink_logs.lock().unwrap().push(log.clone()))
            .metrics(EmitterMetrics::new().expect("metrics"))
            .build();

        Self {
            emitter,
            tracer,
            logs,
        }
    }

    /// Records delivered to the sink so far.
    pub fn emitted(&self) -> Vec<RequestLog> {
        self.logs.lock().unwrap().clone()
    }

    /// The single finished span.
    pub fn span(&self) -> RecordedSpan {
        let spans = self.tracer.finished_spans();
        assert_eq!(spans.len(), 1, "expected exactly one finished span");
        spans.into_iter().next().unwrap()
    }
}

pub fn base_config() -> RawConfig {
    RawConfig::new("checkout").with_endpoint("http://collector:4318")
}

/// Resolve without reading the process environment.
pub fn resolve(raw: RawConfig) -> ResolvedConfig {
    raw.resolve_with_env(|_| None).expect("valid test config")
}
