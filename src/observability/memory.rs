//! Local tracers: [`NoopTracer`] drops everything, [`InMemoryTracer`] keeps
//! finished spans for inspection.

use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::core::{now_millis, Attributes};
use crate::trace_context::TraceContext;

use super::span::{ActiveSpan, SpanError, SpanOptions, SpanStatus, Tracer};

fn context_for(options: &SpanOptions) -> TraceContext {
    match &options.parent {
        Some(parent) => parent.clone(),
        None => TraceContext::new(),
    }
}

/// Tracer that only hands out ids.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTracer;

struct NoopSpan {
    context: TraceContext,
}

impl ActiveSpan for NoopSpan {
    fn trace_id(&self) -> String {
        self.context.trace_id.clone()
    }

    fn span_id(&self) -> String {
        self.context.span_id.clone()
    }

    fn set_attribute(&mut self, _key: &str, _value: Value) -> Result<(), SpanError> {
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

impl Tracer for NoopTracer {
    fn start_span(&self, _name: &str, options: SpanOptions) -> Box<dyn ActiveSpan> {
        Box::new(NoopSpan {
            context: context_for(&options),
        })
    }
}

/// Event recorded on an in-memory span.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedEvent {
    pub name: String,
    pub time_ms: u64,
    pub attributes: Attributes,
}

/// A span as recorded by [`InMemoryTracer`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedSpan {
    pub name: String,
    pub trace_id: String,
    pub span_id: String,
    pub parent_span_id: Option<String>,
    pub start_time_ms: u64,
    pub end_time_ms: Option<u64>,
    pub attributes: Attributes,
    pub events: Vec<RecordedEvent>,
    pub status: SpanStatus,
}

impl RecordedSpan {
    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }
}

/// Tracer that records spans in memory.
///
/// Clones share the same storage. [`InMemoryTracer::failing`] builds a
/// tracer whose span operations all return errors (ids still work).
#[derive(Debug, Clone, Default)]
pub struct InMemoryTracer {
    finished: Arc<Mutex<Vec<RecordedSpan>>>,
    fail: bool,
}

impl InMemoryTracer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracer whose spans reject every operation.
    pub fn failing() -> Self {
        Self {
            finished: Arc::default(),
            fail: true,
        }
    }

    /// Spans that have ended, in end order.
    pub fn finished_spans(&self) -> Vec<RecordedSpan> {
        match self.finished.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Drop recorded spans.
    pub fn reset(&self) {
        if let Ok(mut guard) = self.finished.lock() {
            guard.clear();
        }
    }
}

impl Tracer for InMemoryTracer {
    fn start_span(&self, name: &str, options: SpanOptions) -> Box<dyn ActiveSpan> {
        let context = context_for(&options);
        let attributes = options
            .attributes
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();

        Box::new(InMemorySpan {
            record: RecordedSpan {
                name: name.to_string(),
                trace_id: context.trace_id,
                span_id: context.span_id,
                parent_span_id: context.parent_span_id,
                start_time_ms: options.start_time_ms.unwrap_or_else(now_millis),
                end_time_ms: None,
                attributes,
                events: Vec::new(),
                status: SpanStatus::Unset,
            },
            sink: Arc::clone(&self.finished),
            fail: self.fail,
        })
    }
}

struct InMemorySpan {
    record: RecordedSpan,
    sink: Arc<Mutex<Vec<RecordedSpan>>>,
    fail: bool,
}

impl InMemorySpan {
    fn check(&self, operation: &'static str) -> Result<(), SpanError> {
        if self.fail {
            return Err(SpanError::new(operation, "tracer configured to fail"));
        }
        if self.record.end_time_ms.is_some() {
            return Err(SpanError::new(operation, "span already ended"));
        }
        Ok(())
    }
}

impl ActiveSpan for InMemorySpan {
    fn trace_id(&self) -> String {
        self.record.trace_id.clone()
    }

    fn span_id(&self) -> String {
        self.record.span_id.clone()
    }

    fn set_attribute(&mut self, key: &str, value: Value) -> Result<(), SpanError> {
        self.check("set_attribute")?;
        self.record.attributes.insert(key.to_string(), value);
        Ok(())
    }

    fn add_event(&mut self, name: &str, time_ms: u64, attributes: &Attributes) -> Result<(), SpanError> {
        self.check("add_event")?;
        self.record.events.push(RecordedEvent {
            name: name.to_string(),
            time_ms,
            attributes: attributes.clone(),
        });
        Ok(())
    }

    fn update_name(&mut self, name: &str) -> Result<(), SpanError> {
        self.check("update_name")?;
        self.record.name = name.to_string();
        Ok(())
    }

    fn set_status(&mut self, status: SpanStatus) -> Result<(), SpanError> {
        self.check("set_status")?;
        self.record.status = status;
        Ok(())
    }

    fn end(&mut self, end_time_ms: Option<u64>) -> Result<(), SpanError> {
        self.check("end")?;
        self.record.end_time_ms = Some(end_time_ms.unwrap_or_else(now_millis));
        let mut guard = self
            .sink
            .lock()
            .map_err(|_| SpanError::new("end", "span store poisoned"))?;
        guard.push(self.record.clone());
        Ok(())
    }
}
