//! OpenTelemetry OTLP/HTTP pipeline behind the [`Tracer`] interface.
//!
//! Spans are exported to the resolved exporter endpoint (`.../v1/traces`)
//! with the configured headers and timeout, batched or one by one per
//! [`ExportMode`]. Nothing is flushed implicitly: call
//! [`OtelPipeline::flush`] / [`OtelPipeline::shutdown`] before exit.
//!
//! # Example
//!
//! ```rust,ignore
//! use req_insight::observability::OtelPipeline;
//!
//! let pipeline = OtelPipeline::install(&config)?;
//! let emitter = Emitter::builder(config).tracer(pipeline.tracer()).build();
//!
//! // ... serve requests ...
//!
//! pipeline.shutdown()?;
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use opentelemetry::trace::{
    Span as _, SpanContext, SpanId, SpanKind, Status, TraceContextExt, TraceFlags, TraceId,
    TraceState, Tracer as _, TracerProvider as _,
};
use opentelemetry::{Array, Context, KeyValue, StringValue};
use opentelemetry_otlp::{WithExportConfig, WithHttpConfig};
use opentelemetry_sdk::{runtime, trace::Config, Resource};
use serde_json::Value;
use tracing::info;

use crate::config::{ExportMode, ResolvedConfig};
use crate::core::Attributes;

use super::span::{keys, ActiveSpan, SpanError, SpanOptions, SpanStatus, Tracer};

/// Instrumentation scope name.
const SCOPE: &str = "req_insight";

/// Failure building or driving the pipeline.
#[derive(Debug)]
pub struct OtelError(String);

impl fmt::Display for OtelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "opentelemetry pipeline error: {}", self.0)
    }
}

impl std::error::Error for OtelError {}

/// Installed OTLP exporter and tracer provider.
#[derive(Clone)]
pub struct OtelPipeline {
    provider: opentelemetry_sdk::trace::TracerProvider,
}

impl OtelPipeline {
    /// Build the exporter and provider from a resolved configuration.
    ///
    /// Batch mode needs a running Tokio runtime.
    pub fn install(config: &ResolvedConfig) -> Result<Self, OtelError> {
        let mut resource = vec![KeyValue::new(keys::SERVICE_NAME, config.service.name.clone())];
        if let Some(ref version) = config.service.version {
            resource.push(KeyValue::new(keys::SERVICE_VERSION, version.clone()));
        }
        if let Some(ref env) = config.service.environment {
            resource.push(KeyValue::new(keys::DEPLOYMENT_ENVIRONMENT, env.clone()));
        }

        let headers: HashMap<String, String> = config
            .exporter
            .headers
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_http()
            .with_endpoint(config.exporter.endpoint.clone())
            .with_timeout(config.exporter.timeout)
            .with_headers(headers)
            .build()
            .map_err(|e| OtelError(e.to_string()))?;

        let builder = opentelemetry_sdk::trace::TracerProvider::builder()
            .with_config(Config::default().with_resource(Resource::new(resource)));

        let provider = match config.exporter.mode {
            ExportMode::Batch => builder.with_batch_exporter(exporter, runtime::Tokio).build(),
            ExportMode::Immediate => builder.with_simple_exporter(exporter).build(),
        };

        info!(
            endpoint = %config.exporter.endpoint,
            service = %config.service.name,
            mode = %config.exporter.mode,
            "OpenTelemetry span export initialized"
        );

        Ok(Self { provider })
    }

    /// Tracer to hand to the emitter.
    pub fn tracer(&self) -> Arc<dyn Tracer> {
        Arc::new(OtelTracer {
            tracer: self.provider.tracer(SCOPE),
        })
    }

    /// Export everything queued so far.
    pub fn flush(&self) -> Result<(), OtelError> {
        let failures: Vec<String> = self
            .provider
            .force_flush()
            .into_iter()
            .filter_map(|r| r.err().map(|e| e.to_string()))
            .collect();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(OtelError(failures.join("; ")))
        }
    }

    /// Flush and stop the exporter. Spans ended afterwards are dropped.
    pub fn shutdown(&self) -> Result<(), OtelError> {
        self.provider
            .shutdown()
            .map_err(|e| OtelError(e.to_string()))?;
        info!("OpenTelemetry span export shutdown complete");
        Ok(())
    }
}

impl fmt::Debug for OtelPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OtelPipeline").finish_non_exhaustive()
    }
}

/// [`Tracer`] backed by an OpenTelemetry SDK tracer.
pub struct OtelTracer {
    tracer: opentelemetry_sdk::trace::Tracer,
}

impl Tracer for OtelTracer {
    fn start_span(&self, name: &str, options: SpanOptions) -> Box<dyn ActiveSpan> {
        let mut builder = self
            .tracer
            .span_builder(name.to_string())
            .with_kind(SpanKind::Server)
            .with_attributes(
                options
                    .attributes
                    .iter()
                    .map(|(k, v)| key_value(k, v))
                    .collect::<Vec<_>>(),
            );
        if let Some(ms) = options.start_time_ms {
            builder = builder.with_start_time(system_time(ms));
        }

        let parent = options.parent.as_ref().and_then(|p| {
            let parent_span = p.parent_span_id.as_deref()?;
            let span_context = SpanContext::new(
                TraceId::from_hex(&p.trace_id).ok()?,
                SpanId::from_hex(parent_span).ok()?,
                TraceFlags::new(p.flags),
                true,
                TraceState::default(),
            );
            Some(Context::new().with_remote_span_context(span_context))
        });

        let span = match parent {
            Some(cx) => builder.start_with_context(&self.tracer, &cx),
            None => builder.start(&self.tracer),
        };

        Box::new(OtelSpan { span, ended: false })
    }
}

struct OtelSpan {
    span: opentelemetry_sdk::trace::Span,
    ended: bool,
}

impl OtelSpan {
    fn check(&self, operation: &'static str) -> Result<(), SpanError> {
        if self.ended {
            Err(SpanError::new(operation, "span already ended"))
        } else {
            Ok(())
        }
    }
}

impl ActiveSpan for OtelSpan {
    fn trace_id(&self) -> String {
        hex(&self.span.span_context().trace_id().to_bytes())
    }

    fn span_id(&self) -> String {
        hex(&self.span.span_context().span_id().to_bytes())
    }

    fn set_attribute(&mut self, key: &str, value: Value) -> Result<(), SpanError> {
        self.check("set_attribute")?;
        self.span.set_attribute(key_value(key, &value));
        Ok(())
    }

    fn add_event(&mut self, name: &str, time_ms: u64, attributes: &Attributes) -> Result<(), SpanError> {
        self.check("add_event")?;
        let attrs = attributes.iter().map(|(k, v)| key_value(k, v)).collect();
        self.span
            .add_event_with_timestamp(name.to_string(), system_time(time_ms), attrs);
        Ok(())
    }

    fn update_name(&mut self, name: &str) -> Result<(), SpanError> {
        self.check("update_name")?;
        self.span.update_name(name.to_string());
        Ok(())
    }

    fn set_status(&mut self, status: SpanStatus) -> Result<(), SpanError> {
        self.check("set_status")?;
        self.span.set_status(match status {
            SpanStatus::Unset => Status::Unset,
            SpanStatus::Ok => Status::Ok,
            SpanStatus::Error(description) => Status::error(description),
        });
        Ok(())
    }

    fn end(&mut self, end_time_ms: Option<u64>) -> Result<(), SpanError> {
        self.check("end")?;
        self.ended = true;
        match end_time_ms {
            Some(ms) => self.span.end_with_timestamp(system_time(ms)),
            None => self.span.end(),
        }
        Ok(())
    }
}

fn system_time(ms: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_millis(ms)
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Map a JSON attribute onto an OpenTelemetry value.
fn key_value(key: &str, value: &Value) -> KeyValue {
    let key = key.to_string();
    match value {
        Value::Bool(b) => KeyValue::new(key, *b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => KeyValue::new(key, i),
            None => KeyValue::new(key, n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => KeyValue::new(key, s.clone()),
        Value::Array(items) if items.iter().all(Value::is_string) => {
            let strings: Vec<StringValue> = items
                .iter()
                .filter_map(Value::as_str)
                .map(|s| StringValue::from(s.to_string()))
                .collect();
            KeyValue::new(key, opentelemetry::Value::Array(Array::String(strings)))
        }
        Value::Null => KeyValue::new(key, ""),
        Value::Array(_) | Value::Object(_) => KeyValue::new(key, value.to_string()),
    }
}
