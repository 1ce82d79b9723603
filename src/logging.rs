//! Unified JSON logging with custom format.
//!
//! Log format:
//! ```json
//! {"ts":"2024-12-28T15:04:05.123Z","level":"info","type":"app","msg":"Emitter ready","ctx":{"service":"api"},"data":{}}
//! ```
//!
//! Finished request records are emitted with target `request` and typed
//! `request`; the serialized [`RequestLog`] becomes `data`.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Map, Value};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::core::{Iso8601Timestamp, RequestLog};

/// Target of finished request records.
pub const REQUEST_TARGET: &str = "request";

/// Field holding the serialized record on request events.
const RECORD_FIELD: &str = "record";

/// Fields lifted from request events into `ctx`.
const CONTEXT_FIELDS: [&str; 3] = ["request_id", "trace_id", "span_id"];

/// Logging could not be installed.
#[derive(Debug)]
pub enum LoggingError {
    /// The filter directive did not parse.
    Filter(String),
    /// A global subscriber is already set.
    Init(TryInitError),
}

impl fmt::Display for LoggingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoggingError::Filter(e) => write!(f, "invalid log filter: {}", e),
            LoggingError::Init(e) => write!(f, "failed to install logging: {}", e),
        }
    }
}

impl std::error::Error for LoggingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoggingError::Filter(_) => None,
            LoggingError::Init(e) => Some(e),
        }
    }
}

/// Install the global subscriber: `EnvFilter` plus the JSON line formatter
/// on stdout.
pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingError> {
    let filter =
        EnvFilter::try_new(&config.filter).map_err(|e| LoggingError::Filter(e.to_string()))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .event_format(JsonFormatter::new(config.service_name.clone())),
        )
        .try_init()
        .map_err(LoggingError::Init)
}

/// Emit a finished request record on the `request` target.
pub fn log_request(log: &RequestLog) {
    let record = match serde_json::to_string(log) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(error = %e, request_id = %log.request_id, "Failed to serialize request log");
            return;
        }
    };

    let status = log.status.map_or_else(|| "-".to_string(), |s| s.to_string());
    let path = log.route.as_deref().unwrap_or(&log.url);

    if log.is_error() {
        tracing::error!(
            target: "request",
            request_id = %log.request_id,
            trace_id = %log.trace_id,
            span_id = %log.span_id,
            record = record.as_str(),
            "{} {} {}", log.method, path, status
        );
    } else {
        tracing::info!(
            target: "request",
            request_id = %log.request_id,
            trace_id = %log.trace_id,
            span_id = %log.span_id,
            record = record.as_str(),
            "{} {} {}", log.method, path, status
        );
    }
}

/// Custom JSON formatter for tracing.
pub struct JsonFormatter {
    service_name: String,
}

impl JsonFormatter {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }
}

impl<S, N> FormatEvent<S, N> for JsonFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let meta = event.metadata();
        let level = match *meta.level() {
            Level::TRACE => "debug",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };

        let log_type = if meta.target() == REQUEST_TARGET {
            "request"
        } else if *meta.level() == Level::ERROR {
            "error"
        } else {
            "app"
        };

        let mut visitor = FieldVisitor::new();
        event.record(&mut visitor);

        let mut ctx = Map::new();
        ctx.insert("service".into(), Value::String(self.service_name.clone()));

        let data = if log_type == "request" {
            for key in CONTEXT_FIELDS {
                if let Some(v) = visitor.fields.remove(key) {
                    ctx.insert(key.into(), v);
                }
            }
            match visitor.fields.remove(RECORD_FIELD) {
                Some(Value::String(raw)) => {
                    serde_json::from_str(&raw).unwrap_or(Value::String(raw))
                }
                _ => Value::Object(visitor.fields.into_iter().collect()),
            }
        } else {
            Value::Object(visitor.fields.into_iter().collect())
        };

        let entry = serde_json::json!({
            "ts": Iso8601Timestamp::now().as_str(),
            "level": level,
            "type": log_type,
            "msg": visitor.message.unwrap_or_default(),
            "ctx": ctx,
            "data": data,
        });

        writeln!(
            writer,
            "{}",
            serde_json::to_string(&entry).unwrap_or_default()
        )
    }
}

/// Field visitor for collecting tracing fields.
struct FieldVisitor {
    message: Option<String>,
    fields: BTreeMap<String, Value>,
}

impl FieldVisitor {
    fn new() -> Self {
        Self {
            message: None,
            fields: BTreeMap::new(),
        }
    }
}

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{:?}", value).trim_matches('"').to_string());
        } else {
            self.fields.insert(
                field.name().to_string(),
                Value::String(format!("{:?}", value)),
            );
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.fields
                .insert(field.name().to_string(), Value::String(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.fields
            .insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.fields
            .insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_f64(&mut self, field: &tracing::field::Field, value: f64) {
        self.fields
            .insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.fields
            .insert(field.name().to_string(), serde_json::json!(value));
    }
}
