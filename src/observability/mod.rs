//! Observability: span interface, tracers and metrics.
//!
//! # Features
//!
//! - **Span interface**: [`Tracer`] / [`ActiveSpan`], implemented by
//!   [`NoopTracer`], [`InMemoryTracer`] and, with the `otel` feature,
//!   `OtelTracer`
//! - **Prometheus Metrics**: [`EmitterMetrics`], RED metrics per route
//!
//! # Usage
//!
//! ## OpenTelemetry (requires `otel` feature)
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
//!
//! ## Prometheus Metrics
//!
//! ```rust,ignore
//! use req_insight::observability::EmitterMetrics;
//!
//! let metrics = EmitterMetrics::new()?;
//! let emitter = Emitter::builder(config).metrics(metrics.clone()).build();
//! println!("{}", metrics.export()?);
//! ```

mod memory;
pub mod metrics;
pub mod span;

#[cfg(feature = "otel")]
pub mod otel;

// Re-exports
pub use memory::{InMemoryTracer, NoopTracer, RecordedEvent, RecordedSpan};
pub use metrics::EmitterMetrics;
pub use span::{keys, ActiveSpan, SpanError, SpanOptions, SpanStatus, Tracer};

#[cfg(feature = "otel")]
pub use otel::{OtelError, OtelPipeline, OtelTracer};
