//! Prometheus metrics for instrumented requests.
//!
//! RED metrics (rate, errors, duration) per method and normalized route,
//! plus capture and instrumentation-health counters.

use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};

/// Route label used when a request has no route.
const UNMATCHED_ROUTE: &str = "unmatched";

/// Prometheus metrics recorded by the emitter.
#[derive(Clone)]
pub struct EmitterMetrics {
    registry: Registry,

    /// Finished requests by method, route, status
    pub requests_total: CounterVec,

    /// Request duration in seconds by method, route
    pub request_duration_seconds: HistogramVec,

    /// Captured body sizes (true totals) by direction
    pub body_bytes: HistogramVec,

    /// Bodies cut at the capture limit, by direction
    pub truncated_bodies_total: CounterVec,

    /// Swallowed failures by kind (span, hook, override)
    pub instrumentation_failures_total: CounterVec,
}

impl EmitterMetrics {
    /// Create metrics in a fresh registry.
    pub fn new() -> Result<Self, prometheus::Error> {
        Self::with_registry(Registry::new())
    }

    /// Create metrics registered in an existing registry.
    pub fn with_registry(registry: Registry) -> Result<Self, prometheus::Error> {
        // Latency buckets (in seconds)
        let latency_buckets = vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ];

        // Size buckets (in bytes)
        let size_buckets = vec![100.0, 1000.0, 10000.0, 100000.0, 1000000.0, 10000000.0];

        let requests_total = CounterVec::new(
            Opts::new("req_insight_requests_total", "Total instrumented requests"),
            &["method", "route", "status"],
        )?;
        registry.register(Box::new(requests_total.clone()))?;

        let request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "req_insight_request_duration_seconds",
                "Request duration in seconds",
            )
            .buckets(latency_buckets),
            &["method", "route"],
        )?;
        registry.register(Box::new(request_duration_seconds.clone()))?;

        let body_bytes = HistogramVec::new(
            HistogramOpts::new("req_insight_body_bytes", "Observed body size in bytes")
                .buckets(size_buckets),
            &["direction"],
        )?;
        registry.register(Box::new(body_bytes.clone()))?;

        let truncated_bodies_total = CounterVec::new(
            Opts::new(
                "req_insight_truncated_bodies_total",
                "Bodies truncated at the capture limit",
            ),
            &["direction"],
        )?;
        registry.register(Box::new(truncated_bodies_total.clone()))?;

        let instrumentation_failures_total = CounterVec::new(
            Opts::new(
                "req_insight_instrumentation_failures_total",
                "Failures swallowed by the instrumentation",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(instrumentation_failures_total.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            request_duration_seconds,
            body_bytes,
            truncated_bodies_total,
            instrumentation_failures_total,
        })
    }

    /// Record a finished request.
    pub fn record_request(&self, method: &str, route: Option<&str>, status: Option<u16>, duration_ms: u64) {
        let route = route.unwrap_or(UNMATCHED_ROUTE);
        let status_str = status.map_or_else(|| "none".to_string(), |s| s.to_string());

        self.requests_total
            .with_label_values(&[method, route, &status_str])
            .inc();

        self.request_duration_seconds
            .with_label_values(&[method, route])
            .observe(duration_ms as f64 / 1000.0);
    }

    /// Record a captured body. `direction` is `request` or `response`.
    pub fn record_body(&self, direction: &str, total_bytes: u64, truncated: bool) {
        self.body_bytes
            .with_label_values(&[direction])
            .observe(total_bytes as f64);
        if truncated {
            self.truncated_bodies_total.with_label_values(&[direction]).inc();
        }
    }

    /// Count a swallowed failure.
    pub fn record_failure(&self, kind: &str) {
        self.instrumentation_failures_total
            .with_label_values(&[kind])
            .inc();
    }

    /// Export metrics in Prometheus text format.
    pub fn export(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    /// Get the Prometheus registry (for custom metrics).
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl std::fmt::Debug for EmitterMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmitterMetrics").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = EmitterMetrics::new().expect("Should create metrics");
        metrics.record_failure("span");
        assert!(metrics.export().unwrap().contains("# HELP"));
    }

    #[test]
    fn test_request_recording() {
        let metrics = EmitterMetrics::new().unwrap();
        metrics.record_request("GET", Some("/users/{id}"), Some(200), 42);
        metrics.record_request("GET", None, None, 1);

        let output = metrics.export().unwrap();
        assert!(output.contains("req_insight_requests_total"));
        assert!(output.contains("route=\"/users/{id}\""));
        assert!(output.contains("route=\"unmatched\""));
        assert!(output.contains("status=\"none\""));
    }

    #[test]
    fn test_body_recording() {
        let metrics = EmitterMetrics::new().unwrap();
        metrics.record_body("request", 20_000, true);
        metrics.record_body("response", 10, false);

        assert_eq!(metrics.truncated_bodies_total.with_label_values(&["request"]).get(), 1.0);
        assert_eq!(metrics.truncated_bodies_total.with_label_values(&["response"]).get(), 0.0);
    }

    #[test]
    fn test_shared_registry_rejects_duplicates() {
        let registry = Registry::new();
        EmitterMetrics::with_registry(registry.clone()).unwrap();
        assert!(EmitterMetrics::with_registry(registry).is_err());
    }
}
