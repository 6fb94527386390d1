//! Metrics recording implementation using Prometheus.

use prometheus::{
    register_counter_vec_with_registry, register_counter_with_registry,
    register_histogram_vec_with_registry, Counter, CounterVec, Encoder, HistogramVec, Opts,
    Registry, TextEncoder,
};
use std::sync::Arc;

/// Trait for recording pipeline metrics.
pub trait MetricsRecorder: Clone + Send + Sync + 'static {
    /// Records a finished operation with its outcome ("ok", "graphql_error", ...).
    fn record_operation(&self, result: &str, duration_secs: f64);

    /// Records one transmission to the endpoint.
    fn record_transport_attempt(&self, result: &str);

    /// Records a scheduled retry after a failed transmission.
    fn record_retry(&self);

    /// Records a token refresh with its outcome ("success" or "failure").
    fn record_refresh(&self, result: &str);

    /// Records an error handed to the error surface.
    fn record_surfaced_error(&self, origin: &str);

    /// Records an error dropped because a refresh was pending.
    fn record_suppressed_error(&self, origin: &str);
}

/// Prometheus metrics collector.
#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,

    operations_total: CounterVec,
    operation_duration_seconds: HistogramVec,

    transport_attempts_total: CounterVec,
    retries_total: Counter,

    refreshes_total: CounterVec,

    surfaced_errors_total: CounterVec,
    suppressed_errors_total: CounterVec,
}

impl Metrics {
    /// Creates a new metrics instance with its own Prometheus registry.
    pub fn new() -> Self {
        let registry = Arc::new(Registry::new());

        let operations_total = register_counter_vec_with_registry!(
            Opts::new(
                "graphql_operations_total",
                "Total number of GraphQL operations executed"
            ),
            &["result"],
            registry.clone()
        )
        .expect("Failed to register graphql_operations_total");

        let operation_duration_seconds = register_histogram_vec_with_registry!(
            "graphql_operation_duration_seconds",
            "GraphQL operation duration in seconds, retries included",
            &["result"],
            vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 300.0],
            registry.clone()
        )
        .expect("Failed to register graphql_operation_duration_seconds");

        let transport_attempts_total = register_counter_vec_with_registry!(
            Opts::new(
                "graphql_transport_attempts_total",
                "Total transmissions to the GraphQL endpoint"
            ),
            &["result"],
            registry.clone()
        )
        .expect("Failed to register graphql_transport_attempts_total");

        let retries_total = register_counter_with_registry!(
            Opts::new("graphql_retries_total", "Total retries scheduled"),
            registry.clone()
        )
        .expect("Failed to register graphql_retries_total");

        let refreshes_total = register_counter_vec_with_registry!(
            Opts::new("auth_token_refreshes_total", "Total silent token refreshes"),
            &["result"],
            registry.clone()
        )
        .expect("Failed to register auth_token_refreshes_total");

        let surfaced_errors_total = register_counter_vec_with_registry!(
            Opts::new(
                "surfaced_errors_total",
                "Errors handed to the user-visible error surface"
            ),
            &["origin"],
            registry.clone()
        )
        .expect("Failed to register surfaced_errors_total");

        let suppressed_errors_total = register_counter_vec_with_registry!(
            Opts::new(
                "suppressed_errors_total",
                "Errors dropped while a token refresh was pending"
            ),
            &["origin"],
            registry.clone()
        )
        .expect("Failed to register suppressed_errors_total");

        Metrics {
            registry,
            operations_total,
            operation_duration_seconds,
            transport_attempts_total,
            retries_total,
            refreshes_total,
            surfaced_errors_total,
            suppressed_errors_total,
        }
    }

    /// Renders all metrics in Prometheus text format.
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .expect("Failed to encode metrics");
        String::from_utf8(buffer).expect("Metrics encoding produced invalid UTF-8")
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRecorder for Metrics {
    fn record_operation(&self, result: &str, duration_secs: f64) {
        self.operations_total.with_label_values(&[result]).inc();
        self.operation_duration_seconds
            .with_label_values(&[result])
            .observe(duration_secs);
    }

    fn record_transport_attempt(&self, result: &str) {
        self.transport_attempts_total
            .with_label_values(&[result])
            .inc();
    }

    fn record_retry(&self) {
        self.retries_total.inc();
    }

    fn record_refresh(&self, result: &str) {
        self.refreshes_total.with_label_values(&[result]).inc();
    }

    fn record_surfaced_error(&self, origin: &str) {
        self.surfaced_errors_total
            .with_label_values(&[origin])
            .inc();
    }

    fn record_suppressed_error(&self, origin: &str) {
        self.suppressed_errors_total
            .with_label_values(&[origin])
            .inc();
    }
}
