// Private module declaration
mod server;

use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry};

// Re-export for public API
pub use server::start_metrics_server;

// ============================================================================
// Metrics Module - Prometheus metrics for the order store
// ============================================================================
//
// - store operation counts by operation and outcome (ok / error kind)
// - store operation latency by operation
// - HTTP responses by route and status
//
// Scraped via /metrics on the metrics server.
// ============================================================================

pub struct Metrics {
    registry: Registry,

    pub store_operations: IntCounterVec,
    pub store_operation_duration: HistogramVec,
    pub http_responses: IntCounterVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let store_operations = IntCounterVec::new(
            Opts::new("order_store_operations_total", "Order store operations by outcome"),
            &["operation", "outcome"],
        )?;
        registry.register(Box::new(store_operations.clone()))?;

        let store_operation_duration = HistogramVec::new(
            HistogramOpts::new(
                "order_store_operation_duration_seconds",
                "Order store operation latency",
            )
            .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
            &["operation"],
        )?;
        registry.register(Box::new(store_operation_duration.clone()))?;

        let http_responses = IntCounterVec::new(
            Opts::new("order_api_responses_total", "HTTP responses by route and status"),
            &["route", "status"],
        )?;
        registry.register(Box::new(http_responses.clone()))?;

        Ok(Self {
            registry,
            store_operations,
            store_operation_duration,
            http_responses,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_store_operation(&self, operation: &str, outcome: &str, duration_secs: f64) {
        self.store_operations.with_label_values(&[operation, outcome]).inc();
        self.store_operation_duration
            .with_label_values(&[operation])
            .observe(duration_secs);
    }

    pub fn record_http_response(&self, route: &str, status: u16) {
        self.http_responses
            .with_label_values(&[route, &status.to_string()])
            .inc();
    }
}
