//! Prometheus metrics for the HTTP layer.
//!
//! Core conversion metrics (queue, pool, capture, encode) live in
//! `svgmoji_core::metrics` and are registered here alongside the HTTP
//! request metrics.

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Registry, TextEncoder,
};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "svgmoji_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new("svgmoji_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "svgmoji_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // Core metrics (queue, pool, capture, encoders)
    for metric in svgmoji_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

/// Refresh gauges that mirror current component state.
///
/// Called before encoding metrics so scrapes see current queue and
/// pool occupancy rather than the last observed transition.
pub fn collect_dynamic_metrics(state: &crate::state::AppState) {
    use svgmoji_core::metrics::{POOL_AVAILABLE, POOL_SIZE, QUEUE_ACTIVE_JOBS, QUEUE_DEPTH};

    let queue = state.queue_stats();
    QUEUE_ACTIVE_JOBS.set(queue.active_jobs as i64);
    QUEUE_DEPTH.set(queue.queue_length as i64);

    let pool = state.pool_stats();
    POOL_SIZE.set(pool.size as i64);
    POOL_AVAILABLE.set(pool.available as i64);
}

/// Normalize a path for metric labels (replace IDs with placeholders).
pub fn normalize_path(path: &str) -> String {
    let uuid_regex = regex_lite::Regex::new(
        r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}",
    )
    .unwrap();
    // Artifact downloads carry job-id-derived filenames
    let filename_regex = regex_lite::Regex::new(r"/download/[^/]+$").unwrap();

    let result = filename_regex.replace(path, "/download/{filename}");
    let result = uuid_regex.replace_all(&result, "{id}");
    result.to_string()
}
