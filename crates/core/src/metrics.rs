//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Admission queue (depth, active jobs, wait times, rejections)
//! - Worker pool (size, launches, failures, evictions)
//! - Conversion pipeline (captures, encodes, artifact sizes)

use once_cell::sync::Lazy;
use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts,
};

// =============================================================================
// Admission Queue Metrics
// =============================================================================

/// Conversion jobs total by result.
pub static JOBS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("svgmoji_jobs_total", "Total conversion jobs"),
        &["result"], // "completed", "failed", "rejected"
    )
    .unwrap()
});

/// Jobs currently holding an admission slot.
pub static QUEUE_ACTIVE_JOBS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "svgmoji_queue_active_jobs",
        "Jobs currently holding an admission slot",
    )
    .unwrap()
});

/// Jobs waiting for an admission slot.
pub static QUEUE_DEPTH: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("svgmoji_queue_depth", "Jobs waiting for an admission slot").unwrap()
});

/// Time spent waiting for admission in seconds.
pub static QUEUE_WAIT_DURATION: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "svgmoji_queue_wait_duration_seconds",
            "Time spent waiting for an admission slot",
        )
        .buckets(vec![0.01, 0.1, 0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0]),
    )
    .unwrap()
});

/// Admission rejections total by reason.
pub static ADMISSION_REJECTIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "svgmoji_admission_rejections_total",
            "Total admission rejections",
        ),
        &["reason"], // "capacity", "timeout", "shutdown"
    )
    .unwrap()
});

// =============================================================================
// Worker Pool Metrics
// =============================================================================

/// Renderer workers currently alive.
pub static POOL_SIZE: Lazy<IntGauge> =
    Lazy::new(|| IntGauge::new("svgmoji_pool_size", "Renderer workers currently alive").unwrap());

/// Idle renderer workers available for borrowing.
pub static POOL_AVAILABLE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "svgmoji_pool_available",
        "Idle renderer workers available for borrowing",
    )
    .unwrap()
});

/// Worker launches total.
pub static WORKER_LAUNCHES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("svgmoji_worker_launches_total", "Total worker launches").unwrap()
});

/// Worker launch failures total.
pub static WORKER_LAUNCH_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "svgmoji_worker_launch_failures_total",
        "Total worker launch failures",
    )
    .unwrap()
});

/// Workers destroyed for idling past the timeout.
pub static WORKER_EVICTIONS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "svgmoji_worker_evictions_total",
        "Total workers evicted for idling past the timeout",
    )
    .unwrap()
});

// =============================================================================
// Pipeline Metrics
// =============================================================================

/// Capture duration in seconds by variant.
pub static CAPTURE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "svgmoji_capture_duration_seconds",
            "Duration of timeline frame capture",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
        &["variant"], // "gif", "emoji", "sticker"
    )
    .unwrap()
});

/// Frames captured per capture pass.
pub static CAPTURE_FRAMES: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new("svgmoji_capture_frames", "Frames captured per capture pass")
            .buckets(vec![1.0, 15.0, 30.0, 60.0, 90.0, 150.0, 300.0, 600.0]),
    )
    .unwrap()
});

/// Encode duration in seconds by output format.
pub static ENCODE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "svgmoji_encode_duration_seconds",
            "Duration of artifact encoding",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]),
        &["format"], // "gif", "webm"
    )
    .unwrap()
});

/// Artifact sizes in bytes by output format.
pub static ARTIFACT_SIZE: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("svgmoji_artifact_size_bytes", "Encoded artifact sizes").buckets(vec![
            16384.0, 65536.0, 131072.0, 262144.0, 524288.0, 1048576.0, 4194304.0,
        ]),
        &["format"],
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Queue
        Box::new(JOBS_TOTAL.clone()),
        Box::new(QUEUE_ACTIVE_JOBS.clone()),
        Box::new(QUEUE_DEPTH.clone()),
        Box::new(QUEUE_WAIT_DURATION.clone()),
        Box::new(ADMISSION_REJECTIONS.clone()),
        // Pool
        Box::new(POOL_SIZE.clone()),
        Box::new(POOL_AVAILABLE.clone()),
        Box::new(WORKER_LAUNCHES.clone()),
        Box::new(WORKER_LAUNCH_FAILURES.clone()),
        Box::new(WORKER_EVICTIONS.clone()),
        // Pipeline
        Box::new(CAPTURE_DURATION.clone()),
        Box::new(CAPTURE_FRAMES.clone()),
        Box::new(ENCODE_DURATION.clone()),
        Box::new(ARTIFACT_SIZE.clone()),
    ]
}
