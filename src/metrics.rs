//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::{HistogramOpts, IntCounter, IntCounterVec, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("murmur_http_requests_total", "Total number of HTTP requests"),
        &["method", "endpoint", "status"]
    ).expect("metric can be created");
    pub static ref HTTP_REQUEST_DURATION_SECONDS: prometheus::HistogramVec = prometheus::HistogramVec::new(
        HistogramOpts::new(
            "murmur_http_request_duration_seconds",
            "HTTP request duration in seconds"
        ).buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["method", "endpoint"]
    ).expect("metric can be created");

    // Relationship Metrics
    pub static ref RELATIONSHIP_TOGGLES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("murmur_relationship_toggles_total", "Total number of follow/like toggles"),
        &["kind", "outcome"]
    ).expect("metric can be created");
    pub static ref NOTIFICATIONS_CREATED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("murmur_notifications_created_total", "Total number of notifications created"),
        &["notification_type"]
    ).expect("metric can be created");

    // Storage Metrics
    pub static ref MEDIA_UPLOADS_TOTAL: IntCounter = IntCounter::new(
        "murmur_media_uploads_total",
        "Total number of media uploads"
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("murmur_errors_total", "Total number of errors"),
        &["error_type"]
    ).expect("metric can be created");
}

static INIT: Once = Once::new();

/// Initialize metrics registry.
///
/// Safe to call more than once; only the first call registers.
pub fn init_metrics() {
    INIT.call_once(|| {
        REGISTRY
            .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
            .expect("HTTP_REQUESTS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()))
            .expect("HTTP_REQUEST_DURATION_SECONDS can be registered");
        REGISTRY
            .register(Box::new(RELATIONSHIP_TOGGLES_TOTAL.clone()))
            .expect("RELATIONSHIP_TOGGLES_TOTAL can be registered");
        REGISTRY
            .register(Box::new(NOTIFICATIONS_CREATED_TOTAL.clone()))
            .expect("NOTIFICATIONS_CREATED_TOTAL can be registered");
        REGISTRY
            .register(Box::new(MEDIA_UPLOADS_TOTAL.clone()))
            .expect("MEDIA_UPLOADS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(ERRORS_TOTAL.clone()))
            .expect("ERRORS_TOTAL can be registered");

        tracing::info!("Metrics registry initialized");
    });
}

/// Record a completed HTTP request.
pub fn observe_http_request(method: &str, endpoint: &str, status: u16, elapsed: std::time::Duration) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, endpoint, &status.to_string()])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, endpoint])
        .observe(elapsed.as_secs_f64());
}
