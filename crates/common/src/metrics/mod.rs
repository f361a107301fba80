//! Metrics and observability utilities
//!
//! Provides Prometheus metrics with SLO-aligned histograms
//! and standardized naming conventions.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all Reviewflow metrics
pub const METRICS_PREFIX: &str = "reviewflow";

/// SLO-aligned histogram buckets for request latency (in seconds)
/// Targets: P50 < 50ms, P99 < 250ms (uploads dominate the tail)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.001,  // 1ms
    0.005,  // 5ms
    0.010,  // 10ms
    0.025,  // 25ms
    0.050,  // 50ms - P50 target
    0.100,  // 100ms
    0.250,  // 250ms - P99 target
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    // Workflow metrics
    describe_counter!(
        format!("{}_transitions_total", METRICS_PREFIX),
        Unit::Count,
        "Paper lifecycle transitions by action and outcome"
    );

    describe_counter!(
        format!("{}_papers_submitted_total", METRICS_PREFIX),
        Unit::Count,
        "Total manuscripts submitted"
    );

    describe_counter!(
        format!("{}_reviews_submitted_total", METRICS_PREFIX),
        Unit::Count,
        "Total reviews recorded"
    );

    describe_counter!(
        format!("{}_payments_total", METRICS_PREFIX),
        Unit::Count,
        "Payment submissions and decisions by outcome"
    );

    describe_counter!(
        format!("{}_artifact_bytes_total", METRICS_PREFIX),
        Unit::Bytes,
        "Bytes written to the artifact store"
    );

    // Notification metrics
    describe_counter!(
        format!("{}_notifications_total", METRICS_PREFIX),
        Unit::Count,
        "Notification delivery attempts by outcome"
    );

    describe_gauge!(
        format!("{}_outbox_batch_size", METRICS_PREFIX),
        Unit::Count,
        "Messages claimed by the last outbox poll"
    );

    describe_histogram!(
        format!("{}_notification_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Notification delivery latency in seconds"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Record the outcome of a lifecycle action
pub fn record_transition(action: &str, outcome: &str) {
    counter!(
        format!("{}_transitions_total", METRICS_PREFIX),
        "action" => action.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record a new manuscript
pub fn record_submission(bytes: usize) {
    counter!(format!("{}_papers_submitted_total", METRICS_PREFIX)).increment(1);
    record_artifact_bytes("manuscript", bytes);
}

/// Record a stored review
pub fn record_review(recommendation: &str) {
    counter!(
        format!("{}_reviews_submitted_total", METRICS_PREFIX),
        "recommendation" => recommendation.to_string()
    )
    .increment(1);
}

/// Record a payment submission or decision
pub fn record_payment(outcome: &str) {
    counter!(
        format!("{}_payments_total", METRICS_PREFIX),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record bytes written to the artifact store
pub fn record_artifact_bytes(kind: &str, bytes: usize) {
    counter!(
        format!("{}_artifact_bytes_total", METRICS_PREFIX),
        "kind" => kind.to_string()
    )
    .increment(bytes as u64);
}

/// Record one delivery attempt
pub fn record_notification(duration_secs: f64, provider: &str, success: bool) {
    let status = if success { "sent" } else { "error" };

    counter!(
        format!("{}_notifications_total", METRICS_PREFIX),
        "provider" => provider.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        format!("{}_notification_duration_seconds", METRICS_PREFIX),
        "provider" => provider.to_string()
    )
    .record(duration_secs);
}

/// Record how many messages an outbox poll claimed
pub fn record_outbox_batch(size: usize) {
    gauge!(format!("{}_outbox_batch_size", METRICS_PREFIX)).set(size as f64);
}
