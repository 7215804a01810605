//! Prometheus metrics for the checkout core.
//!
//! HTTP request metrics are recorded by the middleware; the engines record
//! the domain counters (holds, orders, webhook outcomes, stock
//! restorations). Rendered at `GET /metrics`.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

/// Metric names as constants for consistency
pub mod names {
    pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";

    pub const HOLDS_CREATED_TOTAL: &str = "holds_created_total";
    pub const HOLDS_EXPIRED_TOTAL: &str = "holds_expired_total";
    pub const ORDERS_CREATED_TOTAL: &str = "orders_created_total";
    pub const WEBHOOKS_PROCESSED_TOTAL: &str = "webhooks_processed_total";
    pub const WEBHOOK_REPLAYS_TOTAL: &str = "webhook_replays_total";
    pub const STOCK_RESTORATIONS_TOTAL: &str = "stock_restorations_total";
}

/// Label keys
pub mod labels {
    pub const METHOD: &str = "method";
    pub const ENDPOINT: &str = "endpoint";
    pub const STATUS: &str = "status";
    pub const RESULT: &str = "result";
}

/// Install the Prometheus recorder and return the render handle.
pub fn init_metrics() -> PrometheusHandle {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(names::HTTP_REQUEST_DURATION_SECONDS.to_string()),
            &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0],
        )
        .expect("bucket list must not be empty")
        .install_recorder()
        .expect("Failed to install Prometheus recorder")
}

pub fn record_http_request(method: &str, endpoint: &str, status: u16, duration_secs: f64) {
    let status = status.to_string();
    counter!(
        names::HTTP_REQUESTS_TOTAL,
        labels::METHOD => method.to_string(),
        labels::ENDPOINT => endpoint.to_string(),
        labels::STATUS => status.clone()
    )
    .increment(1);

    histogram!(
        names::HTTP_REQUEST_DURATION_SECONDS,
        labels::METHOD => method.to_string(),
        labels::ENDPOINT => endpoint.to_string(),
        labels::STATUS => status
    )
    .record(duration_secs);
}

pub fn record_hold_created() {
    counter!(names::HOLDS_CREATED_TOTAL).increment(1);
}

pub fn record_hold_expired() {
    counter!(names::HOLDS_EXPIRED_TOTAL).increment(1);
}

pub fn record_order_created() {
    counter!(names::ORDERS_CREATED_TOTAL).increment(1);
}

/// `result` is the payment status applied or parked (`paid`/`failed`).
pub fn record_webhook_processed(result: &str) {
    counter!(
        names::WEBHOOKS_PROCESSED_TOTAL,
        labels::RESULT => result.to_string()
    )
    .increment(1);
}

pub fn record_webhook_replayed() {
    counter!(names::WEBHOOK_REPLAYS_TOTAL).increment(1);
}

pub fn record_stock_restoration() {
    counter!(names::STOCK_RESTORATIONS_TOTAL).increment(1);
}
