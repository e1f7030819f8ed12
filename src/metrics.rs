//! Prometheus metrics: HTTP request counts/latency plus order lifecycle
//! counters.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

pub mod names {
    pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "http_requests_in_flight";

    pub const ORDERS_CREATED_TOTAL: &str = "orders_created_total";
    pub const ORDERS_REJECTED_TOTAL: &str = "orders_rejected_total";
    pub const ORDERS_CANCELLED_TOTAL: &str = "orders_cancelled_total";
    pub const ORDER_TRANSITIONS_TOTAL: &str = "order_transitions_total";
    pub const SETTLEMENTS_PROCESSED_TOTAL: &str = "settlements_processed_total";
    pub const SETTLEMENT_JOBS_PENDING: &str = "settlement_jobs_pending";
}

mod labels {
    pub const METHOD: &str = "method";
    pub const ENDPOINT: &str = "endpoint";
    pub const STATUS: &str = "status";
    pub const SIDE: &str = "side";
    pub const FROM: &str = "from";
    pub const TO: &str = "to";
}

pub fn init_metrics() -> PrometheusHandle {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(names::HTTP_REQUEST_DURATION_SECONDS.to_string()),
            &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0],
        )
        .expect("valid bucket spec")
        .install_recorder()
        .expect("failed to install prometheus recorder")
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

pub fn adjust_http_requests_in_flight(delta: i64) {
    let g = gauge!(names::HTTP_REQUESTS_IN_FLIGHT);
    if delta >= 0 {
        g.increment(delta as f64);
    } else {
        g.decrement((-delta) as f64);
    }
}

pub fn record_order_created(side: &str) {
    counter!(names::ORDERS_CREATED_TOTAL, labels::SIDE => side.to_string()).increment(1);
}

pub fn record_order_rejected() {
    counter!(names::ORDERS_REJECTED_TOTAL).increment(1);
}

pub fn record_order_cancelled() {
    counter!(names::ORDERS_CANCELLED_TOTAL).increment(1);
}

pub fn record_transition(from: &str, to: &str) {
    counter!(
        names::ORDER_TRANSITIONS_TOTAL,
        labels::FROM => from.to_string(),
        labels::TO => to.to_string()
    )
    .increment(1);
}

pub fn record_settlement_processed() {
    counter!(names::SETTLEMENTS_PROCESSED_TOTAL).increment(1);
}

pub fn set_settlement_jobs_pending(count: i64) {
    gauge!(names::SETTLEMENT_JOBS_PENDING).set(count as f64);
}
