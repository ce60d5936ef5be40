//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): inbound requests by endpoint, status
//! - `proxy_request_duration_seconds` (histogram): inbound latency
//! - `proxy_rate_limited_total` (counter): admission rejections
//! - `proxy_circuit_state` (gauge): 0=closed, 1=half_open, 2=open
//! - `proxy_circuit_transitions_total` (counter): breaker transitions by from, to
//! - `proxy_retries_total` (counter): retried attempts by error kind
//! - `proxy_queue_operations_total` (counter): enqueue/dequeue by result (ok, error, malformed)
//! - `proxy_consumer_outcomes_total` (counter): processed items by final status
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op, so library code and tests never need setup
//! - Prometheus exporter installed only by the binary when enabled

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(endpoint: &'static str, status: u16, start: Instant) {
    counter!("proxy_requests_total", "endpoint" => endpoint, "status" => status.to_string())
        .increment(1);
    histogram!("proxy_request_duration_seconds", "endpoint" => endpoint)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limited() {
    counter!("proxy_rate_limited_total").increment(1);
}

pub fn record_circuit_transition(from: &'static str, to: &'static str) {
    counter!("proxy_circuit_transitions_total", "from" => from, "to" => to).increment(1);
    let value = match to {
        "open" => 2.0,
        "half_open" => 1.0,
        _ => 0.0,
    };
    gauge!("proxy_circuit_state").set(value);
}

pub fn record_retry(kind: &'static str) {
    counter!("proxy_retries_total", "kind" => kind).increment(1);
}

/// `result` is one of `ok`, `error` or `malformed`.
pub fn record_queue_op(op: &'static str, result: &'static str) {
    counter!("proxy_queue_operations_total", "op" => op, "result" => result).increment(1);
}

pub fn record_consumer_outcome(status: &'static str) {
    counter!("proxy_consumer_outcomes_total", "status" => status).increment(1);
}
