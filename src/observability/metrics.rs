//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gate_requests_total` (counter): requests by route, status
//! - `gate_request_duration_seconds` (histogram): latency by route
//! - `gate_admissions_total` (counter): admission outcomes
//! - `gate_token_verifications_total` (counter): cache hits vs. hash checks
//! - `circuit_transitions_total` (counter): state changes by key
//! - `circuit_rejections_total` (counter): fast-failed calls by key
//!
//! Without an installed recorder every call here is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::resilience::circuit_breaker::CircuitState;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(route: &'static str, status: u16, start: Instant) {
    counter!("gate_requests_total", "route" => route, "status" => status.to_string())
        .increment(1);
    histogram!("gate_request_duration_seconds", "route" => route)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_admission(outcome: &'static str) {
    counter!("gate_admissions_total", "outcome" => outcome).increment(1);
}

pub fn record_token_verification(cached: bool) {
    let cached = if cached { "true" } else { "false" };
    counter!("gate_token_verifications_total", "cached" => cached).increment(1);
}

pub fn record_circuit_transition(key: &str, state: CircuitState) {
    counter!(
        "circuit_transitions_total",
        "key" => key.to_string(),
        "state" => state.as_str()
    )
    .increment(1);
}

pub fn record_circuit_rejection(key: &str) {
    counter!("circuit_rejections_total", "key" => key.to_string()).increment(1);
}
