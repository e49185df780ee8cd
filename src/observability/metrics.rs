//! Metrics collection and exposition.
//!
//! # Metrics
//! - `wallet_http_requests_total` (counter): requests by method, route, status
//! - `wallet_http_request_duration_seconds` (histogram): latency by route
//! - `wallet_state_transitions_total` (counter): wallet transitions by from, to
//! - `wallet_node_dials_total` (counter): node dials by outcome
//! - `wallet_block_submissions_total` (counter): submissions by kind, outcome

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, route: &str, status: u16, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("route", route.to_string()),
        ("status", status.to_string()),
    ];
    ::metrics::counter!("wallet_http_requests_total", &labels).increment(1);
    ::metrics::histogram!("wallet_http_request_duration_seconds", "route" => route.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_state_transition(from: &str, to: &str) {
    ::metrics::counter!(
        "wallet_state_transitions_total",
        "from" => from.to_string(),
        "to" => to.to_string()
    )
    .increment(1);
}

pub fn record_node_dial(outcome: &'static str) {
    ::metrics::counter!("wallet_node_dials_total", "outcome" => outcome).increment(1);
}

pub fn record_submission(kind: &'static str, outcome: &'static str) {
    ::metrics::counter!(
        "wallet_block_submissions_total",
        "kind" => kind,
        "outcome" => outcome
    )
    .increment(1);
}
