//! Metrics collection and exposition.
//!
//! # Metrics
//! - `envelope_sealed_total` (counter): envelopes produced
//! - `envelope_open_failures_total` (counter): by `kind` (malformed/stale/corrupt)
//! - `session_refresh_total` (counter): by `outcome`
//! - `session_forced_logout_total` (counter)
//! - `client_requests_total` (counter): by `status`
//! - `client_retries_total` (counter): by `reason`
//! - `gateway_requests_total` (counter): by `sealed` and `status`

use std::net::SocketAddr;

use metrics::counter;
use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_envelope_sealed() {
    counter!("envelope_sealed_total").increment(1);
}

pub fn record_envelope_failure(kind: &'static str) {
    counter!("envelope_open_failures_total", "kind" => kind).increment(1);
}

pub fn record_refresh(outcome: &'static str) {
    counter!("session_refresh_total", "outcome" => outcome).increment(1);
}

pub fn record_forced_logout() {
    counter!("session_forced_logout_total").increment(1);
}

pub fn record_request(status: u16) {
    counter!("client_requests_total", "status" => status.to_string()).increment(1);
}

pub fn record_retry(reason: &'static str) {
    counter!("client_retries_total", "reason" => reason).increment(1);
}

pub fn record_gateway_request(sealed: bool, status: u16) {
    counter!(
        "gateway_requests_total",
        "sealed" => if sealed { "true" } else { "false" },
        "status" => status.to_string()
    )
    .increment(1);
}
