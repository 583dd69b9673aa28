//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define resilience metrics (attempts, outcomes, limiter decisions, connectivity)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `netguard_retry_attempts_total` (counter): operation invocations
//! - `netguard_retry_outcomes_total` (counter): terminal outcomes by `outcome`
//! - `netguard_rate_limit_decisions_total` (counter): admissions by `decision`
//! - `netguard_connectivity_status` (gauge): 0=unknown, 1=disconnected, 2=slow, 3=connected
//! - `netguard_probe_latency_seconds` (histogram): successful probe latency
//! - `netguard_probe_failures_total` (counter): failed or timed-out probes
//!
//! # Design Decisions
//! - Recording without an installed exporter is a no-op
//! - Labels are low-cardinality; limiter keys are never used as labels

use std::net::SocketAddr;
use std::time::Duration;
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::network::state::ConnectivityState;

/// Install the Prometheus exporter with an HTTP listener on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_retry_attempt() {
    ::metrics::counter!("netguard_retry_attempts_total").increment(1);
}

pub fn record_retry_outcome(outcome: &'static str) {
    ::metrics::counter!("netguard_retry_outcomes_total", "outcome" => outcome).increment(1);
}

pub fn record_rate_limit_decision(allowed: bool) {
    let decision = if allowed { "allowed" } else { "denied" };
    ::metrics::counter!("netguard_rate_limit_decisions_total", "decision" => decision).increment(1);
}

pub fn record_connectivity(status: ConnectivityState) {
    let value = match status {
        ConnectivityState::Unknown => 0.0,
        ConnectivityState::Disconnected => 1.0,
        ConnectivityState::Slow => 2.0,
        ConnectivityState::Connected => 3.0,
    };
    ::metrics::gauge!("netguard_connectivity_status").set(value);
}

pub fn record_probe_latency(latency: Duration) {
    ::metrics::histogram!("netguard_probe_latency_seconds").record(latency.as_secs_f64());
}

pub fn record_probe_failure() {
    ::metrics::counter!("netguard_probe_failures_total").increment(1);
}
