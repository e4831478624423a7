//! Metrics collection and exposition.
//!
//! # Metrics
//! - `backend_circuit_state` (gauge): 0=closed, 1=half-open, 2=open, by dependency
//! - `backend_circuit_transitions_total` (counter): by dependency, from, to
//! - `backend_circuit_rejections_total` (counter): calls failed fast, by dependency
//! - `backend_retry_attempts_total` (counter): retries scheduled, by attempt
//! - `backend_retry_exhausted_total` (counter): operations that ran out of retries
//! - `backend_probe_duration_seconds` (histogram): probe round-trip, by dependency
//! - `backend_health` (gauge): 1=healthy, 0=unhealthy, by dependency
//!
//! Recording is a no-op until [`init_metrics`] installs a recorder.

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::resilience::circuit_breaker::CircuitState;

/// Install the Prometheus recorder and its scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), metrics_exporter_prometheus::BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_circuit_state(dependency: &str, state: CircuitState) {
    gauge!("backend_circuit_state", "dependency" => dependency.to_string()).set(state.as_gauge());
}

pub fn record_circuit_transition(dependency: &str, from: CircuitState, to: CircuitState) {
    counter!(
        "backend_circuit_transitions_total",
        "dependency" => dependency.to_string(),
        "from" => from.to_string(),
        "to" => to.to_string()
    )
    .increment(1);
}

pub fn record_circuit_rejection(dependency: &str) {
    counter!("backend_circuit_rejections_total", "dependency" => dependency.to_string()).increment(1);
}

pub fn record_retry(attempt: u32) {
    counter!("backend_retry_attempts_total", "attempt" => attempt.to_string()).increment(1);
}

pub fn record_retry_exhausted() {
    counter!("backend_retry_exhausted_total").increment(1);
}

pub fn record_probe(dependency: &str, healthy: bool, response_time: Duration) {
    histogram!("backend_probe_duration_seconds", "dependency" => dependency.to_string())
        .record(response_time.as_secs_f64());
    gauge!("backend_health", "dependency" => dependency.to_string()).set(if healthy { 1.0 } else { 0.0 });
}
