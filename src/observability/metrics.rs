//! Metrics collection and exposition.
//!
//! # Metrics
//! - `guard_calls_total` (counter): guarded calls by circuit and outcome
//! - `guard_attempts_total` (counter): operation invocations by circuit
//! - `guard_circuit_transitions_total` (counter): state changes by circuit, from, to
//! - `guard_circuit_state` (gauge): 0=closed, 1=half-open, 2=open
//! - `guard_probe_duration_seconds` (histogram): monitor probe latency

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Instant;

use crate::resilience::circuit_breaker::CircuitStatus;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_call(circuit: &str, outcome: &'static str) {
    counter!(
        "guard_calls_total",
        "circuit" => circuit.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_attempt(circuit: &str) {
    counter!("guard_attempts_total", "circuit" => circuit.to_string()).increment(1);
}

pub fn record_transition(circuit: &str, from: CircuitStatus, to: CircuitStatus) {
    counter!(
        "guard_circuit_transitions_total",
        "circuit" => circuit.to_string(),
        "from" => from.as_str(),
        "to" => to.as_str()
    )
    .increment(1);
}

pub fn record_circuit_state(circuit: &str, status: CircuitStatus) {
    gauge!("guard_circuit_state", "circuit" => circuit.to_string()).set(status.gauge_value());
}

pub fn record_probe(circuit: &str, healthy: bool, start: Instant) {
    histogram!(
        "guard_probe_duration_seconds",
        "circuit" => circuit.to_string(),
        "healthy" => if healthy { "true" } else { "false" }
    )
    .record(start.elapsed().as_secs_f64());
}
