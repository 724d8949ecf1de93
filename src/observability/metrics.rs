//! Metrics collection and exposition.
//!
//! # Metrics
//! - `resilience_calls_total` (counter): calls by endpoint, outcome
//! - `resilience_retries_total` (counter): backoff waits by endpoint
//! - `resilience_circuit_transitions_total` (counter): by endpoint, target state
//! - `resilience_circuit_state` (gauge): 0=closed, 1=half-open, 2=open
//! - `resilience_telemetry_dropped_total` (counter): records lost to a full queue
//! - `resilience_telemetry_flushed_total` (counter): records exported
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - Prometheus exposition is opt-in via config

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::resilience::circuit_breaker::CircuitState;

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_call(endpoint: &str, outcome: &'static str) {
    counter!("resilience_calls_total", "endpoint" => endpoint.to_string(), "outcome" => outcome)
        .increment(1);
}

pub fn record_retry(endpoint: &str) {
    counter!("resilience_retries_total", "endpoint" => endpoint.to_string()).increment(1);
}

pub fn record_transition(endpoint: &str, to: CircuitState) {
    counter!(
        "resilience_circuit_transitions_total",
        "endpoint" => endpoint.to_string(),
        "to" => to.as_str()
    )
    .increment(1);
    gauge!("resilience_circuit_state", "endpoint" => endpoint.to_string())
        .set(state_value(to));
}

pub fn record_telemetry_dropped(count: u64) {
    counter!("resilience_telemetry_dropped_total").increment(count);
}

pub fn record_telemetry_flushed(count: usize) {
    counter!("resilience_telemetry_flushed_total").increment(count as u64);
}

fn state_value(state: CircuitState) -> f64 {
    match state {
        CircuitState::Closed => 0.0,
        CircuitState::HalfOpen => 1.0,
        CircuitState::Open => 2.0,
    }
}
