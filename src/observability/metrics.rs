//! Metrics collection and exposition.
//!
//! # Metrics
//! - `orchestrator_provider_requests_total` (counter): provider invocations by provider, status
//! - `orchestrator_provider_latency_seconds` (histogram): latency of successful invocations
//! - `orchestrator_circuit_state` (gauge): 0=closed, 0.5=half-open, 1=open
//! - `orchestrator_circuit_transitions_total` (counter): breaker transitions by target state
//! - `orchestrator_provider_health` (gauge): 1=healthy, 0=unhealthy
//! - `orchestrator_calls_total` (counter): orchestration results by outcome
//! - `orchestrator_degradations_total` (counter): degraded successes by fallback provider
//!
//! # Design Decisions
//! - `metrics` facade; recording is a no-op until a recorder is installed
//! - Prometheus exporter serves its own HTTP listener

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::providers::ProviderType;
use crate::resilience::CircuitState;

/// Install the Prometheus recorder and its scrape listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// One provider invocation, successful or not.
pub fn record_provider_request(provider: ProviderType, success: bool, latency: Duration) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "orchestrator_provider_requests_total",
        "provider" => provider.as_str(),
        "status" => status
    )
    .increment(1);
    if success {
        histogram!("orchestrator_provider_latency_seconds", "provider" => provider.as_str())
            .record(latency.as_secs_f64());
    }
}

pub fn record_circuit_transition(provider: ProviderType, state: CircuitState) {
    counter!(
        "orchestrator_circuit_transitions_total",
        "provider" => provider.as_str(),
        "state" => state.as_str()
    )
    .increment(1);
    set_circuit_state(provider, state);
}

pub fn set_circuit_state(provider: ProviderType, state: CircuitState) {
    let value = match state {
        CircuitState::Closed => 0.0,
        CircuitState::HalfOpen => 0.5,
        CircuitState::Open => 1.0,
    };
    gauge!("orchestrator_circuit_state", "provider" => provider.as_str()).set(value);
}

pub fn record_provider_health(provider: ProviderType, healthy: bool) {
    gauge!("orchestrator_provider_health", "provider" => provider.as_str())
        .set(if healthy { 1.0 } else { 0.0 });
}

/// Final result of one orchestration call ("success", "degraded", "circuit_open", ...).
pub fn record_call(outcome: &'static str) {
    counter!("orchestrator_calls_total", "outcome" => outcome).increment(1);
}

pub fn record_degradation(fallback: ProviderType) {
    counter!("orchestrator_degradations_total", "fallback" => fallback.as_str()).increment(1);
}
