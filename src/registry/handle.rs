//! Provider handle: capability plus its breaker, counters and health flag.
//!
//! # Responsibilities
//! - Serialize breaker and counter updates behind one lock per provider
//! - Expose the health flag lock-free (`AtomicU8`)
//! - Emit metrics and logs for every recorded outcome
//! - Feed every failure into the shared `ErrorTracker`

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::CircuitBreakerConfig;
use crate::health::state::ProviderStatus;
use crate::observability::errors::ErrorTracker;
use crate::observability::metrics;
use crate::providers::{AiProvider, ProviderError, ProviderType};
use crate::registry::performance::{PerformanceRecord, PerformanceSnapshot};
use crate::resilience::{CircuitBreaker, CircuitBreakerStatus, CircuitState};

struct ProviderState {
    breaker: CircuitBreaker,
    performance: PerformanceRecord,
}

/// Aggregate status of one provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSnapshot {
    pub provider: ProviderType,
    pub status: ProviderStatus,
    pub healthy: bool,
    pub circuit_breaker: CircuitBreakerStatus,
    pub performance: PerformanceSnapshot,
}

pub struct ProviderHandle {
    kind: ProviderType,
    provider: Arc<dyn AiProvider>,
    state: Mutex<ProviderState>,
    errors: Arc<ErrorTracker>,
    /// Current health state (0=Unknown, 1=Healthy, 2=Unhealthy).
    status: AtomicU8,
}

impl ProviderHandle {
    pub fn new(
        provider: Arc<dyn AiProvider>,
        breaker: &CircuitBreakerConfig,
        errors: Arc<ErrorTracker>,
    ) -> Self {
        let kind = provider.provider_type();
        metrics::set_circuit_state(kind, CircuitState::Closed);
        Self {
            kind,
            provider,
            state: Mutex::new(ProviderState {
                breaker: CircuitBreaker::new(kind, breaker),
                performance: PerformanceRecord::default(),
            }),
            errors,
            status: AtomicU8::new(ProviderStatus::Unknown as u8),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ProviderState> {
        self.state.lock().expect("provider state lock poisoned")
    }

    pub fn provider_type(&self) -> ProviderType {
        self.kind
    }

    pub fn capability(&self) -> Arc<dyn AiProvider> {
        Arc::clone(&self.provider)
    }

    // --- Health flag ---

    pub fn status(&self) -> ProviderStatus {
        ProviderStatus::from(self.status.load(Ordering::Relaxed))
    }

    /// True for Healthy and Unknown.
    pub fn is_healthy(&self) -> bool {
        self.status().is_healthy()
    }

    pub fn set_status(&self, status: ProviderStatus) {
        let previous = ProviderStatus::from(self.status.swap(status as u8, Ordering::Relaxed));
        if previous != status {
            if status.is_healthy() {
                tracing::info!(provider = %self.kind, from = %previous, to = %status, "Provider health changed");
            } else {
                tracing::warn!(provider = %self.kind, from = %previous, to = %status, "Provider health changed");
            }
        }
        metrics::record_provider_health(self.kind, status.is_healthy());
    }

    // --- Breaker and counters ---

    /// Consult the breaker; may move an expired open breaker to half-open.
    pub fn can_execute(&self) -> bool {
        self.lock().breaker.can_execute()
    }

    /// Healthy flag set and breaker admitting calls.
    pub fn is_available(&self) -> bool {
        self.is_healthy() && self.can_execute()
    }

    /// Same answer as `is_available` without touching the breaker, for status reads.
    pub fn is_ready(&self) -> bool {
        self.is_healthy() && self.lock().breaker.would_admit()
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.lock().breaker.state()
    }

    /// Count an attempt that is about to be made.
    pub fn begin_attempt(&self) {
        self.lock().performance.record_attempt();
    }

    pub fn record_success(&self, latency: Duration) {
        {
            let mut state = self.lock();
            state.breaker.record_success();
            state.performance.record_success(latency);
        }
        metrics::record_provider_request(self.kind, true, latency);
    }

    /// Record a failed attempt.
    ///
    /// Returns `Some(retry_after)` when the breaker is open afterwards.
    pub fn record_failure(&self, error: &ProviderError) -> Option<Duration> {
        let (open, retry_after, failures) = {
            let mut state = self.lock();
            state.breaker.record_failure();
            state.performance.record_failure();
            (
                state.breaker.state() == CircuitState::Open,
                state.breaker.retry_after(),
                state.breaker.failure_count(),
            )
        };

        tracing::warn!(provider = %self.kind, failures, error = %error, "Provider call failed");
        metrics::record_provider_request(self.kind, false, Duration::ZERO);
        self.errors
            .record_provider_error(self.kind, error.kind(), error.to_string());

        open.then_some(retry_after)
    }

    pub fn reset_breaker(&self) {
        self.lock().breaker.reset();
    }

    pub fn reset_performance(&self) {
        self.lock().performance.reset();
    }

    pub fn breaker_status(&self) -> CircuitBreakerStatus {
        self.lock().breaker.status()
    }

    pub fn performance(&self) -> PerformanceSnapshot {
        self.lock().performance.snapshot()
    }

    pub fn snapshot(&self) -> ProviderSnapshot {
        let status = self.status();
        let (circuit_breaker, performance) = {
            let state = self.lock();
            (state.breaker.status(), state.performance.snapshot())
        };
        ProviderSnapshot {
            provider: self.kind,
            status,
            healthy: status.is_healthy(),
            circuit_breaker,
            performance,
        }
    }
}

impl std::fmt::Debug for ProviderHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderHandle")
            .field("provider", &self.kind)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}
