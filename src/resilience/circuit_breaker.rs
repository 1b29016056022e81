//! Circuit breaker for provider protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: provider assumed down, calls fail fast
//! - Half-Open: probing whether the provider recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure_count >= failure_threshold
//! Open → Half-Open: first can_execute() after recovery_timeout
//! Half-Open → Closed: success_threshold successes
//! Half-Open → Open: any failure
//! ```
//!
//! # Design Decisions
//! - Per-provider circuit breaker (not global)
//! - Fail fast in Open state (no waiting for timeout)
//! - Plain `&mut self` state machine; the owner serializes access
//! - Uses tokio's clock so paused-time tests drive recovery

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::config::CircuitBreakerConfig;
use crate::observability::metrics;
use crate::providers::ProviderType;

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of a breaker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerStatus {
    pub provider: ProviderType,
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub recovery_timeout_secs: u64,
    /// Unix seconds of the most recent failure.
    pub last_failure_time: Option<f64>,
    /// Unix seconds at which an open breaker admits a probe.
    pub next_retry_time: Option<f64>,
    /// Seconds until the next probe; zero unless open and still cooling down.
    pub retry_after_secs: f64,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    provider: ProviderType,
    failure_threshold: u32,
    recovery_timeout: Duration,
    success_threshold: u32,

    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    last_failure: Option<Instant>,
    last_failure_wall: Option<SystemTime>,
}

impl CircuitBreaker {
    pub fn new(provider: ProviderType, config: &CircuitBreakerConfig) -> Self {
        Self {
            provider,
            failure_threshold: config.failure_threshold.max(1),
            recovery_timeout: config.recovery_timeout(),
            success_threshold: config.success_threshold.max(1),
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            last_failure: None,
            last_failure_wall: None,
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    pub fn success_count(&self) -> u32 {
        self.success_count
    }

    /// Whether a call may be attempted now.
    ///
    /// An open breaker whose recovery timeout has elapsed moves to half-open here.
    pub fn can_execute(&mut self) -> bool {
        match self.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                if self.cooldown_remaining().is_zero() {
                    self.success_count = 0;
                    self.transition(CircuitState::HalfOpen);
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Read-only form of `can_execute`: an expired open breaker reports true
    /// but stays open until a caller actually consults it.
    pub fn would_admit(&self) -> bool {
        match self.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => self.cooldown_remaining().is_zero(),
        }
    }

    pub fn record_success(&mut self) {
        match self.state {
            CircuitState::Closed => {
                self.failure_count = 0;
            }
            CircuitState::HalfOpen => {
                self.success_count += 1;
                if self.success_count >= self.success_threshold {
                    self.failure_count = 0;
                    self.success_count = 0;
                    self.transition(CircuitState::Closed);
                }
            }
            // A call admitted before the trip finished late; the open window stands.
            CircuitState::Open => {}
        }
    }

    pub fn record_failure(&mut self) {
        self.failure_count = self.failure_count.saturating_add(1);
        self.last_failure = Some(Instant::now());
        self.last_failure_wall = Some(SystemTime::now());

        match self.state {
            CircuitState::HalfOpen => self.transition(CircuitState::Open),
            CircuitState::Closed if self.failure_count >= self.failure_threshold => {
                self.transition(CircuitState::Open)
            }
            _ => {}
        }
    }

    /// Time until an open breaker admits a probe.
    pub fn retry_after(&self) -> Duration {
        if self.state == CircuitState::Open {
            self.cooldown_remaining()
        } else {
            Duration::ZERO
        }
    }

    /// Manual return to closed with cleared counters.
    pub fn reset(&mut self) {
        self.failure_count = 0;
        self.success_count = 0;
        self.last_failure = None;
        self.last_failure_wall = None;
        if self.state != CircuitState::Closed {
            self.transition(CircuitState::Closed);
        }
    }

    pub fn status(&self) -> CircuitBreakerStatus {
        let last_failure_time = self.last_failure_wall.map(unix_secs);
        let next_retry_time = self
            .last_failure_wall
            .map(|t| unix_secs(t + self.recovery_timeout));

        CircuitBreakerStatus {
            provider: self.provider,
            state: self.state,
            failure_count: self.failure_count,
            success_count: self.success_count,
            failure_threshold: self.failure_threshold,
            success_threshold: self.success_threshold,
            recovery_timeout_secs: self.recovery_timeout.as_secs(),
            last_failure_time,
            next_retry_time,
            retry_after_secs: self.retry_after().as_secs_f64(),
        }
    }

    fn cooldown_remaining(&self) -> Duration {
        match self.last_failure {
            Some(at) => self.recovery_timeout.saturating_sub(at.elapsed()),
            None => Duration::ZERO,
        }
    }

    fn transition(&mut self, to: CircuitState) {
        let from = self.state;
        self.state = to;

        match to {
            CircuitState::Open => tracing::warn!(
                provider = %self.provider,
                from = %from,
                failures = self.failure_count,
                recovery_timeout_secs = self.recovery_timeout.as_secs(),
                "Circuit breaker opened"
            ),
            _ => tracing::info!(
                provider = %self.provider,
                from = %from,
                to = %to,
                "Circuit breaker state changed"
            ),
        }
        metrics::record_circuit_transition(self.provider, to);
    }
}

fn unix_secs(t: SystemTime) -> f64 {
    t.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(failure_threshold: u32, recovery_secs: u64, success_threshold: u32) -> CircuitBreaker {
        CircuitBreaker::new(
            ProviderType::OpenAi,
            &CircuitBreakerConfig {
                failure_threshold,
                recovery_timeout_secs: recovery_secs,
                success_threshold,
            },
        )
    }

    #[test]
    fn test_stays_closed_below_threshold() {
        let mut cb = breaker(5, 60, 3);
        for _ in 0..4 {
            cb.record_failure();
            assert!(cb.can_execute());
        }
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.failure_count(), 4);
    }

    #[test]
    fn test_success_while_closed_clears_failures() {
        let mut cb = breaker(3, 60, 1);
        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        assert_eq!(cb.failure_count(), 0);
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_opens_at_threshold_and_recovers() {
        let mut cb = breaker(5, 60, 3);
        for _ in 0..5 {
            cb.record_failure();
        }
        assert_eq!(cb.state(), CircuitState::Open);
        assert_eq!(cb.state().to_string(), "open");
        assert!(!cb.can_execute());
        assert_eq!(cb.retry_after(), Duration::from_secs(60));

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(!cb.can_execute());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cb.can_execute());
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert_eq!(cb.success_count(), 0);
        assert_eq!(cb.retry_after(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_failure_reopens() {
        let mut cb = breaker(2, 10, 3);
        cb.record_failure();
        cb.record_failure();
        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(cb.can_execute());

        cb.record_success();
        cb.record_success();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.can_execute());
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_successes_close() {
        let mut cb = breaker(1, 5, 3);
        cb.record_failure();
        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(cb.can_execute());

        cb.record_success();
        cb.record_success();
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        cb.record_success();

        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.failure_count(), 0);
        assert_eq!(cb.success_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_would_admit_leaves_state_alone() {
        let mut cb = breaker(1, 30, 1);
        cb.record_failure();
        assert!(!cb.would_admit());

        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(cb.would_admit());
        assert!(cb.would_admit());
        assert_eq!(cb.state(), CircuitState::Open);

        assert!(cb.can_execute());
        assert_eq!(cb.state(), CircuitState::HalfOpen);
    }

    #[test]
    fn test_reset_and_status() {
        let mut cb = breaker(1, 60, 1);
        cb.record_failure();

        let status = cb.status();
        assert_eq!(status.state, CircuitState::Open);
        let last = status.last_failure_time.unwrap();
        assert_eq!(status.next_retry_time.unwrap(), last + 60.0);
        assert!(status.retry_after_secs > 59.0);

        cb.reset();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.can_execute());
        assert!(cb.status().last_failure_time.is_none());
    }

    #[test]
    fn test_state_names() {
        assert_eq!(CircuitState::HalfOpen.to_string(), "half_open");
        assert_eq!(serde_json::to_string(&CircuitState::HalfOpen).unwrap(), "\"half_open\"");
    }
}
