//! Error accounting for the admin dashboard.
//!
//! # Responsibilities
//! - Count errors by type and by provider
//! - Keep a bounded history of recent errors, newest last
//! - Turn counts plus provider snapshots into an analysis with recommended actions
//!
//! # Design Decisions
//! - Counters are `DashMap`s so provider attempts never contend on one lock
//! - History is a ring buffer behind a mutex that is never held across an await
//! - Provider attempt errors and whole-call errors are kept apart by `ErrorScope`

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::providers::ProviderType;
use crate::registry::ProviderSnapshot;
use crate::resilience::CircuitState;

/// Recent errors retained for the dashboard.
pub const DEFAULT_HISTORY: usize = 100;

/// Where an error was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorScope {
    /// One attempt against one provider, including failed health checks.
    Provider,
    /// An orchestrated call that returned an error to its caller.
    Call,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEvent {
    /// Unix seconds.
    pub timestamp: f64,
    pub scope: ErrorScope,
    pub error_type: String,
    pub provider: Option<ProviderType>,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderErrorSummary {
    pub total: u64,
    pub by_type: BTreeMap<String, u64>,
    pub last_error: Option<String>,
    /// Unix seconds.
    pub last_error_time: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorOverview {
    pub total_errors: u64,
    pub provider_errors: u64,
    pub call_errors: u64,
    pub error_rate_per_hour: f64,
    /// Unix seconds of the last clear, or of startup.
    pub tracking_since: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDashboard {
    pub overview: ErrorOverview,
    pub error_breakdown: BTreeMap<String, u64>,
    pub provider_errors: BTreeMap<ProviderType, ProviderErrorSummary>,
    /// Newest first.
    pub recent_errors: Vec<ErrorEvent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reliability {
    Good,
    Fair,
    Poor,
    /// No finished attempts yet.
    Unknown,
}

impl Reliability {
    fn grade(snapshot: &ProviderSnapshot) -> Self {
        let perf = &snapshot.performance;
        if perf.successful_requests + perf.failed_requests == 0 {
            Reliability::Unknown
        } else if perf.success_rate >= 0.95 {
            Reliability::Good
        } else if perf.success_rate >= 0.8 {
            Reliability::Fair
        } else {
            Reliability::Poor
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderReliability {
    pub provider: ProviderType,
    pub reliability: Reliability,
    pub success_rate: f64,
    pub total_requests: u64,
    pub failed_requests: u64,
    pub errors: u64,
    pub circuit_state: CircuitState,
    pub healthy: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorCount {
    pub error_type: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorAnalysis {
    pub total_errors: u64,
    pub most_common_error: Option<ErrorCount>,
    pub provider_reliability: Vec<ProviderReliability>,
    pub recommendations: Vec<String>,
}

struct History {
    since: Instant,
    since_wall: SystemTime,
    events: VecDeque<ErrorEvent>,
}

pub struct ErrorTracker {
    by_type: DashMap<&'static str, u64>,
    by_scope: DashMap<ErrorScope, u64>,
    by_provider: DashMap<ProviderType, ProviderErrorSummary>,
    history: Mutex<History>,
    capacity: usize,
}

impl Default for ErrorTracker {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_HISTORY)
    }
}

impl ErrorTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            by_type: DashMap::new(),
            by_scope: DashMap::new(),
            by_provider: DashMap::new(),
            history: Mutex::new(History {
                since: Instant::now(),
                since_wall: SystemTime::now(),
                events: VecDeque::with_capacity(capacity.min(DEFAULT_HISTORY)),
            }),
            capacity: capacity.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, History> {
        self.history.lock().expect("error history lock poisoned")
    }

    /// A failed attempt against `provider`.
    pub fn record_provider_error(&self, provider: ProviderType, error_type: &'static str, message: String) {
        let now = SystemTime::now();
        self.by_provider
            .entry(provider)
            .and_modify(|s| {
                s.total += 1;
                *s.by_type.entry(error_type.to_string()).or_default() += 1;
                s.last_error = Some(message.clone());
                s.last_error_time = Some(unix_secs(now));
            })
            .or_insert_with(|| ProviderErrorSummary {
                total: 1,
                by_type: BTreeMap::from([(error_type.to_string(), 1)]),
                last_error: Some(message.clone()),
                last_error_time: Some(unix_secs(now)),
            });
        self.record(ErrorScope::Provider, error_type, Some(provider), message, now);
    }

    /// An orchestrated call that failed; `provider` is set when the error names one.
    pub fn record_call_error(&self, error_type: &'static str, provider: Option<ProviderType>, message: String) {
        self.record(ErrorScope::Call, error_type, provider, message, SystemTime::now());
    }

    fn record(
        &self,
        scope: ErrorScope,
        error_type: &'static str,
        provider: Option<ProviderType>,
        message: String,
        at: SystemTime,
    ) {
        *self.by_type.entry(error_type).or_default() += 1;
        *self.by_scope.entry(scope).or_default() += 1;

        let mut history = self.lock();
        if history.events.len() >= self.capacity {
            history.events.pop_front();
        }
        history.events.push_back(ErrorEvent {
            timestamp: unix_secs(at),
            scope,
            error_type: error_type.to_string(),
            provider,
            message,
        });
    }

    pub fn total_errors(&self) -> u64 {
        self.by_scope.iter().map(|e| *e.value()).sum()
    }

    pub fn count(&self, error_type: &str) -> u64 {
        self.by_type.get(error_type).map_or(0, |c| *c)
    }

    /// Drop every counter and the history; the rate window restarts now.
    pub fn clear(&self) {
        self.by_type.clear();
        self.by_scope.clear();
        self.by_provider.clear();
        let mut history = self.lock();
        history.events.clear();
        history.since = Instant::now();
        history.since_wall = SystemTime::now();
        tracing::info!("Error metrics cleared");
    }

    pub fn dashboard(&self) -> ErrorDashboard {
        let (recent_errors, elapsed, since_wall) = {
            let history = self.lock();
            (
                history.events.iter().rev().cloned().collect(),
                history.since.elapsed(),
                history.since_wall,
            )
        };
        let total_errors = self.total_errors();
        // Under a minute of tracking the rate is extrapolated from one minute.
        let hours = elapsed.as_secs_f64().max(60.0) / 3600.0;

        ErrorDashboard {
            overview: ErrorOverview {
                total_errors,
                provider_errors: self.scope_count(ErrorScope::Provider),
                call_errors: self.scope_count(ErrorScope::Call),
                error_rate_per_hour: total_errors as f64 / hours,
                tracking_since: unix_secs(since_wall),
            },
            error_breakdown: self
                .by_type
                .iter()
                .map(|e| (e.key().to_string(), *e.value()))
                .collect(),
            provider_errors: self
                .by_provider
                .iter()
                .map(|e| (*e.key(), e.value().clone()))
                .collect(),
            recent_errors,
        }
    }

    /// Reliability per provider and the actions an operator should consider.
    pub fn analysis(&self, providers: &[ProviderSnapshot]) -> ErrorAnalysis {
        let most_common_error = self
            .by_type
            .iter()
            .map(|e| ErrorCount {
                error_type: e.key().to_string(),
                count: *e.value(),
            })
            .max_by(|a, b| a.count.cmp(&b.count).then_with(|| b.error_type.cmp(&a.error_type)));

        let provider_reliability: Vec<ProviderReliability> = providers
            .iter()
            .map(|snap| ProviderReliability {
                provider: snap.provider,
                reliability: Reliability::grade(snap),
                success_rate: snap.performance.success_rate,
                total_requests: snap.performance.total_requests,
                failed_requests: snap.performance.failed_requests,
                errors: self.by_provider.get(&snap.provider).map_or(0, |s| s.total),
                circuit_state: snap.circuit_breaker.state,
                healthy: snap.healthy,
            })
            .collect();

        let recommendations = self.recommendations(&provider_reliability);

        ErrorAnalysis {
            total_errors: self.total_errors(),
            most_common_error,
            provider_reliability,
            recommendations,
        }
    }

    fn recommendations(&self, providers: &[ProviderReliability]) -> Vec<String> {
        let mut out = Vec::new();

        for p in providers {
            if p.circuit_state == CircuitState::Open {
                out.push(format!(
                    "Circuit breaker for {} is open; confirm the backend is reachable before resetting it",
                    p.provider
                ));
            }
            if p.reliability == Reliability::Poor {
                out.push(format!(
                    "{} succeeds on {:.0}% of attempts; consider moving it down the service priority",
                    p.provider,
                    p.success_rate * 100.0
                ));
            }
            if !p.healthy {
                out.push(format!("{} is failing health checks", p.provider));
            }
        }

        if self.count("timeout") >= 3 {
            out.push("Provider calls time out repeatedly; review timeouts.provider_call_secs".to_string());
        }
        if self.count("status") >= 3 {
            out.push("Backends keep answering with error statuses; check API keys, quotas and model names".to_string());
        }
        if self.count("all_failed") + self.count("degradation_failed") > 0 {
            out.push("Calls failed with no provider left to serve them; configure a fallback provider".to_string());
        }
        if self.count("circuit_open") > 0 && providers.iter().all(|p| p.circuit_state == CircuitState::Open) {
            out.push("Every circuit breaker is open; the service cannot answer until one recovers".to_string());
        }
        out
    }

    fn scope_count(&self, scope: ErrorScope) -> u64 {
        self.by_scope.get(&scope).map_or(0, |c| *c)
    }
}

impl std::fmt::Debug for ErrorTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorTracker")
            .field("total_errors", &self.total_errors())
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
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

    #[test]
    fn test_counts_by_type_and_provider() {
        let tracker = ErrorTracker::new();
        tracker.record_provider_error(ProviderType::OpenAi, "status", "HTTP 503: overloaded".into());
        tracker.record_provider_error(ProviderType::OpenAi, "timeout", "timed out after 30s".into());
        tracker.record_provider_error(ProviderType::Ollama, "transport", "connection refused".into());
        tracker.record_call_error("all_failed", None, "all AI services failed".into());

        let dashboard = tracker.dashboard();
        assert_eq!(dashboard.overview.total_errors, 4);
        assert_eq!(dashboard.overview.provider_errors, 3);
        assert_eq!(dashboard.overview.call_errors, 1);
        assert_eq!(dashboard.error_breakdown["status"], 1);
        assert_eq!(dashboard.error_breakdown["all_failed"], 1);

        let openai = &dashboard.provider_errors[&ProviderType::OpenAi];
        assert_eq!(openai.total, 2);
        assert_eq!(openai.by_type["timeout"], 1);
        assert_eq!(openai.last_error.as_deref(), Some("timed out after 30s"));

        assert_eq!(dashboard.recent_errors[0].scope, ErrorScope::Call);
        assert_eq!(dashboard.recent_errors[3].message, "HTTP 503: overloaded");
    }

    #[test]
    fn test_history_is_bounded() {
        let tracker = ErrorTracker::with_capacity(2);
        for i in 0..5 {
            tracker.record_provider_error(ProviderType::Ollama, "transport", format!("attempt {}", i));
        }

        let dashboard = tracker.dashboard();
        assert_eq!(dashboard.overview.total_errors, 5);
        let messages: Vec<_> = dashboard.recent_errors.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["attempt 4", "attempt 3"]);
    }

    #[test]
    fn test_clear_resets_everything() {
        let tracker = ErrorTracker::new();
        tracker.record_provider_error(ProviderType::OpenAi, "status", "HTTP 500".into());
        tracker.clear();

        let dashboard = tracker.dashboard();
        assert_eq!(dashboard.overview.total_errors, 0);
        assert!(dashboard.error_breakdown.is_empty());
        assert!(dashboard.provider_errors.is_empty());
        assert!(dashboard.recent_errors.is_empty());
        assert_eq!(dashboard.overview.error_rate_per_hour, 0.0);
    }

    #[test]
    fn test_analysis_without_providers() {
        let tracker = ErrorTracker::new();
        for _ in 0..3 {
            tracker.record_provider_error(ProviderType::OpenAi, "timeout", "timed out".into());
        }
        tracker.record_provider_error(ProviderType::OpenAi, "status", "HTTP 500".into());

        let analysis = tracker.analysis(&[]);
        assert_eq!(analysis.total_errors, 4);
        assert_eq!(
            analysis.most_common_error,
            Some(ErrorCount { error_type: "timeout".into(), count: 3 })
        );
        assert!(analysis.recommendations.iter().any(|r| r.contains("provider_call_secs")));
        assert!(!analysis.recommendations.iter().any(|r| r.contains("fallback")));
    }
}
