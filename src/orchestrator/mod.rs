//! Request orchestration.
//!
//! # Data Flow
//! ```text
//! caller → Orchestrator::execute(operation, filter)
//!     → routing snapshot (priority, fallback order, degradation switch)
//!     → for each round (RetryPolicy::max_attempts):
//!         available = priority ∩ configured ∩ healthy ∩ breaker-admits ∩ filter
//!         empty → degradation.rs
//!         try each provider not yet tried this round (call timeout, breaker + counters)
//!             success → Outcome::Success
//!             breaker trips → OrchestratorError::CircuitOpen
//!         sleep RetryPolicy::delay(round)
//!     → exhausted → degradation fallback chain → Outcome::Degraded or error
//! ```
//!
//! # Design Decisions
//! - Every round starts fresh: a provider that failed in round N is tried again in N+1
//! - Degradation skips every provider attempted in any round of the call
//! - A breaker tripping mid-call fails the call fast; degradation is not attempted
//! - Fallbacks skip providers already attempted and providers whose breaker refuses,
//!   but ignore the health flag (last resort)
//! - Per-provider state is updated through `ProviderHandle`; no lock spans an await
//! - Status reads (`status`, `preferred_provider`, `list_models`) never move a breaker

pub mod degradation;
pub mod error;
pub mod outcome;
pub mod routing;

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::Instrument;

use crate::config::{HealthCheckConfig, OrchestratorConfig};
use crate::health::{check_provider, HealthMonitor, HealthMonitorHandle};
use crate::observability::errors::{ErrorAnalysis, ErrorDashboard, ErrorTracker};
use crate::observability::metrics;
use crate::observability::tracing::call_span;
use crate::providers::{
    AiProvider, ChatMessage, ChatOptions, ChatResponse, ChatStream, HealthReport, ModelInfo,
    ProviderError, ProviderResult, ProviderType,
};
use crate::registry::{ProviderHandle, ProviderRegistry, ProviderSnapshot};
use crate::resilience::{call_with_timeout, RetryPolicy};

pub use degradation::{DegradationEntry, DegradationReport, DegradationTracker, OverallStatus};
pub use error::OrchestratorError;
pub use outcome::Outcome;
pub use routing::RoutingPolicy;

/// Result of an orchestrated call.
pub type OrchestratorResult<T> = Result<Outcome<T>, OrchestratorError>;

/// Aggregate status of the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorStatus {
    pub providers: Vec<ProviderSnapshot>,
    pub routing: RoutingPolicy,
    pub preferred_provider: Option<ProviderType>,
    pub health_monitoring_enabled: bool,
}

struct AttemptFailure {
    error: ProviderError,
    /// Set when this failure left the breaker open.
    tripped: Option<Duration>,
}

pub struct Orchestrator {
    registry: Arc<ProviderRegistry>,
    degradation: Arc<DegradationTracker>,
    routing: ArcSwap<RoutingPolicy>,
    retry: RetryPolicy,
    call_timeout: Duration,
    health: HealthCheckConfig,
}

impl Orchestrator {
    pub fn new(providers: Vec<Arc<dyn AiProvider>>, config: &OrchestratorConfig) -> Self {
        let registry = Arc::new(ProviderRegistry::new(providers, &config.circuit_breaker));
        let routing = RoutingPolicy::from_config(config);

        for provider in &routing.service_priority {
            if !registry.is_configured(*provider) {
                tracing::warn!(provider = %provider, "Provider in service_priority is not configured");
            }
        }

        Self {
            registry,
            degradation: Arc::new(DegradationTracker::new()),
            routing: ArcSwap::from_pointee(routing),
            retry: RetryPolicy::from_config(&config.retry),
            call_timeout: config.timeouts.provider_call(),
            health: config.health_check.clone(),
        }
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    pub fn degradation_tracker(&self) -> &Arc<DegradationTracker> {
        &self.degradation
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    // --- Execution ---

    /// Run `operation` against the best available provider with retry, failover and degradation.
    ///
    /// `filter`, when given, restricts every phase to the listed provider types.
    pub async fn execute<T, F, Fut>(
        &self,
        operation: F,
        filter: Option<&[ProviderType]>,
    ) -> OrchestratorResult<T>
    where
        F: Fn(Arc<dyn AiProvider>) -> Fut,
        Fut: Future<Output = ProviderResult<T>>,
    {
        self.run("execute", operation, filter).await
    }

    pub async fn embed(&self, text: &str, model: Option<&str>) -> OrchestratorResult<Vec<f32>> {
        self.run(
            "embed",
            move |p: Arc<dyn AiProvider>| async move { p.embed(text, model).await },
            None,
        )
        .await
    }

    pub async fn embed_many(
        &self,
        texts: &[String],
        model: Option<&str>,
    ) -> OrchestratorResult<Vec<Vec<f32>>> {
        self.run(
            "embed_many",
            move |p: Arc<dyn AiProvider>| async move { p.embed_many(texts, model).await },
            None,
        )
        .await
    }

    pub async fn chat(
        &self,
        messages: &[ChatMessage],
        model: Option<&str>,
        options: &ChatOptions,
    ) -> OrchestratorResult<ChatResponse> {
        self.run(
            "chat",
            move |p: Arc<dyn AiProvider>| async move { p.chat(messages, model, options).await },
            None,
        )
        .await
    }

    /// Failover covers opening the stream; fragments are consumed lazily by the caller.
    pub async fn chat_stream(
        &self,
        messages: &[ChatMessage],
        model: Option<&str>,
        options: &ChatOptions,
    ) -> OrchestratorResult<ChatStream> {
        self.run(
            "chat_stream",
            move |p: Arc<dyn AiProvider>| async move { p.chat_stream(messages, model, options).await },
            None,
        )
        .await
    }

    async fn run<T, F, Fut>(
        &self,
        name: &'static str,
        operation: F,
        filter: Option<&[ProviderType]>,
    ) -> OrchestratorResult<T>
    where
        F: Fn(Arc<dyn AiProvider>) -> Fut,
        Fut: Future<Output = ProviderResult<T>>,
    {
        let span = call_span(name);
        let result = self
            .execute_inner(&operation, filter)
            .instrument(span.clone())
            .await;

        span.in_scope(|| match &result {
            Ok(outcome) if !outcome.is_degraded() => {
                tracing::debug!(provider = %outcome.served_by(), "Call succeeded");
                metrics::record_call("success");
            }
            Ok(outcome) => {
                tracing::warn!(fallback = %outcome.served_by(), "Call served in degraded mode");
                metrics::record_call("degraded");
            }
            Err(e) => {
                tracing::error!(error = %e, "Call failed");
                metrics::record_call(e.kind());
                self.errors().record_call_error(e.kind(), e.provider(), e.to_string());
            }
        });
        result
    }

    async fn execute_inner<T, F, Fut>(
        &self,
        operation: &F,
        filter: Option<&[ProviderType]>,
    ) -> OrchestratorResult<T>
    where
        F: Fn(Arc<dyn AiProvider>) -> Fut,
        Fut: Future<Output = ProviderResult<T>>,
    {
        let policy = self.routing.load_full();
        // Every provider attempted in any round; degradation skips these.
        let mut attempted: Vec<ProviderType> = Vec::new();
        let mut last_error: Option<ProviderError> = None;

        for attempt in 0..self.retry.max_attempts {
            let available = self.available_providers(&policy.service_priority, filter);
            if available.is_empty() {
                tracing::warn!(attempt, "No providers available");
                return self
                    .degrade(&policy, operation, filter, &attempted, last_error, attempt)
                    .await;
            }

            let mut tried_this_round: Vec<ProviderType> = Vec::with_capacity(available.len());
            for handle in available {
                let provider = handle.provider_type();
                if tried_this_round.contains(&provider) {
                    continue;
                }
                tried_this_round.push(provider);
                if !attempted.contains(&provider) {
                    attempted.push(provider);
                }

                match self.invoke(&handle, operation).await {
                    Ok(value) => return Ok(Outcome::Success { value, provider }),
                    Err(failure) => {
                        if let Some(retry_after) = failure.tripped {
                            return Err(OrchestratorError::CircuitOpen {
                                provider,
                                retry_after,
                            });
                        }
                        last_error = Some(failure.error);
                    }
                }
            }

            if attempt + 1 < self.retry.max_attempts {
                let delay = self.retry.delay(attempt);
                tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, "Backing off before next round");
                tokio::time::sleep(delay).await;
            }
        }

        self.degrade(&policy, operation, filter, &attempted, last_error, self.retry.max_attempts)
            .await
    }

    async fn degrade<T, F, Fut>(
        &self,
        policy: &RoutingPolicy,
        operation: &F,
        filter: Option<&[ProviderType]>,
        attempted: &[ProviderType],
        last_error: Option<ProviderError>,
        attempts: u32,
    ) -> OrchestratorResult<T>
    where
        F: Fn(Arc<dyn AiProvider>) -> Fut,
        Fut: Future<Output = ProviderResult<T>>,
    {
        if !policy.degradation_enabled {
            return Err(match last_error {
                Some(last_error) => OrchestratorError::AllProvidersFailed {
                    attempts,
                    last_error,
                },
                None => OrchestratorError::NoProvidersAvailable,
            });
        }

        let original = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no providers available".to_string());
        tracing::warn!(original_error = %original, attempted = ?attempted, "Entering service degradation");
        for provider in attempted {
            self.degradation.mark(*provider, &original);
        }

        let mut fallback_error = None;
        for &provider in &policy.fallback_order {
            if attempted.contains(&provider) || !permitted(filter, provider) {
                continue;
            }
            let Some(handle) = self.registry.get(provider) else {
                continue;
            };
            if !handle.can_execute() {
                tracing::debug!(provider = %provider, "Fallback skipped, circuit open");
                continue;
            }

            match self.invoke(&handle, operation).await {
                Ok(value) => {
                    metrics::record_degradation(provider);
                    return Ok(Outcome::Degraded {
                        value,
                        fallback: provider,
                        original_error: original,
                    });
                }
                Err(failure) => fallback_error = Some(failure.error),
            }
        }

        Err(OrchestratorError::DegradationFailed {
            original,
            last_error: fallback_error,
        })
    }

    /// One attempt against one provider, recorded on its breaker and counters.
    async fn invoke<T, F, Fut>(&self, handle: &ProviderHandle, operation: &F) -> Result<T, AttemptFailure>
    where
        F: Fn(Arc<dyn AiProvider>) -> Fut,
        Fut: Future<Output = ProviderResult<T>>,
    {
        handle.begin_attempt();
        let started = Instant::now();

        match call_with_timeout(self.call_timeout, operation(handle.capability())).await {
            Ok(value) => {
                let latency = started.elapsed();
                handle.record_success(latency);
                tracing::debug!(
                    provider = %handle.provider_type(),
                    latency_ms = latency.as_secs_f64() * 1000.0,
                    "Provider call succeeded"
                );
                Ok(value)
            }
            Err(error) => {
                let tripped = handle.record_failure(&error);
                Err(AttemptFailure { error, tripped })
            }
        }
    }

    fn available_providers(
        &self,
        priority: &[ProviderType],
        filter: Option<&[ProviderType]>,
    ) -> Vec<Arc<ProviderHandle>> {
        priority
            .iter()
            .filter(|p| permitted(filter, **p))
            .filter_map(|p| self.registry.get(*p))
            .filter(|h| h.is_available())
            .collect()
    }

    /// First provider in priority order that would be tried right now.
    ///
    /// Read-only: an open breaker past its recovery timeout counts as ready
    /// but stays open until a real call consults it.
    pub fn preferred_provider(&self) -> Option<ProviderType> {
        let policy = self.routing.load();
        policy
            .service_priority
            .iter()
            .filter_map(|p| self.registry.get(*p))
            .find(|h| h.is_ready())
            .map(|h| h.provider_type())
    }

    /// Models per ready provider; a failing listing yields an empty list.
    ///
    /// Listings are not orchestrated calls, so breakers and counters are left untouched.
    pub async fn list_models(&self) -> BTreeMap<ProviderType, Vec<ModelInfo>> {
        let mut models = BTreeMap::new();
        for handle in self.registry.all() {
            if !handle.is_ready() {
                continue;
            }
            let provider = handle.provider_type();
            let capability = handle.capability();
            let listed = match call_with_timeout(self.call_timeout, capability.list_models()).await {
                Ok(list) => list,
                Err(e) => {
                    tracing::warn!(provider = %provider, error = %e, "Failed to list models");
                    Vec::new()
                }
            };
            models.insert(provider, listed);
        }
        models
    }

    // --- Management ---

    pub fn status(&self) -> OrchestratorStatus {
        OrchestratorStatus {
            providers: self.registry.all().iter().map(|h| h.snapshot()).collect(),
            routing: self.routing_policy(),
            preferred_provider: self.preferred_provider(),
            health_monitoring_enabled: self.health.enabled,
        }
    }

    pub fn provider_status(&self, provider: ProviderType) -> Result<ProviderSnapshot, OrchestratorError> {
        Ok(self.handle(provider)?.snapshot())
    }

    pub fn reset_circuit_breaker(&self, provider: ProviderType) -> Result<(), OrchestratorError> {
        self.handle(provider)?.reset_breaker();
        tracing::info!(provider = %provider, "Circuit breaker reset");
        Ok(())
    }

    pub fn reset_all_circuit_breakers(&self) {
        for handle in self.registry.all() {
            handle.reset_breaker();
        }
        tracing::info!("All circuit breakers reset");
    }

    /// Reset counters for one provider, or all when `provider` is `None`.
    pub fn reset_performance(&self, provider: Option<ProviderType>) -> Result<(), OrchestratorError> {
        match provider {
            Some(p) => self.handle(p)?.reset_performance(),
            None => self.registry.all().iter().for_each(|h| h.reset_performance()),
        }
        tracing::info!(provider = ?provider, "Performance counters reset");
        Ok(())
    }

    pub fn routing_policy(&self) -> RoutingPolicy {
        self.routing.load().as_ref().clone()
    }

    pub fn apply_routing_policy(&self, policy: RoutingPolicy) {
        self.routing.store(Arc::new(RoutingPolicy {
            service_priority: routing::dedup(policy.service_priority),
            fallback_order: routing::dedup(policy.fallback_order),
            degradation_enabled: policy.degradation_enabled,
        }));
    }

    pub fn set_service_priority(&self, priority: Vec<ProviderType>) {
        let priority = routing::dedup(priority);
        tracing::info!(priority = ?priority, "Service priority updated");
        self.routing.rcu(|current| RoutingPolicy {
            service_priority: priority.clone(),
            ..current.as_ref().clone()
        });
    }

    pub fn set_degradation_order(&self, order: Vec<ProviderType>) {
        let order = routing::dedup(order);
        tracing::info!(order = ?order, "Degradation fallback order updated");
        self.routing.rcu(|current| RoutingPolicy {
            fallback_order: order.clone(),
            ..current.as_ref().clone()
        });
    }

    pub fn set_degradation_enabled(&self, enabled: bool) {
        tracing::info!(enabled, "Service degradation toggled");
        self.routing.rcu(|current| RoutingPolicy {
            degradation_enabled: enabled,
            ..current.as_ref().clone()
        });
    }

    /// Health-check one provider now, updating its health flag like the monitor does.
    pub async fn test_provider(&self, provider: ProviderType) -> Result<HealthReport, OrchestratorError> {
        let handle = self.handle(provider)?;
        Ok(check_provider(&handle, &self.degradation, self.health.timeout()).await)
    }

    pub fn degradation_status(&self) -> DegradationReport {
        self.degradation.report(&self.registry)
    }

    pub fn errors(&self) -> &Arc<ErrorTracker> {
        self.registry.errors()
    }

    pub fn error_dashboard(&self) -> ErrorDashboard {
        self.errors().dashboard()
    }

    pub fn error_analysis(&self) -> ErrorAnalysis {
        let snapshots: Vec<ProviderSnapshot> = self.registry.all().iter().map(|h| h.snapshot()).collect();
        self.errors().analysis(&snapshots)
    }

    pub fn clear_errors(&self) {
        self.errors().clear();
    }

    /// Spawn the background health monitor; `None` when monitoring is disabled.
    pub fn start_health_monitoring(&self) -> Option<HealthMonitorHandle> {
        if !self.health.enabled {
            tracing::info!("Provider health monitoring disabled");
            return None;
        }
        let monitor = HealthMonitor::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.degradation),
            self.health.clone(),
        );
        Some(monitor.spawn())
    }

    fn handle(&self, provider: ProviderType) -> Result<Arc<ProviderHandle>, OrchestratorError> {
        self.registry
            .get(provider)
            .ok_or(OrchestratorError::NotConfigured(provider))
    }
}

fn permitted(filter: Option<&[ProviderType]>, provider: ProviderType) -> bool {
    filter.map_or(true, |allowed| allowed.contains(&provider))
}
