//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe every configured provider
//! - Update the health flag, breaker and counters based on results
//! - Clear degradation entries for providers that report healthy

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::config::HealthCheckConfig;
use crate::health::state::ProviderStatus;
use crate::orchestrator::degradation::DegradationTracker;
use crate::providers::{HealthReport, ProviderError};
use crate::registry::{ProviderHandle, ProviderRegistry};

pub struct HealthMonitor {
    registry: Arc<ProviderRegistry>,
    degradation: Arc<DegradationTracker>,
    config: HealthCheckConfig,
}

impl HealthMonitor {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        degradation: Arc<DegradationTracker>,
        config: HealthCheckConfig,
    ) -> Self {
        Self {
            registry,
            degradation,
            config,
        }
    }

    /// Run the monitor on its own task; stop it through the returned handle.
    pub fn spawn(self) -> HealthMonitorHandle {
        let (shutdown, rx) = broadcast::channel(1);
        let task = tokio::spawn(self.run(rx));
        HealthMonitorHandle { shutdown, task }
    }

    /// Check every provider each interval until `shutdown` fires.
    ///
    /// Shutdown is only observed between rounds, so an in-flight round
    /// completes (or times out) first.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Provider health monitoring disabled");
            return;
        }

        tracing::info!(
            interval_secs = self.config.interval_seconds,
            timeout_secs = self.config.timeout_seconds,
            "Health monitor starting"
        );

        let mut ticker = time::interval(self.config.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_all().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    async fn check_all(&self) {
        for handle in self.registry.all() {
            check_provider(&handle, &self.degradation, self.config.timeout()).await;
        }
    }
}

/// Probe one provider and fold the result into its handle.
///
/// Used by the periodic monitor and by on-demand connectivity tests.
pub async fn check_provider(
    handle: &ProviderHandle,
    degradation: &DegradationTracker,
    timeout: Duration,
) -> HealthReport {
    let provider = handle.provider_type();
    let capability = handle.capability();
    let report = match time::timeout(timeout, capability.health_check()).await {
        Ok(report) => report,
        Err(_) => HealthReport::unhealthy(
            timeout.as_secs_f64() * 1000.0,
            format!("health check timed out after {}s", timeout.as_secs()),
        ),
    };

    if report.status == ProviderStatus::Healthy {
        handle.set_status(ProviderStatus::Healthy);
        if degradation.clear(provider) {
            tracing::info!(provider = %provider, "Provider recovered, degradation entry cleared");
        }
        tracing::debug!(provider = %provider, latency_ms = report.latency_ms, "Health check passed");
    } else {
        let reason = report
            .error
            .clone()
            .unwrap_or_else(|| format!("reported {}", report.status));
        tracing::warn!(provider = %provider, error = %reason, "Health check failed");

        handle.set_status(ProviderStatus::Unhealthy);
        handle.begin_attempt();
        handle.record_failure(&ProviderError::Unhealthy(reason));
    }

    report
}

/// Owner of a spawned [`HealthMonitor`].
pub struct HealthMonitorHandle {
    shutdown: broadcast::Sender<()>,
    task: JoinHandle<()>,
}

impl HealthMonitorHandle {
    /// Signal the monitor and wait for it to exit.
    pub async fn stop(self) {
        let _ = self.shutdown.send(());
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Health monitor task failed");
        }
        tracing::info!("Health monitor stopped");
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
