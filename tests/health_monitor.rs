//! Background health monitoring and on-demand provider tests.

use std::time::Duration;

use provider_orchestrator::health::ProviderStatus;
use provider_orchestrator::providers::{HealthReport, ProviderType};
use provider_orchestrator::resilience::CircuitState;

mod common;
use common::{orchestrator, test_config, MockProvider};

const OPENAI: ProviderType = ProviderType::OpenAi;
const OLLAMA: ProviderType = ProviderType::Ollama;

fn monitored_config() -> provider_orchestrator::OrchestratorConfig {
    let mut config = test_config(&[OPENAI, OLLAMA]);
    config.health_check.enabled = true;
    config.health_check.interval_seconds = 30;
    config.health_check.timeout_seconds = 5;
    config
}

#[tokio::test(start_paused = true)]
async fn test_monitor_flags_unhealthy_and_recovers() {
    let openai = MockProvider::healthy(OPENAI);
    let ollama = MockProvider::healthy(OLLAMA);
    openai.set_health(HealthReport::unhealthy(3.0, "invalid api key"));
    let orch = orchestrator(&[openai.clone(), ollama.clone()], &monitored_config());

    let monitor = orch.start_health_monitoring().unwrap();

    // The first round runs immediately.
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(openai.health_checks(), 1);
    assert_eq!(ollama.health_checks(), 1);

    let openai_handle = orch.registry().get(OPENAI).unwrap();
    assert_eq!(openai_handle.status(), ProviderStatus::Unhealthy);
    assert_eq!(orch.registry().get(OLLAMA).unwrap().status(), ProviderStatus::Healthy);

    // A failed check counts against the breaker and the counters.
    let snapshot = openai_handle.snapshot();
    assert_eq!(snapshot.circuit_breaker.failure_count, 1);
    assert_eq!(snapshot.performance.failed_requests, 1);
    assert!(!snapshot.healthy);
    assert_eq!(orch.preferred_provider(), Some(OLLAMA));

    openai.set_health(HealthReport::healthy(2.0, None));
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert_eq!(openai.health_checks(), 2);
    assert_eq!(openai_handle.status(), ProviderStatus::Healthy);
    assert_eq!(orch.preferred_provider(), Some(OPENAI));
    // A passing check is not a served request.
    assert_eq!(openai_handle.performance().successful_requests, 0);

    monitor.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_repeated_failed_checks_open_the_breaker() {
    let openai = MockProvider::healthy(OPENAI);
    openai.set_health(HealthReport::unhealthy(1.0, "down"));
    let mut config = monitored_config();
    config.circuit_breaker.failure_threshold = 2;
    let orch = orchestrator(&[openai.clone()], &config);

    let monitor = orch.start_health_monitoring().unwrap();
    tokio::time::sleep(Duration::from_secs(31)).await;

    assert_eq!(openai.health_checks(), 2);
    assert_eq!(orch.registry().get(OPENAI).unwrap().circuit_state(), CircuitState::Open);

    monitor.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_healthy_check_clears_degradation_entry() {
    let ollama = MockProvider::healthy(OLLAMA);
    let orch = orchestrator(&[ollama.clone()], &monitored_config());
    orch.degradation_tracker().mark(OLLAMA, "earlier outage");
    assert!(orch.degradation_tracker().is_degraded(OLLAMA));

    let monitor = orch.start_health_monitoring().unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert!(!orch.degradation_tracker().is_degraded(OLLAMA));
    monitor.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_stop_ends_monitor_task() {
    let ollama = MockProvider::healthy(OLLAMA);
    let orch = orchestrator(&[ollama.clone()], &monitored_config());

    let monitor = orch.start_health_monitoring().unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(!monitor.is_finished());
    monitor.stop().await;

    let checks = ollama.health_checks();
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(ollama.health_checks(), checks);
}

#[tokio::test]
async fn test_monitoring_disabled() {
    let ollama = MockProvider::healthy(OLLAMA);
    let orch = orchestrator(&[ollama.clone()], &test_config(&[OLLAMA]));

    assert!(orch.start_health_monitoring().is_none());
    assert!(!orch.status().health_monitoring_enabled);
}

#[tokio::test(start_paused = true)]
async fn test_provider_check_times_out() {
    let openai = MockProvider::healthy(OPENAI);
    openai.set_latency(Duration::from_secs(10));
    let orch = orchestrator(&[openai.clone()], &monitored_config());

    let report = orch.test_provider(OPENAI).await.unwrap();

    assert_eq!(report.status, ProviderStatus::Unhealthy);
    assert!(report.error.unwrap().contains("timed out"));
    assert_eq!(orch.registry().get(OPENAI).unwrap().status(), ProviderStatus::Unhealthy);
}

#[tokio::test]
async fn test_provider_on_demand_updates_flag() {
    let openai = MockProvider::healthy(OPENAI);
    let orch = orchestrator(&[openai.clone()], &test_config(&[OPENAI]));
    assert_eq!(orch.registry().get(OPENAI).unwrap().status(), ProviderStatus::Unknown);

    let report = orch.test_provider(OPENAI).await.unwrap();

    assert_eq!(report.status, ProviderStatus::Healthy);
    assert_eq!(orch.registry().get(OPENAI).unwrap().status(), ProviderStatus::Healthy);
    assert_eq!(openai.calls(), 0);
}
