//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize subsystems in dependency order: metrics, providers,
//!   orchestrator, health monitor, config watcher, admin API
//! - Tear them down in reverse on shutdown
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Admin listener starts last (management only once everything is ready)

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use notify::RecommendedWatcher;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::admin::{setup_admin_router, AdminState};
use crate::config::watcher::{apply_updates, ConfigWatcher};
use crate::config::OrchestratorConfig;
use crate::health::HealthMonitorHandle;
use crate::lifecycle::shutdown::Shutdown;
use crate::observability::metrics;
use crate::orchestrator::Orchestrator;
use crate::providers::factory::build_providers;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("no AI providers configured")]
    NoProviders,

    #[error("invalid address '{0}'")]
    Address(String),

    #[error("failed to install metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("failed to bind admin API on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("failed to watch config file: {0}")]
    Watch(#[from] notify::Error),
}

/// Everything started by [`start`]; dropping it without `shutdown` leaks the tasks.
pub struct Services {
    pub orchestrator: Arc<Orchestrator>,
    pub admin_address: Option<SocketAddr>,
    shutdown: Shutdown,
    monitor: Option<HealthMonitorHandle>,
    tasks: Vec<JoinHandle<()>>,
    _watcher: Option<RecommendedWatcher>,
}

/// Build and start all subsystems.
///
/// `config_path` enables hot reload of the routing policy when present.
pub async fn start(
    config: OrchestratorConfig,
    config_path: Option<&Path>,
) -> Result<Services, StartupError> {
    if config.observability.metrics_enabled {
        let addr = parse_addr(&config.observability.metrics_address)?;
        metrics::init_metrics(addr)?;
    }

    let providers = build_providers(&config)?;
    if providers.is_empty() {
        return Err(StartupError::NoProviders);
    }

    let orchestrator = Arc::new(Orchestrator::new(providers, &config));
    let shutdown = Shutdown::new();
    let mut tasks = Vec::new();

    let monitor = orchestrator.start_health_monitoring();

    let watcher = match config_path {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            let watcher = watcher.run()?;
            tasks.push(tokio::spawn(apply_updates(
                Arc::clone(&orchestrator),
                updates,
                shutdown.subscribe(),
            )));
            Some(watcher)
        }
        None => None,
    };

    let mut admin_address = None;
    if config.admin.enabled {
        let addr = parse_addr(&config.admin.bind_address)?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| StartupError::Bind { addr, source })?;
        let local = listener.local_addr().unwrap_or(addr);
        admin_address = Some(local);

        let router = setup_admin_router(AdminState::new(
            Arc::clone(&orchestrator),
            &config.admin.api_key,
        ));
        let mut stop = shutdown.subscribe();
        tasks.push(tokio::spawn(async move {
            let server = axum::serve(listener, router).with_graceful_shutdown(async move {
                let _ = stop.recv().await;
            });
            if let Err(e) = server.await {
                tracing::error!(error = %e, "Admin API server error");
            }
        }));
        tracing::info!(address = %local, "Admin API listening");
    }

    tracing::info!(
        providers = ?orchestrator.registry().provider_types(),
        preferred = ?orchestrator.preferred_provider(),
        "Provider orchestrator started"
    );

    Ok(Services {
        orchestrator,
        admin_address,
        shutdown,
        monitor,
        tasks,
        _watcher: watcher,
    })
}

impl Services {
    /// Stop background work in reverse start order and wait for it.
    pub async fn shutdown(self) {
        self.shutdown.trigger();
        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Background task failed during shutdown");
            }
        }
        if let Some(monitor) = self.monitor {
            monitor.stop().await;
        }
    }
}

fn parse_addr(raw: &str) -> Result<SocketAddr, StartupError> {
    raw.parse().map_err(|_| StartupError::Address(raw.to_string()))
}
