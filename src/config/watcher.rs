//! Configuration file watcher for hot reload of the routing policy.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{broadcast, mpsc};

use crate::config::loader::load_config;
use crate::config::schema::OrchestratorConfig;
use crate::orchestrator::{Orchestrator, RoutingPolicy};

/// Watches one TOML file and forwards every config that loads and validates.
pub struct ConfigWatcher {
    path: PathBuf,
    updates: mpsc::UnboundedSender<OrchestratorConfig>,
}

impl ConfigWatcher {
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<OrchestratorConfig>) {
        let (updates, rx) = mpsc::unbounded_channel();
        let watcher = Self {
            path: path.to_path_buf(),
            updates,
        };
        (watcher, rx)
    }

    /// Start the OS watcher. Events stop when the returned value is dropped.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let Self { path, updates } = self;
        let reload_path = path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if is_content_change(&event.kind) => reload(&reload_path, &updates),
                Ok(_) => {}
                Err(e) => tracing::error!(error = ?e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;
        watcher.watch(&path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?path, "Config watcher started");
        Ok(watcher)
    }
}

fn is_content_change(kind: &EventKind) -> bool {
    kind.is_modify() || kind.is_create()
}

fn reload(path: &Path, updates: &mpsc::UnboundedSender<OrchestratorConfig>) {
    tracing::info!(path = ?path, "Config file changed, reloading");
    match load_config(path) {
        Ok(config) => {
            if updates.send(config).is_err() {
                tracing::debug!("Config update receiver gone, dropping reload");
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "Config reload rejected, keeping current routing policy");
        }
    }
}

/// Apply routing changes from reloaded configs until shutdown or the watcher goes away.
///
/// Thresholds, timeouts and provider sections are fixed at startup; only the
/// routing policy is swapped.
pub async fn apply_updates(
    orchestrator: Arc<Orchestrator>,
    mut updates: mpsc::UnboundedReceiver<OrchestratorConfig>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            update = updates.recv() => {
                let Some(config) = update else { break };
                let policy = RoutingPolicy::from_config(&config);
                tracing::info!(
                    priority = ?policy.service_priority,
                    fallback = ?policy.fallback_order,
                    degradation = policy.degradation_enabled,
                    "Applying reloaded routing policy"
                );
                orchestrator.apply_routing_policy(policy);
            }
            _ = shutdown.recv() => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ProviderType;

    #[tokio::test]
    async fn test_apply_updates_swaps_routing_policy() {
        let config = OrchestratorConfig::default();
        let orchestrator = Arc::new(Orchestrator::new(Vec::new(), &config));
        let (tx, rx) = mpsc::unbounded_channel();
        let (stop, stop_rx) = broadcast::channel(1);

        let task = tokio::spawn(apply_updates(Arc::clone(&orchestrator), rx, stop_rx));

        let mut reloaded = config.clone();
        reloaded.service_priority = vec![ProviderType::Ollama];
        reloaded.degradation.enabled = false;
        tx.send(reloaded).unwrap();

        // Closing the channel ends the loop after the pending update is applied.
        drop(tx);
        task.await.unwrap();
        drop(stop);

        let policy = orchestrator.routing_policy();
        assert_eq!(policy.service_priority, vec![ProviderType::Ollama]);
        assert!(!policy.degradation_enabled);
    }

    #[tokio::test]
    async fn test_apply_updates_stops_on_shutdown() {
        let orchestrator = Arc::new(Orchestrator::new(Vec::new(), &OrchestratorConfig::default()));
        let (_tx, rx) = mpsc::unbounded_channel();
        let (stop, stop_rx) = broadcast::channel(1);

        let task = tokio::spawn(apply_updates(orchestrator, rx, stop_rx));
        stop.send(()).unwrap();
        task.await.unwrap();
    }
}
