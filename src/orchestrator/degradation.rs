//! Degradation bookkeeping and status report.
//!
//! A primary provider gets an entry when a call had to fall back past it;
//! a healthy health check clears the entry.

use std::time::{SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::health::state::ProviderStatus;
use crate::providers::ProviderType;
use crate::registry::ProviderRegistry;
use crate::resilience::CircuitState;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DegradationEntry {
    /// Unix seconds of the first degradation since the last clear.
    pub since: f64,
    pub last_reason: String,
    pub occurrences: u64,
}

#[derive(Debug, Default)]
pub struct DegradationTracker {
    entries: DashMap<ProviderType, DegradationEntry>,
}

impl DegradationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&self, provider: ProviderType, reason: &str) {
        self.entries
            .entry(provider)
            .and_modify(|e| {
                e.occurrences += 1;
                e.last_reason = reason.to_string();
            })
            .or_insert_with(|| DegradationEntry {
                since: now_secs(),
                last_reason: reason.to_string(),
                occurrences: 1,
            });
    }

    /// Returns true when an entry was removed.
    pub fn clear(&self, provider: ProviderType) -> bool {
        self.entries.remove(&provider).is_some()
    }

    pub fn get(&self, provider: ProviderType) -> Option<DegradationEntry> {
        self.entries.get(&provider).map(|e| e.clone())
    }

    pub fn is_degraded(&self, provider: ProviderType) -> bool {
        self.entries.contains_key(&provider)
    }

    /// Classify every configured provider.
    pub fn report(&self, registry: &ProviderRegistry) -> DegradationReport {
        let mut report = DegradationReport {
            overall_status: OverallStatus::Healthy,
            critical_services: Vec::new(),
            degraded_services: Vec::new(),
            healthy_services: Vec::new(),
            entries: Vec::new(),
        };

        for handle in registry.all() {
            let provider = handle.provider_type();
            let entry = self.get(provider);

            if handle.circuit_state() == CircuitState::Open {
                report.critical_services.push(provider);
            } else if entry.is_some() || handle.status() == ProviderStatus::Unhealthy {
                report.degraded_services.push(provider);
            } else {
                report.healthy_services.push(provider);
            }

            if let Some(entry) = entry {
                report.entries.push(ProviderDegradation { provider, entry });
            }
        }

        report.overall_status = if !report.critical_services.is_empty() {
            OverallStatus::Critical
        } else if !report.degraded_services.is_empty() {
            OverallStatus::Warning
        } else {
            OverallStatus::Healthy
        };
        report
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    Healthy,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderDegradation {
    pub provider: ProviderType,
    #[serde(flatten)]
    pub entry: DegradationEntry,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DegradationReport {
    pub overall_status: OverallStatus,
    pub critical_services: Vec<ProviderType>,
    pub degraded_services: Vec<ProviderType>,
    pub healthy_services: Vec<ProviderType>,
    pub entries: Vec<ProviderDegradation>,
}

fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
