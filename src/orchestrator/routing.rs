//! Routing policy: failover order, fallback order and the degradation switch.

use serde::{Deserialize, Serialize};

use crate::config::OrchestratorConfig;
use crate::providers::ProviderType;

/// Swapped as one value so a call never sees half of a reconfiguration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingPolicy {
    pub service_priority: Vec<ProviderType>,
    pub fallback_order: Vec<ProviderType>,
    pub degradation_enabled: bool,
}

impl RoutingPolicy {
    pub fn from_config(config: &OrchestratorConfig) -> Self {
        Self {
            service_priority: dedup(config.service_priority.clone()),
            fallback_order: dedup(config.degradation.fallback_order.clone()),
            degradation_enabled: config.degradation.enabled,
        }
    }
}

/// Drop repeated entries, keeping first occurrences in order.
pub(crate) fn dedup(list: Vec<ProviderType>) -> Vec<ProviderType> {
    let mut out: Vec<ProviderType> = Vec::with_capacity(list.len());
    for provider in list {
        if !out.contains(&provider) {
            out.push(provider);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_defaults() {
        let policy = RoutingPolicy::from_config(&OrchestratorConfig::default());
        assert_eq!(policy.service_priority, vec![ProviderType::OpenAi, ProviderType::Ollama]);
        assert_eq!(policy.fallback_order, vec![ProviderType::Ollama, ProviderType::OpenAi]);
        assert!(policy.degradation_enabled);
    }

    #[test]
    fn test_dedup_keeps_first() {
        let list = vec![ProviderType::Ollama, ProviderType::OpenAi, ProviderType::Ollama];
        assert_eq!(dedup(list), vec![ProviderType::Ollama, ProviderType::OpenAi]);
    }
}
