//! Provider registry.
//!
//! # Responsibilities
//! - Hold one handle per configured provider type
//! - Answer "is this provider configured?" and hand out handles

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::CircuitBreakerConfig;
use crate::observability::errors::ErrorTracker;
use crate::providers::{AiProvider, ProviderType};
use crate::registry::handle::ProviderHandle;

#[derive(Debug)]
pub struct ProviderRegistry {
    handles: BTreeMap<ProviderType, Arc<ProviderHandle>>,
    errors: Arc<ErrorTracker>,
}

impl ProviderRegistry {
    /// Create a registry; a later adapter for the same type replaces an earlier one.
    pub fn new(providers: Vec<Arc<dyn AiProvider>>, breaker: &CircuitBreakerConfig) -> Self {
        let errors = Arc::new(ErrorTracker::new());
        let mut handles = BTreeMap::new();
        for provider in providers {
            let kind = provider.provider_type();
            let handle = Arc::new(ProviderHandle::new(provider, breaker, Arc::clone(&errors)));
            if handles.insert(kind, handle).is_some() {
                tracing::warn!(provider = %kind, "Duplicate provider registration, keeping the last one");
            }
        }
        tracing::info!(providers = ?handles.keys().collect::<Vec<_>>(), "Provider registry initialized");
        Self { handles, errors }
    }

    /// Error accounting shared by every handle.
    pub fn errors(&self) -> &Arc<ErrorTracker> {
        &self.errors
    }

    pub fn get(&self, provider: ProviderType) -> Option<Arc<ProviderHandle>> {
        self.handles.get(&provider).cloned()
    }

    pub fn is_configured(&self, provider: ProviderType) -> bool {
        self.handles.contains_key(&provider)
    }

    pub fn provider_types(&self) -> Vec<ProviderType> {
        self.handles.keys().copied().collect()
    }

    /// Every handle, in `ProviderType` order.
    pub fn all(&self) -> Vec<Arc<ProviderHandle>> {
        self.handles.values().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}
