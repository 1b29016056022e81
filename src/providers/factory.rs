//! Build provider adapters from configuration.

use std::sync::Arc;

use crate::config::{OrchestratorConfig, ProvidersConfig};
use crate::providers::ollama::OllamaProvider;
use crate::providers::openai::OpenAiProvider;
use crate::providers::{AiProvider, ProviderType};

/// One adapter per configured provider family, sharing a single HTTP client.
///
/// Unconfigured families are skipped with a log line, never an error.
pub fn build_providers(
    config: &OrchestratorConfig,
) -> Result<Vec<Arc<dyn AiProvider>>, reqwest::Error> {
    let client = reqwest::Client::builder()
        .connect_timeout(config.timeouts.provider_call())
        .user_agent(concat!("provider-orchestrator/", env!("CARGO_PKG_VERSION")))
        .build()?;

    Ok(from_sections(&config.providers, client))
}

fn from_sections(providers: &ProvidersConfig, client: reqwest::Client) -> Vec<Arc<dyn AiProvider>> {
    let mut built: Vec<Arc<dyn AiProvider>> = Vec::new();

    for provider in ProviderType::ALL {
        if !providers.is_configured(provider) {
            tracing::info!(provider = %provider, "Provider not configured, skipping");
            continue;
        }
        match provider {
            ProviderType::OpenAi => {
                if let Some(section) = &providers.openai {
                    built.push(Arc::new(OpenAiProvider::new(client.clone(), section.clone())));
                }
            }
            ProviderType::Ollama => {
                if let Some(section) = &providers.ollama {
                    built.push(Arc::new(OllamaProvider::new(client.clone(), section.clone())));
                }
            }
        }
        tracing::info!(provider = %provider, "Provider adapter initialized");
    }

    built
}
