//! Errors that cross the orchestration boundary.

use std::time::Duration;

use thiserror::Error;

use crate::providers::{ProviderError, ProviderType};

#[derive(Debug, Clone, Error)]
pub enum OrchestratorError {
    /// A provider's breaker tripped during this call.
    #[error("circuit breaker open for {provider}, retry after {}s", .retry_after.as_secs())]
    CircuitOpen {
        provider: ProviderType,
        retry_after: Duration,
    },

    /// Nothing was eligible to try and no failure was observed.
    #[error("no AI providers available")]
    NoProvidersAvailable,

    /// Every primary attempt failed and degradation is disabled.
    #[error("all AI services failed after {attempts} attempt(s): {last_error}")]
    AllProvidersFailed {
        attempts: u32,
        last_error: ProviderError,
    },

    /// Every fallback failed too.
    #[error("service degradation failed ({original}); last fallback error: {}", describe(.last_error))]
    DegradationFailed {
        original: String,
        last_error: Option<ProviderError>,
    },

    /// A management call named a provider that has no adapter.
    #[error("provider {0} is not configured")]
    NotConfigured(ProviderType),
}

fn describe(error: &Option<ProviderError>) -> String {
    match error {
        Some(e) => e.to_string(),
        None => "no fallback provider was eligible".to_string(),
    }
}

impl OrchestratorError {
    /// Short label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            OrchestratorError::CircuitOpen { .. } => "circuit_open",
            OrchestratorError::NoProvidersAvailable => "no_providers",
            OrchestratorError::AllProvidersFailed { .. } => "all_failed",
            OrchestratorError::DegradationFailed { .. } => "degradation_failed",
            OrchestratorError::NotConfigured(_) => "not_configured",
        }
    }

    /// Provider the error names, if any.
    pub fn provider(&self) -> Option<ProviderType> {
        match self {
            OrchestratorError::CircuitOpen { provider, .. } => Some(*provider),
            OrchestratorError::NotConfigured(provider) => Some(*provider),
            _ => None,
        }
    }

    /// Suggested wait before retrying, when the error carries one.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            OrchestratorError::CircuitOpen { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = OrchestratorError::CircuitOpen {
            provider: ProviderType::OpenAi,
            retry_after: Duration::from_secs(60),
        };
        assert_eq!(err.to_string(), "circuit breaker open for openai, retry after 60s");
        assert_eq!(err.retry_after(), Some(Duration::from_secs(60)));
        assert_eq!(err.provider(), Some(ProviderType::OpenAi));

        let err = OrchestratorError::DegradationFailed {
            original: "HTTP 500: boom".into(),
            last_error: None,
        };
        assert!(err.to_string().contains("no fallback provider was eligible"));
        assert_eq!(err.kind(), "degradation_failed");
    }
}
