//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (thresholds >= 1, timeouts > 0, finite delays)
//! - Check routing lists (non-empty, no duplicates) and provider URLs
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: OrchestratorConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::OrchestratorConfig;
use crate::providers::ProviderType;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Validate a full configuration, collecting every problem found.
pub fn validate_config(config: &OrchestratorConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let cb = &config.circuit_breaker;
    if cb.failure_threshold < 1 {
        errors.push(ValidationError::new("circuit_breaker.failure_threshold", "must be >= 1"));
    }
    if cb.success_threshold < 1 {
        errors.push(ValidationError::new("circuit_breaker.success_threshold", "must be >= 1"));
    }

    let retry = &config.retry;
    if retry.max_attempts < 1 {
        errors.push(ValidationError::new("retry.max_attempts", "must be >= 1"));
    }
    check_delay(&mut errors, "retry.base_delay_secs", retry.base_delay_secs);
    check_delay(&mut errors, "retry.max_delay_secs", retry.max_delay_secs);
    if retry.max_delay_secs < retry.base_delay_secs {
        errors.push(ValidationError::new(
            "retry.max_delay_secs",
            "must be >= retry.base_delay_secs",
        ));
    }
    if !retry.exponential_base.is_finite() || retry.exponential_base < 1.0 {
        errors.push(ValidationError::new("retry.exponential_base", "must be a finite number >= 1.0"));
    }

    if config.health_check.interval_seconds == 0 {
        errors.push(ValidationError::new("health_check.interval_seconds", "must be > 0"));
    }
    if config.health_check.timeout_seconds == 0 {
        errors.push(ValidationError::new("health_check.timeout_seconds", "must be > 0"));
    }
    if config.timeouts.provider_call_secs == 0 {
        errors.push(ValidationError::new("timeouts.provider_call_secs", "must be > 0"));
    }

    if config.service_priority.is_empty() {
        errors.push(ValidationError::new("service_priority", "must list at least one provider"));
    }
    check_duplicates(&mut errors, "service_priority", &config.service_priority);
    check_duplicates(&mut errors, "degradation.fallback_order", &config.degradation.fallback_order);

    for (provider, base_url) in config.providers.base_urls() {
        if let Err(e) = Url::parse(base_url) {
            errors.push(ValidationError::new(
                format!("providers.{}.base_url", provider),
                format!("invalid URL '{}': {}", base_url, e),
            ));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("invalid socket address '{}'", config.observability.metrics_address),
        ));
    }

    if config.admin.enabled {
        if config.admin.api_key.trim().is_empty() {
            errors.push(ValidationError::new("admin.api_key", "must not be empty when admin is enabled"));
        }
        if config.admin.bind_address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::new(
                "admin.bind_address",
                format!("invalid socket address '{}'", config.admin.bind_address),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_delay(errors: &mut Vec<ValidationError>, field: &str, value: f64) {
    if !value.is_finite() || value < 0.0 {
        errors.push(ValidationError::new(field, "must be a finite, non-negative number of seconds"));
    }
}

fn check_duplicates(errors: &mut Vec<ValidationError>, field: &str, list: &[ProviderType]) {
    let mut seen = HashSet::new();
    for provider in list {
        if !seen.insert(*provider) {
            errors.push(ValidationError::new(field, format!("duplicate provider '{}'", provider)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{OllamaConfig, Preset};

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate_config(&OrchestratorConfig::default()).is_ok());
        for preset in [Preset::Development, Preset::Production, Preset::Testing] {
            assert!(validate_config(&OrchestratorConfig::preset(preset)).is_ok());
        }
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = OrchestratorConfig::default();
        config.circuit_breaker.failure_threshold = 0;
        config.retry.max_attempts = 0;
        config.retry.base_delay_secs = 10.0;
        config.retry.max_delay_secs = 5.0;
        config.service_priority = vec![ProviderType::Ollama, ProviderType::Ollama];
        config.health_check.interval_seconds = 0;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();

        assert!(fields.contains(&"circuit_breaker.failure_threshold"));
        assert!(fields.contains(&"retry.max_attempts"));
        assert!(fields.contains(&"retry.max_delay_secs"));
        assert!(fields.contains(&"service_priority"));
        assert!(fields.contains(&"health_check.interval_seconds"));
    }

    #[test]
    fn test_rejects_non_finite_delays() {
        let mut config = OrchestratorConfig::default();
        config.retry.base_delay_secs = f64::NAN;
        config.retry.exponential_base = 0.5;

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "retry.base_delay_secs"));
        assert!(errors.iter().any(|e| e.field == "retry.exponential_base"));
    }

    #[test]
    fn test_rejects_bad_provider_url() {
        let mut config = OrchestratorConfig::default();
        config.providers.ollama = Some(OllamaConfig {
            base_url: "not a url".into(),
            ..Default::default()
        });

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "providers.ollama.base_url");
    }

    #[test]
    fn test_empty_priority_rejected() {
        let mut config = OrchestratorConfig::default();
        config.service_priority.clear();
        assert!(validate_config(&config).is_err());
    }
}
