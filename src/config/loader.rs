//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::{OllamaConfig, OpenAiConfig, OrchestratorConfig, Preset};
use crate::config::validation::{validate_config, ValidationError};
use crate::providers::ProviderType;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid environment override {var}: {message}")]
    Env { var: &'static str, message: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file, then apply environment overrides.
pub fn load_config(path: &Path) -> Result<OrchestratorConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: OrchestratorConfig = toml::from_str(&content)?;
    finish(config, |name| std::env::var(name).ok())
}

/// Start from a preset instead of a file, still honoring the environment.
pub fn load_preset(preset: Preset) -> Result<OrchestratorConfig, ConfigError> {
    finish(OrchestratorConfig::preset(preset), |name| std::env::var(name).ok())
}

fn finish<F>(mut config: OrchestratorConfig, lookup: F) -> Result<OrchestratorConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    apply_env_overrides(&mut config, lookup)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Apply the supported environment variables on top of a parsed config.
///
/// `lookup` abstracts `std::env::var` so tests can inject values.
pub fn apply_env_overrides<F>(config: &mut OrchestratorConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("CIRCUIT_BREAKER_FAILURE_THRESHOLD") {
        config.circuit_breaker.failure_threshold = parse_env("CIRCUIT_BREAKER_FAILURE_THRESHOLD", &v)?;
    }
    if let Some(v) = lookup("CIRCUIT_BREAKER_RECOVERY_TIMEOUT") {
        config.circuit_breaker.recovery_timeout_secs = parse_env("CIRCUIT_BREAKER_RECOVERY_TIMEOUT", &v)?;
    }
    if let Some(v) = lookup("RETRY_MAX_ATTEMPTS") {
        config.retry.max_attempts = parse_env("RETRY_MAX_ATTEMPTS", &v)?;
    }
    if let Some(v) = lookup("RETRY_BASE_DELAY") {
        config.retry.base_delay_secs = parse_env("RETRY_BASE_DELAY", &v)?;
    }
    if let Some(v) = lookup("ENABLE_SERVICE_DEGRADATION") {
        config.degradation.enabled = parse_bool("ENABLE_SERVICE_DEGRADATION", &v)?;
    }
    if let Some(v) = lookup("FALLBACK_SERVICE_ORDER") {
        config.degradation.fallback_order = parse_list("FALLBACK_SERVICE_ORDER", &v)?;
    }
    if let Some(v) = lookup("SERVICE_PRIORITY") {
        config.service_priority = parse_list("SERVICE_PRIORITY", &v)?;
    }
    if let Some(v) = lookup("HEALTH_CHECK_INTERVAL") {
        config.health_check.interval_seconds = parse_env("HEALTH_CHECK_INTERVAL", &v)?;
    }
    if let Some(v) = lookup("OPENAI_API_KEY") {
        config
            .providers
            .openai
            .get_or_insert_with(OpenAiConfig::default)
            .api_key = v;
    }
    if let Some(v) = lookup("OLLAMA_BASE_URL") {
        config
            .providers
            .ollama
            .get_or_insert_with(OllamaConfig::default)
            .base_url = v;
    }
    Ok(())
}

fn parse_env<T>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Env {
        var,
        message: e.to_string(),
    })
}

fn parse_bool(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::Env {
            var,
            message: format!("expected a boolean, got '{}'", other),
        }),
    }
}

fn parse_list(var: &'static str, value: &str) -> Result<Vec<ProviderType>, ConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| parse_env(var, s))
        .collect()
}
