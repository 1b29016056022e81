//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the orchestrator.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::providers::ProviderType;

/// Root configuration for the provider orchestrator.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Failover order for normal calls.
    pub service_priority: Vec<ProviderType>,

    /// Background health monitoring.
    pub health_check: HealthCheckConfig,

    /// Backoff between failover rounds.
    pub retry: RetryConfig,

    /// Per-provider breaker thresholds.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Last-resort fallback chain.
    pub degradation: DegradationConfig,

    /// Deadlines for provider calls.
    pub timeouts: TimeoutConfig,

    /// Backend connection settings, keyed by provider name.
    pub providers: ProvidersConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            service_priority: vec![ProviderType::OpenAi, ProviderType::Ollama],
            health_check: HealthCheckConfig::default(),
            retry: RetryConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            degradation: DegradationConfig::default(),
            timeouts: TimeoutConfig::default(),
            providers: ProvidersConfig::default(),
            observability: ObservabilityConfig::default(),
            admin: AdminConfig::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Built-in configuration for a deployment environment.
    pub fn preset(preset: Preset) -> Self {
        let mut config = Self::default();
        match preset {
            Preset::Development => {
                config.circuit_breaker.failure_threshold = 3;
                config.circuit_breaker.recovery_timeout_secs = 30;
                config.retry.max_attempts = 2;
                config.retry.base_delay_secs = 0.5;
                config.degradation.enabled = true;
                config.health_check.interval_seconds = 60;
                config.observability.log_level = "debug".to_string();
            }
            Preset::Production => {
                config.circuit_breaker.failure_threshold = 5;
                config.circuit_breaker.recovery_timeout_secs = 60;
                config.retry.max_attempts = 3;
                config.retry.base_delay_secs = 1.0;
                config.degradation.enabled = true;
                config.health_check.interval_seconds = 300;
                config.observability.log_format = LogFormat::Json;
            }
            Preset::Testing => {
                config.circuit_breaker.failure_threshold = 2;
                config.circuit_breaker.recovery_timeout_secs = 10;
                config.retry.max_attempts = 1;
                config.retry.base_delay_secs = 0.1;
                config.degradation.enabled = false;
                config.health_check.interval_seconds = 30;
                config.observability.log_level = "debug".to_string();
            }
        }
        config
    }

    /// Provider families with a usable section in `[providers]`.
    pub fn configured_providers(&self) -> Vec<ProviderType> {
        ProviderType::ALL
            .into_iter()
            .filter(|p| self.providers.is_configured(*p))
            .collect()
    }
}

/// Named configuration presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    Development,
    Production,
    Testing,
}

impl FromStr for Preset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Preset::Development),
            "production" | "prod" => Ok(Preset::Production),
            "testing" | "test" => Ok(Preset::Testing),
            other => Err(format!("unknown preset '{}'", other)),
        }
    }
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Run the background monitor.
    pub enabled: bool,

    /// Seconds between monitoring rounds.
    pub interval_seconds: u64,

    /// Deadline for a single provider health check.
    pub timeout_seconds: u64,
}

impl HealthCheckConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: 300,
            timeout_seconds: 30,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Number of failover rounds per call.
    pub max_attempts: u32,

    /// Delay before the second round, in seconds.
    pub base_delay_secs: f64,

    /// Upper bound for any delay, in seconds.
    pub max_delay_secs: f64,

    /// Growth factor per round.
    pub exponential_base: f64,

    /// Scale each delay by a random factor in [0.5, 1.0].
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_secs: 1.0,
            max_delay_secs: 60.0,
            exponential_base: 2.0,
            jitter: true,
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Failures before the breaker opens.
    pub failure_threshold: u32,

    /// Seconds an open breaker waits before allowing a probe.
    pub recovery_timeout_secs: u64,

    /// Half-open successes required to close again.
    pub success_threshold: u32,
}

impl CircuitBreakerConfig {
    pub fn recovery_timeout(&self) -> Duration {
        Duration::from_secs(self.recovery_timeout_secs)
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout_secs: 60,
            success_threshold: 3,
        }
    }
}

/// Degradation fallback configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DegradationConfig {
    pub enabled: bool,
    pub fallback_order: Vec<ProviderType>,
}

impl Default for DegradationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            fallback_order: vec![ProviderType::Ollama, ProviderType::OpenAi],
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Deadline for one provider invocation, in seconds.
    pub provider_call_secs: u64,
}

impl TimeoutConfig {
    pub fn provider_call(&self) -> Duration {
        Duration::from_secs(self.provider_call_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            provider_call_secs: 30,
        }
    }
}

/// Per-provider connection settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub openai: Option<OpenAiConfig>,
    pub ollama: Option<OllamaConfig>,
}

impl ProvidersConfig {
    /// OpenAI needs a key; Ollama only needs its section.
    pub fn is_configured(&self, provider: ProviderType) -> bool {
        match provider {
            ProviderType::OpenAi => self
                .openai
                .as_ref()
                .map(|c| !c.api_key.trim().is_empty())
                .unwrap_or(false),
            ProviderType::Ollama => self.ollama.is_some(),
        }
    }

    /// Base URLs of the configured sections, for validation.
    pub fn base_urls(&self) -> BTreeMap<ProviderType, &str> {
        let mut urls = BTreeMap::new();
        if let Some(c) = &self.openai {
            urls.insert(ProviderType::OpenAi, c.base_url.as_str());
        }
        if let Some(c) = &self.ollama {
            urls.insert(ProviderType::Ollama, c.base_url.as_str());
        }
        urls
    }
}

/// OpenAI-compatible API settings.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub organization: Option<String>,
    pub chat_model: String,
    pub embedding_model: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openai.com/v1".to_string(),
            organization: None,
            chat_model: "gpt-3.5-turbo".to_string(),
            embedding_model: "text-embedding-ada-002".to_string(),
        }
    }
}

// Keep the key out of logs.
impl fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("organization", &self.organization)
            .field("chat_model", &self.chat_model)
            .field("embedding_model", &self.embedding_model)
            .finish()
    }
}

/// Ollama server settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OllamaConfig {
    pub base_url: String,
    pub chat_model: String,
    pub embedding_model: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            chat_model: "llama2".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Human-readable or JSON lines.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_file_uses_defaults() {
        let config: OrchestratorConfig = toml::from_str(
            r#"
            [providers.ollama]
            "#,
        )
        .unwrap();

        assert_eq!(config.service_priority, vec![ProviderType::OpenAi, ProviderType::Ollama]);
        assert_eq!(config.health_check.interval_seconds, 300);
        assert_eq!(config.circuit_breaker.failure_threshold, 5);
        assert_eq!(config.retry.exponential_base, 2.0);
        assert!(config.degradation.enabled);
        assert_eq!(config.configured_providers(), vec![ProviderType::Ollama]);
    }

    #[test]
    fn test_full_file() {
        let config: OrchestratorConfig = toml::from_str(
            r#"
            service_priority = ["ollama", "openai"]

            [retry]
            max_attempts = 5
            jitter = false

            [circuit_breaker]
            failure_threshold = 2

            [degradation]
            enabled = false
            fallback_order = ["openai"]

            [providers.openai]
            api_key = "sk-test"
            chat_model = "gpt-4o-mini"

            [observability]
            log_format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.service_priority[0], ProviderType::Ollama);
        assert_eq!(config.retry.max_attempts, 5);
        assert!(!config.retry.jitter);
        assert_eq!(config.retry.base_delay_secs, 1.0);
        assert_eq!(config.circuit_breaker.failure_threshold, 2);
        assert_eq!(config.circuit_breaker.success_threshold, 3);
        assert!(!config.degradation.enabled);
        assert_eq!(config.observability.log_format, LogFormat::Json);

        let openai = config.providers.openai.as_ref().unwrap();
        assert_eq!(openai.base_url, "https://api.openai.com/v1");
        assert_eq!(openai.chat_model, "gpt-4o-mini");
        assert_eq!(config.configured_providers(), vec![ProviderType::OpenAi]);
    }

    #[test]
    fn test_openai_without_key_is_not_configured() {
        let mut providers = ProvidersConfig::default();
        providers.openai = Some(OpenAiConfig::default());
        assert!(!providers.is_configured(ProviderType::OpenAi));

        providers.openai.as_mut().unwrap().api_key = "sk".into();
        assert!(providers.is_configured(ProviderType::OpenAi));
    }

    #[test]
    fn test_presets() {
        let testing = OrchestratorConfig::preset(Preset::Testing);
        assert_eq!(testing.circuit_breaker.failure_threshold, 2);
        assert_eq!(testing.retry.max_attempts, 1);
        assert!(!testing.degradation.enabled);

        let dev = OrchestratorConfig::preset("dev".parse().unwrap());
        assert_eq!(dev.circuit_breaker.recovery_timeout_secs, 30);

        assert!("staging".parse::<Preset>().is_err());
    }

    #[test]
    fn test_api_key_redacted_in_debug() {
        let config = OpenAiConfig {
            api_key: "sk-secret".into(),
            ..Default::default()
        };
        assert!(!format!("{:?}", config).contains("sk-secret"));
    }
}
