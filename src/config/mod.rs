//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) or preset
//!     → loader.rs (parse, deserialize, apply environment overrides)
//!     → validation.rs (semantic checks)
//!     → OrchestratorConfig (validated, immutable)
//!     → consumed once at startup by lifecycle::startup
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → routing policy swapped atomically on the running Orchestrator
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Only the routing policy is hot-reloadable; thresholds need a restart

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AdminConfig, CircuitBreakerConfig, DegradationConfig, HealthCheckConfig, LogFormat,
    ObservabilityConfig, OllamaConfig, OpenAiConfig, OrchestratorConfig, Preset, ProvidersConfig,
    RetryConfig, TimeoutConfig,
};
