//! AI Provider Orchestrator Library

pub mod admin;
pub mod config;
pub mod health;
pub mod lifecycle;
pub mod observability;
pub mod orchestrator;
pub mod providers;
pub mod registry;
pub mod resilience;

pub use config::schema::OrchestratorConfig;
pub use lifecycle::Shutdown;
pub use orchestrator::{Orchestrator, OrchestratorError, Outcome};
pub use providers::{AiProvider, ProviderType};
