//! AI provider subsystem.
//!
//! # Data Flow
//! ```text
//! config [providers.*] sections
//!     → factory.rs (build one adapter per configured family)
//!     → capability.rs (AiProvider trait: embed / chat / stream / health / models)
//!     → registry (wrapped in a ProviderHandle with breaker + counters)
//! ```
//!
//! # Design Decisions
//! - One capability trait; the orchestrator never branches on the vendor
//! - ProviderType is the key everywhere (no subclassing)
//! - Adapters are thin: they translate, they do not retry

pub mod capability;
pub mod factory;
pub mod ollama;
pub mod openai;
pub mod stream;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use capability::{
    AiProvider, ChatMessage, ChatOptions, ChatResponse, ChatStream, HealthReport, ModelInfo,
    ProviderError, ProviderResult,
};

/// Backend family tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    /// OpenAI-compatible cloud API.
    #[serde(rename = "openai")]
    OpenAi,
    /// Ollama local model server.
    Ollama,
}

impl ProviderType {
    /// All known provider families.
    pub const ALL: [ProviderType; 2] = [ProviderType::OpenAi, ProviderType::Ollama];

    /// Stable lowercase name used in config, logs and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderType::OpenAi => "openai",
            ProviderType::Ollama => "ollama",
        }
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown provider name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown provider type: {0}")]
pub struct UnknownProvider(pub String);

impl FromStr for ProviderType {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(ProviderType::OpenAi),
            "ollama" => Ok(ProviderType::Ollama),
            other => Err(UnknownProvider(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_type_names() {
        assert_eq!(ProviderType::OpenAi.to_string(), "openai");
        assert_eq!("Ollama".parse::<ProviderType>().unwrap(), ProviderType::Ollama);
        assert!("anthropic".parse::<ProviderType>().is_err());
    }

    #[test]
    fn test_provider_type_serde() {
        let json = serde_json::to_string(&[ProviderType::OpenAi, ProviderType::Ollama]).unwrap();
        assert_eq!(json, r#"["openai","ollama"]"#);

        let parsed: Vec<ProviderType> = serde_json::from_str(r#"["ollama","openai"]"#).unwrap();
        assert_eq!(parsed, vec![ProviderType::Ollama, ProviderType::OpenAi]);
    }
}
