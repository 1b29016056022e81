//! Provider capability interface and the payload types that cross it.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::health::state::ProviderStatus;
use crate::providers::ProviderType;

/// Errors raised by a single provider call.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// Connection, DNS or body transfer failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// Backend answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Backend answered but the payload could not be understood.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Call exceeded its deadline.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Health check answered but reported the backend as unusable.
    #[error("unhealthy: {0}")]
    Unhealthy(String),

    /// Anything else reported by an adapter.
    #[error("{0}")]
    Other(String),
}

impl ProviderError {
    /// Short label for error accounting.
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::Transport(_) => "transport",
            ProviderError::Status { .. } => "status",
            ProviderError::InvalidResponse(_) => "invalid_response",
            ProviderError::Timeout(_) => "timeout",
            ProviderError::Unhealthy(_) => "unhealthy",
            ProviderError::Other(_) => "other",
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProviderError::Transport(format!("request timed out: {}", e))
        } else if e.is_decode() {
            ProviderError::InvalidResponse(e.to_string())
        } else {
            ProviderError::Transport(e.to_string())
        }
    }
}

/// Result type for provider calls.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Turn a non-2xx response into `ProviderError::Status`, keeping the body for diagnosis.
pub(crate) async fn error_for_status(resp: reqwest::Response) -> ProviderResult<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ProviderError::Status {
        status: status.as_u16(),
        body,
    })
}

/// Lazy, finite, non-restartable sequence of text fragments.
pub type ChatStream = BoxStream<'static, ProviderResult<String>>;

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// "system", "user" or "assistant".
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".into(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".into(), content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: "assistant".into(), content: content.into() }
    }
}

/// Generation options forwarded to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatOptions {
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: None,
        }
    }
}

/// Token accounting when the backend reports it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Completed chat answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub content: String,
    pub model: String,
    pub finish_reason: Option<String>,
    pub usage: Option<TokenUsage>,
}

/// Result of a provider health probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: ProviderStatus,
    pub model_info: Option<serde_json::Value>,
    pub error: Option<String>,
    pub latency_ms: f64,
}

impl HealthReport {
    pub fn healthy(latency_ms: f64, model_info: Option<serde_json::Value>) -> Self {
        Self {
            status: ProviderStatus::Healthy,
            model_info,
            error: None,
            latency_ms,
        }
    }

    pub fn unhealthy(latency_ms: f64, error: impl Into<String>) -> Self {
        Self {
            status: ProviderStatus::Unhealthy,
            model_info: None,
            error: Some(error.into()),
            latency_ms,
        }
    }
}

/// Model descriptor as listed by a backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub provider: ProviderType,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Capability implemented by every backend adapter.
///
/// Implementations must be cheap to share (`Arc<dyn AiProvider>`); the
/// orchestrator calls them concurrently.
#[async_trait]
pub trait AiProvider: Send + Sync {
    /// Which family this adapter belongs to.
    fn provider_type(&self) -> ProviderType;

    /// Embed one text.
    async fn embed(&self, text: &str, model: Option<&str>) -> ProviderResult<Vec<f32>>;

    /// Embed several texts, preserving order.
    async fn embed_many(
        &self,
        texts: &[String],
        model: Option<&str>,
    ) -> ProviderResult<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text, model).await?);
        }
        Ok(out)
    }

    /// Produce a complete chat answer.
    async fn chat(
        &self,
        messages: &[ChatMessage],
        model: Option<&str>,
        options: &ChatOptions,
    ) -> ProviderResult<ChatResponse>;

    /// Open a streaming chat answer.
    async fn chat_stream(
        &self,
        messages: &[ChatMessage],
        model: Option<&str>,
        options: &ChatOptions,
    ) -> ProviderResult<ChatStream>;

    /// Probe the backend. Never fails; problems are reported in the body.
    async fn health_check(&self) -> HealthReport;

    /// List models the backend can serve.
    async fn list_models(&self) -> ProviderResult<Vec<ModelInfo>>;
}
