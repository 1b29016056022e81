//! OpenAI-compatible cloud adapter.
//!
//! # Responsibilities
//! - Translate capability calls to `/embeddings`, `/chat/completions` and `/models`
//! - Decode SSE `data:` frames into text fragments for streaming chat
//!
//! # Design Decisions
//! - No retries here; failures surface as `ProviderError` for the orchestrator
//! - `base_url` includes the API version prefix (e.g. `.../v1`)

use std::time::Instant;

use async_trait::async_trait;
use futures_util::{future, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::OpenAiConfig;
use crate::providers::capability::{
    error_for_status, AiProvider, ChatMessage, ChatOptions, ChatResponse, ChatStream,
    HealthReport, ModelInfo, ProviderError, ProviderResult, TokenUsage,
};
use crate::providers::stream;
use crate::providers::ProviderType;

pub struct OpenAiProvider {
    client: reqwest::Client,
    config: OpenAiConfig,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatCompletion {
    model: String,
    choices: Vec<Choice>,
    usage: Option<TokenUsage>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
    delta: Option<ChoiceMessage>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct StreamChunk {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct ModelList {
    data: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    id: String,
    #[serde(default)]
    owned_by: Option<String>,
    #[serde(default)]
    created: Option<i64>,
}

impl OpenAiProvider {
    pub fn new(client: reqwest::Client, config: OpenAiConfig) -> Self {
        Self { client, config }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .request(method, self.endpoint(path))
            .bearer_auth(&self.config.api_key);
        if let Some(org) = &self.config.organization {
            builder = builder.header("OpenAI-Organization", org);
        }
        builder
    }

    async fn embeddings(&self, input: serde_json::Value, model: Option<&str>) -> ProviderResult<Vec<Vec<f32>>> {
        let model = model.unwrap_or(&self.config.embedding_model);
        let resp = self
            .request(reqwest::Method::POST, "embeddings")
            .json(&json!({ "model": model, "input": input }))
            .send()
            .await?;
        let mut body: EmbeddingResponse = error_for_status(resp).await?.json().await?;
        body.data.sort_by_key(|d| d.index);
        Ok(body.data.into_iter().map(|d| d.embedding).collect())
    }

    async fn fetch_models(&self) -> ProviderResult<Vec<ModelEntry>> {
        let resp = self.request(reqwest::Method::GET, "models").send().await?;
        let list: ModelList = error_for_status(resp).await?.json().await?;
        Ok(list.data)
    }
}

/// Extract the text fragment carried by one SSE line, if any.
fn parse_sse_line(line: &str) -> Option<ProviderResult<String>> {
    let payload = line.strip_prefix("data:")?.trim();
    if payload == "[DONE]" {
        return None;
    }
    match serde_json::from_str::<StreamChunk>(payload) {
        Ok(chunk) => chunk
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.delta)
            .and_then(|d| d.content)
            .filter(|s| !s.is_empty())
            .map(Ok),
        Err(e) => Some(Err(ProviderError::InvalidResponse(e.to_string()))),
    }
}

#[async_trait]
impl AiProvider for OpenAiProvider {
    fn provider_type(&self) -> ProviderType {
        ProviderType::OpenAi
    }

    async fn embed(&self, text: &str, model: Option<&str>) -> ProviderResult<Vec<f32>> {
        self.embeddings(json!(text), model)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("empty embedding list".into()))
    }

    async fn embed_many(&self, texts: &[String], model: Option<&str>) -> ProviderResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let vectors = self.embeddings(json!(texts), model).await?;
        if vectors.len() != texts.len() {
            return Err(ProviderError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                vectors.len()
            )));
        }
        Ok(vectors)
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        model: Option<&str>,
        options: &ChatOptions,
    ) -> ProviderResult<ChatResponse> {
        let request = ChatRequest {
            model: model.unwrap_or(&self.config.chat_model),
            messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            stream: false,
        };
        let resp = self
            .request(reqwest::Method::POST, "chat/completions")
            .json(&request)
            .send()
            .await?;
        let completion: ChatCompletion = error_for_status(resp).await?.json().await?;

        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("no choices in completion".into()))?;

        Ok(ChatResponse {
            content: choice.message.and_then(|m| m.content).unwrap_or_default(),
            model: completion.model,
            finish_reason: choice.finish_reason,
            usage: completion.usage,
        })
    }

    async fn chat_stream(
        &self,
        messages: &[ChatMessage],
        model: Option<&str>,
        options: &ChatOptions,
    ) -> ProviderResult<ChatStream> {
        let request = ChatRequest {
            model: model.unwrap_or(&self.config.chat_model),
            messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            stream: true,
        };
        let resp = self
            .request(reqwest::Method::POST, "chat/completions")
            .json(&request)
            .send()
            .await?;
        let resp = error_for_status(resp).await?;

        let fragments = stream::lines(resp.bytes_stream()).filter_map(|line| {
            future::ready(match line {
                Ok(line) => parse_sse_line(&line),
                Err(e) => Some(Err(e)),
            })
        });
        Ok(fragments.boxed())
    }

    async fn health_check(&self) -> HealthReport {
        let started = Instant::now();
        match self.fetch_models().await {
            Ok(models) => {
                let available = models.iter().any(|m| m.id == self.config.chat_model);
                HealthReport::healthy(
                    started.elapsed().as_secs_f64() * 1000.0,
                    Some(json!({
                        "model_count": models.len(),
                        "chat_model": self.config.chat_model,
                        "chat_model_available": available,
                    })),
                )
            }
            Err(e) => HealthReport::unhealthy(started.elapsed().as_secs_f64() * 1000.0, e.to_string()),
        }
    }

    async fn list_models(&self) -> ProviderResult<Vec<ModelInfo>> {
        Ok(self
            .fetch_models()
            .await?
            .into_iter()
            .map(|m| ModelInfo {
                name: m.id,
                provider: ProviderType::OpenAi,
                metadata: json!({ "owned_by": m.owned_by, "created": m.created }),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sse_delta_extraction() {
        let line = r#"data: {"choices":[{"delta":{"content":"Hel"},"finish_reason":null}]}"#;
        assert_eq!(parse_sse_line(line).unwrap().unwrap(), "Hel");
    }

    #[test]
    fn test_sse_skips_done_and_empty_deltas() {
        assert!(parse_sse_line("data: [DONE]").is_none());
        assert!(parse_sse_line(r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#).is_none());
        assert!(parse_sse_line(": keep-alive").is_none());
    }

    #[test]
    fn test_sse_malformed_payload() {
        assert!(matches!(
            parse_sse_line("data: {not json"),
            Some(Err(ProviderError::InvalidResponse(_)))
        ));
    }

    #[test]
    fn test_endpoint_joins_without_double_slash() {
        let provider = OpenAiProvider::new(
            reqwest::Client::new(),
            OpenAiConfig {
                base_url: "https://api.example.com/v1/".into(),
                ..Default::default()
            },
        );
        assert_eq!(provider.endpoint("models"), "https://api.example.com/v1/models");
    }
}
