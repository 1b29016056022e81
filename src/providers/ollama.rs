//! Ollama local server adapter.
//!
//! Endpoints: `/api/embeddings`, `/api/chat` (NDJSON when streaming), `/api/tags`.

use std::time::Instant;

use async_trait::async_trait;
use futures_util::{future, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::OllamaConfig;
use crate::providers::capability::{
    error_for_status, AiProvider, ChatMessage, ChatOptions, ChatResponse, ChatStream,
    HealthReport, ModelInfo, ProviderError, ProviderResult, TokenUsage,
};
use crate::providers::stream;
use crate::providers::ProviderType;

pub struct OllamaProvider {
    client: reqwest::Client,
    config: OllamaConfig,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: GenerationOptions,
}

#[derive(Serialize)]
struct GenerationOptions {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Deserialize)]
struct ChatChunk {
    #[serde(default)]
    model: String,
    message: Option<ChunkMessage>,
    #[serde(default)]
    done: bool,
    done_reason: Option<String>,
    prompt_eval_count: Option<u32>,
    eval_count: Option<u32>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct ChunkMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct TagList {
    #[serde(default)]
    models: Vec<Tag>,
}

#[derive(Deserialize)]
struct Tag {
    name: String,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default)]
    modified_at: Option<String>,
    #[serde(default)]
    digest: Option<String>,
}

impl OllamaProvider {
    pub fn new(client: reqwest::Client, config: OllamaConfig) -> Self {
        Self { client, config }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn chat_request<'a>(
        &'a self,
        messages: &'a [ChatMessage],
        model: Option<&'a str>,
        options: &ChatOptions,
        stream: bool,
    ) -> ChatRequest<'a> {
        ChatRequest {
            model: model.unwrap_or(&self.config.chat_model),
            messages,
            stream,
            options: GenerationOptions {
                temperature: options.temperature,
                num_predict: options.max_tokens,
            },
        }
    }

    async fn tags(&self) -> ProviderResult<Vec<Tag>> {
        let resp = self.client.get(self.endpoint("tags")).send().await?;
        let list: TagList = error_for_status(resp).await?.json().await?;
        Ok(list.models)
    }
}

fn parse_ndjson_line(line: &str) -> Option<ProviderResult<String>> {
    match serde_json::from_str::<ChatChunk>(line) {
        Ok(chunk) => {
            if let Some(err) = chunk.error {
                return Some(Err(ProviderError::Other(err)));
            }
            chunk
                .message
                .map(|m| m.content)
                .filter(|s| !s.is_empty())
                .map(Ok)
        }
        Err(e) => Some(Err(ProviderError::InvalidResponse(e.to_string()))),
    }
}

#[async_trait]
impl AiProvider for OllamaProvider {
    fn provider_type(&self) -> ProviderType {
        ProviderType::Ollama
    }

    async fn embed(&self, text: &str, model: Option<&str>) -> ProviderResult<Vec<f32>> {
        let model = model.unwrap_or(&self.config.embedding_model);
        let resp = self
            .client
            .post(self.endpoint("embeddings"))
            .json(&json!({ "model": model, "prompt": text }))
            .send()
            .await?;
        let body: EmbeddingResponse = error_for_status(resp).await?.json().await?;
        if body.embedding.is_empty() {
            return Err(ProviderError::InvalidResponse("empty embedding".into()));
        }
        Ok(body.embedding)
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        model: Option<&str>,
        options: &ChatOptions,
    ) -> ProviderResult<ChatResponse> {
        let resp = self
            .client
            .post(self.endpoint("chat"))
            .json(&self.chat_request(messages, model, options, false))
            .send()
            .await?;
        let chunk: ChatChunk = error_for_status(resp).await?.json().await?;
        if let Some(err) = chunk.error {
            return Err(ProviderError::Other(err));
        }

        let usage = match (chunk.prompt_eval_count, chunk.eval_count) {
            (Some(prompt), Some(completion)) => Some(TokenUsage {
                prompt_tokens: prompt,
                completion_tokens: completion,
                total_tokens: prompt + completion,
            }),
            _ => None,
        };

        Ok(ChatResponse {
            content: chunk.message.map(|m| m.content).unwrap_or_default(),
            model: chunk.model,
            finish_reason: chunk.done_reason.or_else(|| chunk.done.then(|| "stop".to_string())),
            usage,
        })
    }

    async fn chat_stream(
        &self,
        messages: &[ChatMessage],
        model: Option<&str>,
        options: &ChatOptions,
    ) -> ProviderResult<ChatStream> {
        let resp = self
            .client
            .post(self.endpoint("chat"))
            .json(&self.chat_request(messages, model, options, true))
            .send()
            .await?;
        let resp = error_for_status(resp).await?;

        let fragments = stream::lines(resp.bytes_stream()).filter_map(|line| {
            future::ready(match line {
                Ok(line) => parse_ndjson_line(&line),
                Err(e) => Some(Err(e)),
            })
        });
        Ok(fragments.boxed())
    }

    async fn health_check(&self) -> HealthReport {
        let started = Instant::now();
        match self.tags().await {
            Ok(tags) => {
                let elapsed = started.elapsed().as_secs_f64() * 1000.0;
                let names: Vec<&str> = tags.iter().map(|t| t.name.as_str()).collect();
                // Ollama reports "llama2:latest" for a bare "llama2".
                let wanted = self.config.chat_model.as_str();
                let model_loaded = names
                    .iter()
                    .any(|n| *n == wanted || n.split(':').next() == Some(wanted));
                if model_loaded {
                    HealthReport::healthy(elapsed, Some(json!({ "models": names })))
                } else {
                    HealthReport::unhealthy(
                        elapsed,
                        format!("model '{}' not pulled", self.config.chat_model),
                    )
                }
            }
            Err(e) => HealthReport::unhealthy(started.elapsed().as_secs_f64() * 1000.0, e.to_string()),
        }
    }

    async fn list_models(&self) -> ProviderResult<Vec<ModelInfo>> {
        Ok(self
            .tags()
            .await?
            .into_iter()
            .map(|t| ModelInfo {
                name: t.name,
                provider: ProviderType::Ollama,
                metadata: json!({ "size": t.size, "modified_at": t.modified_at, "digest": t.digest }),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ndjson_fragment() {
        let line = r#"{"model":"llama2","message":{"role":"assistant","content":"Hi"},"done":false}"#;
        assert_eq!(parse_ndjson_line(line).unwrap().unwrap(), "Hi");
    }

    #[test]
    fn test_ndjson_final_chunk_is_skipped() {
        let line = r#"{"model":"llama2","message":{"role":"assistant","content":""},"done":true}"#;
        assert!(parse_ndjson_line(line).is_none());
    }

    #[test]
    fn test_ndjson_error_chunk() {
        let line = r#"{"error":"model not found"}"#;
        assert!(matches!(parse_ndjson_line(line), Some(Err(ProviderError::Other(_)))));
    }

    #[test]
    fn test_chat_request_maps_max_tokens() {
        let provider = OllamaProvider::new(reqwest::Client::new(), OllamaConfig::default());
        let messages = vec![ChatMessage::user("hello")];
        let options = ChatOptions {
            temperature: 0.2,
            max_tokens: Some(64),
        };
        let body = serde_json::to_value(provider.chat_request(&messages, None, &options, false)).unwrap();

        assert_eq!(body["model"], "llama2");
        assert_eq!(body["options"]["num_predict"], 64);
        assert_eq!(body["stream"], false);
    }
}
