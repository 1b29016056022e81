//! Shared fixtures for orchestrator integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use provider_orchestrator::config::{OrchestratorConfig, Preset};
use provider_orchestrator::providers::{
    AiProvider, ChatMessage, ChatOptions, ChatResponse, ChatStream, HealthReport, ModelInfo,
    ProviderError, ProviderResult, ProviderType,
};
use provider_orchestrator::Orchestrator;

/// Fail every call from now on.
pub const ALWAYS: u32 = u32::MAX;

/// Scripted in-process provider.
///
/// Counts every capability call (health probes excluded), fails the first
/// `failures` of them and sleeps `latency` before answering.
pub struct MockProvider {
    kind: ProviderType,
    calls: AtomicU32,
    failures: AtomicU32,
    latency: Mutex<Duration>,
    health: Mutex<HealthReport>,
    health_checks: AtomicU32,
}

impl MockProvider {
    pub fn healthy(kind: ProviderType) -> Arc<Self> {
        Self::failing_times(kind, 0)
    }

    pub fn failing(kind: ProviderType) -> Arc<Self> {
        Self::failing_times(kind, ALWAYS)
    }

    pub fn failing_times(kind: ProviderType, failures: u32) -> Arc<Self> {
        Arc::new(Self {
            kind,
            calls: AtomicU32::new(0),
            failures: AtomicU32::new(failures),
            latency: Mutex::new(Duration::ZERO),
            health: Mutex::new(HealthReport::healthy(1.0, None)),
            health_checks: AtomicU32::new(0),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn health_checks(&self) -> u32 {
        self.health_checks.load(Ordering::SeqCst)
    }

    pub fn set_failures(&self, failures: u32) {
        self.failures.store(failures, Ordering::SeqCst);
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = latency;
    }

    pub fn set_health(&self, report: HealthReport) {
        *self.health.lock().unwrap() = report;
    }

    async fn attempt(&self) -> ProviderResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let latency = *self.latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining == 0 {
            return Ok(());
        }
        if remaining != ALWAYS {
            self.failures.fetch_sub(1, Ordering::SeqCst);
        }
        Err(ProviderError::Transport(format!("{} connection refused", self.kind)))
    }
}

#[async_trait]
impl AiProvider for MockProvider {
    fn provider_type(&self) -> ProviderType {
        self.kind
    }

    async fn embed(&self, _text: &str, _model: Option<&str>) -> ProviderResult<Vec<f32>> {
        self.attempt().await?;
        Ok(vec![embedding_marker(self.kind); 4])
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        model: Option<&str>,
        _options: &ChatOptions,
    ) -> ProviderResult<ChatResponse> {
        self.attempt().await?;
        let prompt = messages.last().map(|m| m.content.as_str()).unwrap_or_default();
        Ok(ChatResponse {
            content: format!("{} answers: {}", self.kind, prompt),
            model: model.unwrap_or("mock-model").to_string(),
            finish_reason: Some("stop".into()),
            usage: None,
        })
    }

    async fn chat_stream(
        &self,
        _messages: &[ChatMessage],
        _model: Option<&str>,
        _options: &ChatOptions,
    ) -> ProviderResult<ChatStream> {
        self.attempt().await?;
        let fragments = vec![
            Ok("hello ".to_string()),
            Ok("from ".to_string()),
            Ok(self.kind.to_string()),
        ];
        Ok(stream::iter(fragments).boxed())
    }

    async fn health_check(&self) -> HealthReport {
        self.health_checks.fetch_add(1, Ordering::SeqCst);
        let latency = *self.latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        self.health.lock().unwrap().clone()
    }

    async fn list_models(&self) -> ProviderResult<Vec<ModelInfo>> {
        self.attempt().await?;
        Ok(vec![ModelInfo {
            name: format!("{}-model", self.kind),
            provider: self.kind,
            metadata: serde_json::Value::Null,
        }])
    }
}

/// Value every component of a mock embedding carries, to tell providers apart.
pub fn embedding_marker(kind: ProviderType) -> f32 {
    match kind {
        ProviderType::OpenAi => 1.0,
        ProviderType::Ollama => 2.0,
    }
}

/// Testing preset with fast, deterministic backoff and monitoring off.
pub fn test_config(priority: &[ProviderType]) -> OrchestratorConfig {
    let mut config = OrchestratorConfig::preset(Preset::Testing);
    config.service_priority = priority.to_vec();
    config.health_check.enabled = false;
    config.retry.max_attempts = 3;
    config.retry.base_delay_secs = 0.001;
    config.retry.max_delay_secs = 0.01;
    config.retry.jitter = false;
    config.circuit_breaker.failure_threshold = 5;
    config.circuit_breaker.recovery_timeout_secs = 60;
    config.circuit_breaker.success_threshold = 1;
    config.degradation.enabled = true;
    config.degradation.fallback_order = priority.iter().rev().copied().collect();
    config.timeouts.provider_call_secs = 5;
    config
}

pub fn orchestrator(providers: &[Arc<MockProvider>], config: &OrchestratorConfig) -> Orchestrator {
    let providers = providers
        .iter()
        .map(|p| Arc::clone(p) as Arc<dyn AiProvider>)
        .collect();
    Orchestrator::new(providers, config)
}

/// Start a mock HTTP backend answering every request with `f(path, body)`.
pub async fn start_programmable_backend<F>(f: F) -> SocketAddr
where
    F: Fn(&str, &str) -> (u16, String) + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            let (mut socket, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => break,
            };
            let f = Arc::clone(&f);
            tokio::spawn(async move {
                let request = read_request(&mut socket).await;
                let path = request
                    .lines()
                    .next()
                    .and_then(|line| line.split_whitespace().nth(1))
                    .unwrap_or("/")
                    .to_string();
                let request_body = request.split("\r\n\r\n").nth(1).unwrap_or_default();

                let (status, body) = f(&path, request_body);
                let status_text = match status {
                    200 => "200 OK",
                    404 => "404 Not Found",
                    429 => "429 Too Many Requests",
                    500 => "500 Internal Server Error",
                    503 => "503 Service Unavailable",
                    _ => "200 OK",
                };
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status_text,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

/// Read headers and a `Content-Length` body so the socket is drained before close.
async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut data = Vec::new();
    let mut buf = [0u8; 4096];

    let header_end = loop {
        if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        match socket.read(&mut buf).await {
            Ok(0) | Err(_) => return String::from_utf8_lossy(&data).into_owned(),
            Ok(n) => data.extend_from_slice(&buf[..n]),
        }
    };

    let headers = String::from_utf8_lossy(&data[..header_end]).to_ascii_lowercase();
    let content_length = headers
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while data.len() < header_end + content_length {
        match socket.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => data.extend_from_slice(&buf[..n]),
        }
    }

    String::from_utf8_lossy(&data).into_owned()
}
