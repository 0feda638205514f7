//! Chat-completion client for the hosted model.
//!
//! One non-streaming request per call against an OpenAI-compatible
//! `/chat/completions` endpoint.

use crate::llm::retry::{with_retry, RetryPolicy};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Sampling temperature for analysis requests.
pub const ANALYSIS_TEMPERATURE: f32 = 0.3;

/// A single completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl CompletionRequest {
    pub fn new(system: impl Into<String>, prompt: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            system: system.into(),
            prompt: prompt.into(),
            max_tokens,
            temperature: ANALYSIS_TEMPERATURE,
        }
    }
}

/// Failures talking to the model service.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("request timed out after {0}s")]
    Timeout(u64),
    #[error("cannot connect to model service at {0}")]
    Connect(String),
    #[error("failed to send request: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("model API error {status}: {body}")]
    Api { status: u16, body: String },
    #[error("failed to decode model response: {0}")]
    Decode(#[source] reqwest::Error),
    #[error("model returned no completion")]
    EmptyResponse,
    #[error("invalid client configuration: {0}")]
    Config(String),
}

impl LlmError {
    /// Whether a fresh attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Timeout(_) | LlmError::Connect(_) | LlmError::Transport(_) => true,
            LlmError::Api { status, .. } => *status == 429 || *status >= 500,
            LlmError::Decode(_) | LlmError::EmptyResponse | LlmError::Config(_) => false,
        }
    }
}

/// Anything that can turn a prompt into raw completion text.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Model identifier, for logging.
    fn model_name(&self) -> &str;

    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError>;
}

/// Settings for [`OpenAiClient`].
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout_seconds: u64,
    /// Ask the service for a JSON object reply.
    pub json_mode: bool,
    pub retry: RetryPolicy,
}

/// Client for OpenAI-compatible chat-completion APIs.
pub struct OpenAiClient {
    config: OpenAiConfig,
    http_client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Result<Self, LlmError> {
        if config.api_key.trim().is_empty() {
            return Err(LlmError::Config("API key cannot be empty".to_string()));
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| LlmError::Config(format!("failed to create HTTP client: {}", e)))?;

        info!(
            "Initialized completion client for model {} at {}",
            config.model, config.base_url
        );

        Ok(Self {
            config,
            http_client,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    fn chat_request<'a>(&'a self, request: &'a CompletionRequest) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.prompt,
                },
            ],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            stream: false,
            response_format: self.config.json_mode.then_some(ResponseFormat {
                format_type: "json_object",
            }),
        }
    }

    async fn send_once(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let body = self.chat_request(request);

        let response = self
            .http_client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout(self.config.timeout_seconds)
                } else if e.is_connect() {
                    LlmError::Connect(self.config.base_url.clone())
                } else {
                    LlmError::Transport(e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            error!("Model API error {}: {}", status, body);
            return Err(LlmError::Api { status, body });
        }

        let chat: ChatResponse = response.json().await.map_err(LlmError::Decode)?;
        let choice = chat.choices.into_iter().next().ok_or(LlmError::EmptyResponse)?;

        if let Some(reason) = choice.finish_reason.as_deref() {
            debug!("Completion finished: {}", reason);
        }

        choice.message.content.ok_or(LlmError::EmptyResponse)
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    fn model_name(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let start = Instant::now();
        debug!(
            "Sending completion request ({} prompt chars, max_tokens {})",
            request.prompt.chars().count(),
            request.max_tokens
        );

        let content = with_retry(&self.config.retry, LlmError::is_retryable, || {
            self.send_once(request)
        })
        .await?;

        info!(
            "Received completion from {} in {:.1}s ({} chars)",
            self.config.model,
            start.elapsed().as_secs_f64(),
            content.chars().count()
        );
        Ok(content)
    }
}
