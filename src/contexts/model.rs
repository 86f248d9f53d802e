use crate::data::Conversation;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Errors that can occur while calling the chat model
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("Model request failed: {0}")]
    Transport(String),

    #[error("Model returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Model rate limited the request (retry after {retry_after_ms} ms)")]
    RateLimited { retry_after_ms: u64 },

    #[error("Model reply was malformed: {0}")]
    MalformedReply(String),

    #[error("Model did not reply within {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Model call was cancelled")]
    Cancelled,
}

/// Opaque request/response chat capability.
///
/// Implementations receive the full ordered conversation on every call.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn send(&self, conversation: &Conversation, temperature: f32) -> Result<String, ModelError>;
}

/// A chat model bound to one temperature and call timeout.
///
/// The generation and review sessions each hold their own handle, usually
/// over the same underlying client with different temperatures.
#[derive(Clone)]
pub struct ModelHandle {
    model: Arc<dyn ChatModel>,
    temperature: f32,
    timeout: Duration,
}

impl ModelHandle {
    pub fn new(model: Arc<dyn ChatModel>, temperature: f32, timeout: Duration) -> Self {
        Self {
            model,
            temperature,
            timeout,
        }
    }

    /// Sends `conversation`, giving up on timeout or when `cancel` fires.
    pub async fn send(
        &self,
        conversation: &Conversation,
        cancel: &CancellationToken,
    ) -> Result<String, ModelError> {
        debug!(
            turns = conversation.len(),
            temperature = self.temperature,
            "sending conversation to model"
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ModelError::Cancelled),
            reply = tokio::time::timeout(self.timeout, self.model.send(conversation, self.temperature)) => {
                reply.unwrap_or(Err(ModelError::Timeout {
                    seconds: self.timeout.as_secs(),
                }))
            }
        }
    }
}

impl fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelHandle")
            .field("temperature", &self.temperature)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
}

#[derive(Debug, Clone, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiError {
    error: ErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Chat model backed by an OpenAI-compatible `chat/completions` endpoint
pub struct OpenAiChatModel {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiChatModel {
    /// Creates a new client
    ///
    /// # Arguments
    /// * `api_key` - Bearer token for the endpoint
    /// * `base_url` - API root, e.g. "https://api.openai.com/v1"
    /// * `model` - Model name sent with every request
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    async fn send(&self, conversation: &Conversation, temperature: f32) -> Result<String, ModelError> {
        let request = CompletionRequest {
            model: &self.model,
            messages: conversation
                .turns()
                .iter()
                .map(|turn| Message {
                    role: turn.role.as_str(),
                    content: &turn.content,
                })
                .collect(),
            temperature,
        };

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| ModelError::Transport(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let retry_after_ms = parse_retry_after_ms(response.headers()).unwrap_or(0);

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let message = serde_json::from_str::<ApiError>(&error_text)
                .map(|api_error| api_error.error.message)
                .unwrap_or(error_text);

            return Err(match status {
                StatusCode::TOO_MANY_REQUESTS => ModelError::RateLimited { retry_after_ms },
                _ => ModelError::Status {
                    status: status.as_u16(),
                    message,
                },
            });
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| ModelError::MalformedReply(format!("Failed to parse response: {}", e)))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ModelError::MalformedReply("No completion in response".to_string()))
    }
}

impl fmt::Debug for OpenAiChatModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiChatModel")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

fn parse_retry_after_ms(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get("retry-after")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<f64>().ok())
        .map(|seconds| (seconds * 1000.0) as u64)
}
