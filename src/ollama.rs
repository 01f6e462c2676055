//! Minimal Ollama chat client and the `ChatModel` seam the services depend on.
//!
//! Only `/api/chat` with `stream: false` is used. Calls log model name, attempt,
//! latency and response size (not contents). Retries and the per-call timeout
//! live here; callers see a single result per call.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::config::Settings;

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
  #[error("transport error: {0}")]
  Transport(#[from] reqwest::Error),

  #[error("model HTTP {status}: {message}")]
  Status { status: u16, message: String },

  #[error("model returned an empty response")]
  EmptyResponse,
}

impl ModelError {
  fn is_retryable(&self) -> bool {
    match self {
      ModelError::Transport(_) => true,
      ModelError::Status { status, .. } => *status >= 500,
      ModelError::EmptyResponse => false,
    }
  }
}

/// One chat message. `images` holds base64 payloads for vision models.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChatMessage {
  pub role: String,
  pub content: String,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub images: Vec<String>,
}

impl ChatMessage {
  pub fn system(content: impl Into<String>) -> Self {
    Self { role: "system".into(), content: content.into(), images: vec![] }
  }

  pub fn user(content: impl Into<String>) -> Self {
    Self { role: "user".into(), content: content.into(), images: vec![] }
  }

  pub fn user_with_image(content: impl Into<String>, image_base64: String) -> Self {
    Self { role: "user".into(), content: content.into(), images: vec![image_base64] }
  }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChatOptions {
  pub temperature: f32,
  pub top_p: Option<f32>,
}

impl Default for ChatOptions {
  fn default() -> Self {
    Self { temperature: 0.7, top_p: None }
  }
}

/// Text generation collaborator. Implementations must be safe to call from
/// concurrent requests.
#[async_trait]
pub trait ChatModel: Send + Sync {
  async fn chat(&self, messages: &[ChatMessage], options: ChatOptions) -> Result<String, ModelError>;

  fn model_name(&self) -> &str;
}

#[derive(Clone)]
pub struct Ollama {
  pub client: reqwest::Client,
  pub base_url: String,
  pub model: String,
  pub max_retries: u32,
}

impl Ollama {
  pub fn from_settings(settings: &Settings) -> Result<Self, ModelError> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(settings.request_timeout_secs))
      .build()?;

    Ok(Self {
      client,
      base_url: settings.ollama_base_url.trim_end_matches('/').to_string(),
      model: settings.llm_model.clone(),
      max_retries: settings.max_retries,
    })
  }

  async fn chat_once(&self, messages: &[ChatMessage], options: ChatOptions) -> Result<String, ModelError> {
    let url = format!("{}/api/chat", self.base_url);
    let req = ChatRequest {
      model: &self.model,
      messages,
      stream: false,
      options: RequestOptions { temperature: options.temperature, top_p: options.top_p, num_predict: -1 },
    };

    let res = self
      .client
      .post(&url)
      .header(USER_AGENT, "qpgen-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .json(&req)
      .send()
      .await?;

    if !res.status().is_success() {
      let status = res.status().as_u16();
      let body = res.text().await.unwrap_or_default();
      let message = extract_ollama_error(&body).unwrap_or(body);
      return Err(ModelError::Status { status, message });
    }

    let body: ChatResponse = res.json().await?;
    let text = body.message.map(|m| m.content).unwrap_or_default().trim().to_string();
    if text.is_empty() {
      return Err(ModelError::EmptyResponse);
    }
    Ok(text)
  }
}

#[async_trait]
impl ChatModel for Ollama {
  #[instrument(level = "info", target = "model", skip(self, messages), fields(model = %self.model, messages = messages.len()))]
  async fn chat(&self, messages: &[ChatMessage], options: ChatOptions) -> Result<String, ModelError> {
    let mut attempt = 0u32;
    loop {
      attempt += 1;
      let start = Instant::now();
      match self.chat_once(messages, options).await {
        Ok(text) => {
          info!(target: "model", attempt, elapsed = ?start.elapsed(), response_len = text.len(), "Model response received");
          return Ok(text);
        }
        Err(e) if e.is_retryable() && attempt <= self.max_retries => {
          warn!(target: "model", attempt, elapsed = ?start.elapsed(), error = %e, "Model call failed; retrying");
          tokio::time::sleep(Duration::from_millis(500 * u64::from(attempt))).await;
        }
        Err(e) => {
          warn!(target: "model", attempt, elapsed = ?start.elapsed(), error = %e, "Model call failed");
          return Err(e);
        }
      }
    }
  }

  fn model_name(&self) -> &str {
    &self.model
  }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatRequest<'a> {
  model: &'a str,
  messages: &'a [ChatMessage],
  stream: bool,
  options: RequestOptions,
}

#[derive(Serialize)]
struct RequestOptions {
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  top_p: Option<f32>,
  num_predict: i32,
}

#[derive(Deserialize)]
struct ChatResponse {
  #[serde(default)]
  message: Option<ChatResponseMessage>,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
  #[serde(default)]
  content: String,
}

fn extract_ollama_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap {
    error: String,
  }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error)
}
