//! Minimal Gemini client for the assessment conversation.
//!
//! We only call `generateContent` with a system instruction plus the whole
//! conversation so far, and read back plain text.
//! Calls are instrumented and log model names, latencies, and reply sizes (not contents).
//!
//! NOTE: the API key travels in a header, never in the URL, so it cannot end up in logs.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, instrument};

use crate::config::Config;
use crate::history::{Role, Turn};

#[derive(Debug, Error)]
pub enum ModelError {
  #[error("model request timed out")]
  Timeout,
  #[error("model request failed: {0}")]
  Transport(String),
  #[error("model HTTP {status}: {message}")]
  Status { status: u16, message: String },
  #[error("model response could not be decoded: {0}")]
  Decode(String),
  #[error("model returned no text")]
  EmptyReply,
}

impl From<reqwest::Error> for ModelError {
  fn from(e: reqwest::Error) -> Self {
    if e.is_timeout() { ModelError::Timeout } else { ModelError::Transport(e.to_string()) }
  }
}

/// "Send a turn, receive text": the only thing the rest of the crate needs
/// from the model provider.
#[async_trait]
pub trait ChatModel: Send + Sync {
  /// Model identifier, reported by the health endpoint.
  fn model_id(&self) -> &str;

  /// Produce the next model reply given the system prompt and the full
  /// conversation, whose last turn is the user's.
  async fn complete(&self, system: &str, turns: &[Turn]) -> Result<String, ModelError>;
}

#[derive(Clone)]
pub struct GeminiClient {
  client: reqwest::Client,
  api_key: String,
  pub base_url: String,
  pub model: String,
}

impl GeminiClient {
  pub fn from_config(cfg: &Config) -> Result<Self, ModelError> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(cfg.model_timeout_secs))
      .build()?;
    Ok(Self {
      client,
      api_key: cfg.google_api_key.clone(),
      base_url: cfg.gemini_base_url.trim_end_matches('/').to_string(),
      model: cfg.default_model.clone(),
    })
  }
}

#[async_trait]
impl ChatModel for GeminiClient {
  fn model_id(&self) -> &str {
    &self.model
  }

  #[instrument(level = "info", target = "model", skip(self, system, turns), fields(model = %self.model, turns = turns.len()))]
  async fn complete(&self, system: &str, turns: &[Turn]) -> Result<String, ModelError> {
    let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model);
    let req = GenerateRequest {
      system_instruction: Content { role: None, parts: vec![Part { text: system.to_string() }] },
      contents: turns
        .iter()
        .map(|t| Content {
          role: Some(match t.role {
            Role::User => "user",
            Role::Model => "model",
          }),
          parts: vec![Part { text: t.content.clone() }],
        })
        .collect(),
    };

    let start = Instant::now();
    let res = self.client.post(&url)
      .header(USER_AGENT, concat!("careertrials-backend/", env!("CARGO_PKG_VERSION")))
      .header(CONTENT_TYPE, "application/json")
      .header("x-goog-api-key", &self.api_key)
      .json(&req).send().await?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let message = extract_gemini_error(&body).unwrap_or(body);
      error!(target: "model", elapsed = ?start.elapsed(), %status, "Model call failed");
      return Err(ModelError::Status { status: status.as_u16(), message });
    }

    let body: GenerateResponse = res.json().await.map_err(|e| ModelError::Decode(e.to_string()))?;
    if let Some(usage) = &body.usage_metadata {
      info!(target: "model", prompt_tokens = ?usage.prompt_token_count, completion_tokens = ?usage.candidates_token_count, total_tokens = ?usage.total_token_count, "Model usage");
    }

    let text = body.first_text().ok_or(ModelError::EmptyReply)?;
    info!(target: "model", elapsed = ?start.elapsed(), reply_len = text.len(), "Model reply received");
    Ok(text)
  }
}

// --- generateContent DTOs ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
  system_instruction: Content,
  contents: Vec<Content>,
}
#[derive(Serialize)]
struct Content {
  #[serde(skip_serializing_if = "Option::is_none")]
  role: Option<&'static str>,
  parts: Vec<Part>,
}
#[derive(Serialize, Deserialize)]
struct Part { #[serde(default)] text: String }

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
  #[serde(default)] candidates: Vec<Candidate>,
  #[serde(default)] usage_metadata: Option<UsageMetadata>,
}
#[derive(Deserialize)]
struct Candidate { #[serde(default)] content: Option<CandidateContent> }
#[derive(Deserialize)]
struct CandidateContent { #[serde(default)] parts: Vec<Part> }
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
  #[serde(default)] prompt_token_count: Option<u32>,
  #[serde(default)] candidates_token_count: Option<u32>,
  #[serde(default)] total_token_count: Option<u32>,
}

impl GenerateResponse {
  /// Concatenated text parts of the first candidate, if any are non-empty.
  fn first_text(&self) -> Option<String> {
    let parts = &self.candidates.first()?.content.as_ref()?.parts;
    let text: String = parts.iter().map(|p| p.text.as_str()).collect();
    if text.trim().is_empty() { None } else { Some(text) }
  }
}

/// Try to extract a clean error message from a Google API error body.
fn extract_gemini_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}
