//! Public HTTP request/response structs (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::domain::Challenge;

pub const MAX_MESSAGE_CHARS: usize = 2000;

#[derive(Debug, Deserialize)]
pub struct MessageIn {
  pub message: String,
}

impl MessageIn {
  /// Length is checked on the raw text (1–2000 chars), emptiness after trimming.
  /// Returns the trimmed message.
  pub fn validated(self) -> Result<String, String> {
    let len = self.message.chars().count();
    if len == 0 {
      return Err("message must contain at least 1 character".into());
    }
    if len > MAX_MESSAGE_CHARS {
      return Err(format!("message must contain at most {MAX_MESSAGE_CHARS} characters"));
    }
    let trimmed = self.message.trim();
    if trimmed.is_empty() {
      return Err("Message cannot be empty".into());
    }
    Ok(trimmed.to_string())
  }
}

#[derive(Debug, Serialize)]
pub struct MessageOut {
  pub response: String,
  pub session_id: String,
  pub user_id: String,
  pub is_complete: bool,
}

#[derive(Debug, Serialize)]
pub struct ChallengesOut {
  pub challenges: Vec<Challenge>,
  pub total: usize,
  pub session_id: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorOut {
  pub error: String,
  pub detail: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub raw_output: Option<String>,
}

impl ErrorOut {
  pub fn new(error: impl Into<String>, detail: impl Into<String>) -> Self {
    Self { error: error.into(), detail: detail.into(), raw_output: None }
  }

  pub fn with_raw(mut self, raw: impl Into<String>) -> Self {
    self.raw_output = Some(raw.into());
    self
  }
}

#[derive(Debug, Serialize)]
pub struct SessionStatusOut {
  pub session_id: String,
  pub user_id: String,
  pub active: bool,
  pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ClearedOut {
  pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct RootOut {
  pub status: &'static str,
  pub service: &'static str,
  pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HealthOut {
  pub status: &'static str,
  pub database: &'static str,
  pub model: String,
}
