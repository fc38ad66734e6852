//! Request-level error taxonomy and its HTTP rendering.
//!
//! Malformed model output becomes 422 with the raw text attached for diagnostics.
//! Upstream and storage failures become 500 with a short detail; the full error
//! chain is logged server-side only.

use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use thiserror::Error;
use tracing::error;

use crate::gemini::ModelError;
use crate::history::HistoryError;
use crate::protocol::ErrorOut;

#[derive(Debug, Error)]
pub enum AppError {
  #[error("invalid request: {0}")]
  Validation(String),

  #[error("failed to parse challenges: {detail}")]
  ChallengeParse { detail: String, raw_output: String },

  #[error("expected array of challenges")]
  NotAnArray { raw_output: String },

  #[error("no valid challenges generated")]
  NoValidChallenges { raw_output: String },

  #[error("{context}: {source}")]
  Upstream { context: &'static str, #[source] source: ModelError },

  #[error("{context}: {source}")]
  History { context: &'static str, #[source] source: HistoryError },
}

impl AppError {
  pub fn status(&self) -> StatusCode {
    match self {
      AppError::Validation(_)
      | AppError::ChallengeParse { .. }
      | AppError::NotAnArray { .. }
      | AppError::NoValidChallenges { .. } => StatusCode::UNPROCESSABLE_ENTITY,
      AppError::Upstream { .. } | AppError::History { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  fn body(self) -> ErrorOut {
    match self {
      AppError::Validation(detail) => ErrorOut::new("Invalid request", detail),
      AppError::ChallengeParse { detail, raw_output } => {
        ErrorOut::new("Failed to parse challenges", detail).with_raw(raw_output)
      }
      AppError::NotAnArray { raw_output } => {
        ErrorOut::new("Failed to parse challenges", "Expected array of challenges").with_raw(raw_output)
      }
      AppError::NoValidChallenges { raw_output } => ErrorOut::new(
        "No valid challenges generated",
        "Every generated challenge failed validation",
      )
      .with_raw(raw_output),
      AppError::Upstream { context, source } => {
        ErrorOut::new("Internal server error", format!("{context}: {source}"))
      }
      AppError::History { context, source } => {
        ErrorOut::new("Internal server error", format!("{context}: {source}"))
      }
    }
  }
}

impl From<crate::agent::AgentError> for AppError {
  fn from(e: crate::agent::AgentError) -> Self {
    match e {
      crate::agent::AgentError::Model(source) => AppError::Upstream { context: "model call failed", source },
      crate::agent::AgentError::History(source) => AppError::History { context: "conversation store failed", source },
    }
  }
}

impl IntoResponse for AppError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      error!(target: "careertrials_backend", error = ?self, "Request failed");
    }
    (status, Json(self.body())).into_response()
  }
}

/// Body for panics caught by `CatchPanicLayer`.
pub fn panic_response(err: Box<dyn std::any::Any + Send + 'static>) -> Response {
  let detail = if let Some(s) = err.downcast_ref::<String>() {
    s.clone()
  } else if let Some(s) = err.downcast_ref::<&str>() {
    s.to_string()
  } else {
    "unknown panic".to_string()
  };
  error!(target: "careertrials_backend", %detail, "Handler panicked");
  (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorOut::new("Internal server error", detail))).into_response()
}
