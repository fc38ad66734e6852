//! Core behaviors behind the HTTP handlers.
//!
//! This includes:
//!   - the phase-1 message flow (classification, bounded corrective retry)
//!   - the phase-2 challenge pipeline (extract, parse, validate)

use serde_json::Value;
use tracing::{error, info, instrument, warn};

use crate::domain::Challenge;
use crate::error::AppError;
use crate::extract::clean_json;
use crate::session::SessionKey;
use crate::state::AppState;
use crate::util::trunc_for_log;
use crate::validate::validate_challenges;

/// Corrective re-asks allowed when the model keeps leaking internal text.
pub const MAX_FORMAT_RETRIES: usize = 2;

#[derive(Debug)]
pub struct Reply {
  pub text: String,
  /// The message was the phase-transition command.
  pub is_complete: bool,
}

/// Forward one user message to the session's agent and return a user-facing reply.
///
/// Internal-looking replies are re-asked up to `MAX_FORMAT_RETRIES` times with a
/// corrective instruction; whatever comes back last goes through the classifier
/// fallback. The generate command bypasses classification.
#[instrument(level = "info", skip(state, message), fields(%key, message_len = message.len()))]
pub async fn send_message(state: &AppState, key: &SessionKey, message: &str) -> Result<Reply, AppError> {
  let agent = state.sessions.get_or_create(key).await;

  if message == state.prompts.generate_command {
    let raw = agent.run(message).await?;
    info!(target: "challenge", %key, "Generate command received via message endpoint");
    return Ok(Reply { text: raw.trim().to_string(), is_complete: true });
  }

  let mut raw = agent.run(message).await?;
  let mut retries = 0;
  while retries < MAX_FORMAT_RETRIES && state.classifier.is_internal_response(&raw) {
    retries += 1;
    warn!(target: "careertrials_backend", %key, retry = retries, "Got internal response, asking again");
    raw = agent.run(&state.prompts.corrective_instruction).await?;
  }

  Ok(Reply { text: state.classifier.extract_user_response(&raw), is_complete: false })
}

/// Switch the session's agent to phase 2 and return the validated challenges.
#[instrument(level = "info", skip(state), fields(%key))]
pub async fn generate_challenges(state: &AppState, key: &SessionKey) -> Result<Vec<Challenge>, AppError> {
  let agent = state.sessions.get_or_create(key).await;
  let raw = agent.run(&state.prompts.generate_command).await?;
  let challenges = parse_challenge_batch(raw.trim())?;
  info!(target: "challenge", %key, total = challenges.len(), "Successfully generated challenges");
  Ok(challenges)
}

/// Turn raw model output into a non-empty list of valid challenges.
pub fn parse_challenge_batch(raw: &str) -> Result<Vec<Challenge>, AppError> {
  let cleaned = clean_json(raw);

  let value: Value = serde_json::from_str(&cleaned).map_err(|e| {
    error!(target: "challenge", error = %e, raw = %trunc_for_log(raw, 500), "JSON decode error");
    AppError::ChallengeParse { detail: e.to_string(), raw_output: raw.to_string() }
  })?;

  let Value::Array(items) = value else {
    error!(target: "challenge", raw = %trunc_for_log(raw, 500), "Model output is JSON but not an array");
    return Err(AppError::NotAnArray { raw_output: raw.to_string() });
  };

  let received = items.len();
  let valid = validate_challenges(items);
  if valid.is_empty() {
    error!(target: "challenge", received, "No valid challenges generated");
    return Err(AppError::NoValidChallenges { raw_output: raw.to_string() });
  }
  if valid.len() < received {
    warn!(target: "challenge", received, kept = valid.len(), "Dropped invalid challenges");
  }
  Ok(valid)
}
