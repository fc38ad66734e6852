//! Detects internal reasoning or task-format text leaking out of the model in
//! place of a conversational reply, and substitutes a safe fallback.
//!
//! The policy is a pure function over a configurable phrase list, so it can be
//! tuned from the agent TOML without touching control flow.

use serde::Deserialize;
use tracing::warn;

use crate::util::trunc_for_log;

/// Phrases that only appear when the model narrates its own bookkeeping.
pub const DEFAULT_INTERNAL_PHRASES: &[&str] = &[
  "adicionar a seguinte informação",
  "task\":",
  "armazenar na memória",
  "salvar informação",
  "registrar resposta",
];

pub const DEFAULT_FALLBACK_REPLY: &str = "Entendi! Qual é a sua próxima resposta?";

#[derive(Clone, Debug)]
pub struct ResponseClassifier {
  /// Stored lowercased; matching is case-insensitive.
  phrases: Vec<String>,
  fallback: String,
}

impl Default for ResponseClassifier {
  fn default() -> Self {
    Self::new(DEFAULT_INTERNAL_PHRASES.iter().copied(), DEFAULT_FALLBACK_REPLY)
  }
}

impl ResponseClassifier {
  pub fn new<I, S>(phrases: I, fallback: impl Into<String>) -> Self
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    Self {
      phrases: phrases.into_iter().map(|p| p.as_ref().to_lowercase()).collect(),
      fallback: fallback.into(),
    }
  }

  /// True when `text` looks like an internal planning artifact rather than
  /// something meant for the user.
  pub fn is_internal_response(&self, text: &str) -> bool {
    let trimmed = text.trim();
    let lower = trimmed.to_lowercase();

    if (lower.starts_with("```json") || lower.starts_with('{')) && has_task_key(trimmed) {
      return true;
    }

    self.phrases.iter().any(|p| lower.contains(p.as_str()))
  }

  /// Trimmed reply, or the fallback prompt when the reply is internal.
  pub fn extract_user_response(&self, text: &str) -> String {
    let content = text.trim();
    if self.is_internal_response(content) {
      warn!(target: "careertrials_backend", preview = %trunc_for_log(content, 120), "Detected internal response, using fallback");
      return self.fallback.clone();
    }
    content.to_string()
  }
}

/// Parse `text` (optionally inside a ```json fence) as one JSON object and
/// report whether it carries a `task` key. Parse failures count as "no".
fn has_task_key(text: &str) -> bool {
  let body = match strip_prefix_ignore_case(text, "```json") {
    Some(rest) => rest.strip_suffix("```").unwrap_or(rest).trim(),
    None => text,
  };
  match serde_json::from_str::<serde_json::Value>(body) {
    Ok(serde_json::Value::Object(map)) => map.contains_key("task"),
    _ => false,
  }
}

fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
  let head = text.get(..prefix.len())?;
  if head.eq_ignore_ascii_case(prefix) { Some(&text[prefix.len()..]) } else { None }
}

/// TOML shape for overriding the classifier.
#[derive(Clone, Debug, Deserialize)]
pub struct ClassifierCfg {
  #[serde(default = "default_phrases")]
  pub internal_phrases: Vec<String>,
}

impl Default for ClassifierCfg {
  fn default() -> Self {
    Self { internal_phrases: default_phrases() }
  }
}

fn default_phrases() -> Vec<String> {
  DEFAULT_INTERNAL_PHRASES.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn task_object_is_internal() {
    let c = ResponseClassifier::default();
    assert!(c.is_internal_response(r#"{"task": "store answer"}"#));
    assert!(c.is_internal_response("```json\n{\"task\": \"x\", \"data\": 1}\n```"));
  }

  #[test]
  fn plain_question_is_user_facing() {
    let c = ResponseClassifier::default();
    assert!(!c.is_internal_response("Qual é o seu nível de experiência?"));
  }

  #[test]
  fn object_without_task_key_falls_through_to_phrases() {
    let c = ResponseClassifier::default();
    assert!(!c.is_internal_response(r#"{"note": "hello"}"#));
    assert!(c.is_internal_response(r#"{"note": "Armazenar na memória: backend"}"#));
  }

  #[test]
  fn malformed_json_does_not_panic() {
    let c = ResponseClassifier::default();
    assert!(!c.is_internal_response("{ not json at all"));
    assert!(!c.is_internal_response("```json\n[1, 2"));
  }

  #[test]
  fn phrases_match_case_insensitively() {
    let c = ResponseClassifier::default();
    assert!(c.is_internal_response("Vou REGISTRAR RESPOSTA do usuário."));
  }

  #[test]
  fn custom_phrases_replace_defaults() {
    let c = ResponseClassifier::new(["Internal Note"], "next?");
    assert!(c.is_internal_response("internal note: user likes rust"));
    assert!(!c.is_internal_response("vou salvar informação"));
    assert_eq!(c.extract_user_response("internal note"), "next?");
  }

  #[test]
  fn extract_returns_trimmed_text_or_fallback() {
    let c = ResponseClassifier::default();
    assert_eq!(c.extract_user_response("  Olá! Tudo bem?\n"), "Olá! Tudo bem?");
    assert_eq!(c.extract_user_response(r#"{"task":"save"}"#), DEFAULT_FALLBACK_REPLY);
  }
}
