//! Runtime configuration: environment variables plus an optional TOML file
//! with prompt and classifier overrides.
//!
//! Environment (a `.env` file is honored):
//!   PORT                  : u16 (default 8000)
//!   DEFAULT_MODEL         : model identifier (default "gemini-2.0-flash-exp")
//!   GOOGLE_API_KEY        : required
//!   GOOGLE_CLOUD_PROJECT  : optional
//!   GOOGLE_CLOUD_LOCATION : default "us-central1"
//!   GEMINI_BASE_URL       : default "https://generativelanguage.googleapis.com"
//!   DB_FILE               : SQLite conversation store (default "/tmp/agents.db")
//!   MAX_QUESTIONS         : phase-1 question budget (default 5)
//!   MAX_CHALLENGES        : upper bound of generated challenges (default 20)
//!   MODEL_TIMEOUT_SECS    : per-call upstream timeout (default 60, must be > 0)
//!   AGENT_CONFIG_PATH     : path to TOML overrides (see `AgentConfig`)

use std::path::PathBuf;
use std::str::FromStr;

use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info};

use crate::classifier::{ClassifierCfg, DEFAULT_FALLBACK_REPLY};

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("{0} environment variable is required")]
  Missing(&'static str),
  #[error("{var} has an invalid value: {value:?}")]
  Invalid { var: &'static str, value: String },
}

#[derive(Clone, Debug)]
pub struct Config {
  pub port: u16,
  pub default_model: String,
  pub google_api_key: String,
  pub google_cloud_project: Option<String>,
  pub google_cloud_location: String,
  pub gemini_base_url: String,
  pub db_file: PathBuf,
  pub max_questions: u32,
  pub max_challenges: u32,
  pub model_timeout_secs: u64,
}

impl Config {
  pub fn from_env() -> Result<Self, ConfigError> {
    Self::from_lookup(|k| std::env::var(k).ok())
  }

  /// Build from any key lookup; empty values count as unset.
  pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
    let get = |k: &str| lookup(k).filter(|v| !v.trim().is_empty());

    let cfg = Self {
      port: parse_or(&get, "PORT", 8000)?,
      default_model: get("DEFAULT_MODEL").unwrap_or_else(|| "gemini-2.0-flash-exp".into()),
      google_api_key: get("GOOGLE_API_KEY").unwrap_or_default(),
      google_cloud_project: get("GOOGLE_CLOUD_PROJECT"),
      google_cloud_location: get("GOOGLE_CLOUD_LOCATION").unwrap_or_else(|| "us-central1".into()),
      gemini_base_url: get("GEMINI_BASE_URL")
        .unwrap_or_else(|| "https://generativelanguage.googleapis.com".into()),
      db_file: get("DB_FILE").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("/tmp/agents.db")),
      max_questions: parse_or(&get, "MAX_QUESTIONS", 5)?,
      max_challenges: parse_or(&get, "MAX_CHALLENGES", 20)?,
      model_timeout_secs: parse_or(&get, "MODEL_TIMEOUT_SECS", 60)?,
    };
    cfg.validate()?;
    Ok(cfg)
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.google_api_key.is_empty() {
      return Err(ConfigError::Missing("GOOGLE_API_KEY"));
    }
    if self.default_model.is_empty() {
      return Err(ConfigError::Missing("DEFAULT_MODEL"));
    }
    // A zero timeout would fail every model call.
    if self.model_timeout_secs == 0 {
      return Err(ConfigError::Invalid { var: "MODEL_TIMEOUT_SECS", value: self.model_timeout_secs.to_string() });
    }
    Ok(())
  }
}

fn parse_or<T: FromStr>(
  get: &impl Fn(&str) -> Option<String>,
  var: &'static str,
  default: T,
) -> Result<T, ConfigError> {
  match get(var) {
    Some(v) => v.trim().parse().map_err(|_| ConfigError::Invalid { var, value: v }),
    None => Ok(default),
  }
}

/// Optional TOML overrides. Every field falls back to its default.
#[derive(Clone, Debug, Deserialize, Default)]
pub struct AgentConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub classifier: ClassifierCfg,
}

/// Texts sent to, or substituted for, the model.
/// `system_template` may use `{max_questions}` and `{max_challenges}`.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub system_template: String,
  /// Re-sent when a reply leaks internal reasoning.
  pub corrective_instruction: String,
  pub fallback_reply: String,
  /// Message that switches the agent to challenge generation.
  pub generate_command: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      system_template: DEFAULT_SYSTEM_TEMPLATE.into(),
      corrective_instruction:
        "Por favor, responda diretamente ao usuário em português, não em formato JSON ou tarefa.".into(),
      fallback_reply: DEFAULT_FALLBACK_REPLY.into(),
      generate_command: "GENERATE_CHALLENGES".into(),
    }
  }
}

const DEFAULT_SYSTEM_TEMPLATE: &str = r#"
Você é um assistente de avaliação de carreira que trabalha em duas fases.

Responda SEMPRE diretamente ao usuário, em português e em tom de conversa. Nunca mostre JSON,
tarefas ou raciocínio interno, exceto quando for pedido o array de desafios.

FASE 1 — DIAGNÓSTICO
- Faça no máximo {max_questions} perguntas para entender os objetivos do usuário.
- A pergunta inicial já foi feita pela aplicação: "Legal, antes de começarmos, qual é o objetivo da sua carreira hoje?"
  A primeira mensagem recebida é a resposta a ela; não a repita.
- Explore: experiência atual, objetivos, estilo de aprendizagem, horas por semana, tecnologias de interesse.
- Uma pergunta por vez, esperando a resposta antes de seguir.

FASE 2 — DESAFIOS
Ao receber a mensagem "GENERATE_CHALLENGES":
- Use tudo o que foi respondido na Fase 1.
- Gere entre 10 e {max_challenges} desafios personalizados.
- Responda APENAS com um array JSON válido, sem markdown nem explicações.
- Cada item segue exatamente esta forma:
  {
    "title": "Título em português",
    "description": "Descrição detalhada em português",
    "type": "Code | Quiz | Project | Reading",
    "difficulty": "Easy | Medium | Hard",
    "xp": número entre 10 e 500,
    "level": número entre 1 e 10,
    "estimatedTime": "30min | 1h | 2h | 4h | 1 dia | 1 semana",
    "tags": ["tag1", "tag2"],
    "questions": [
      { "question": "Pergunta", "choices": ["a", "b", "c", "d"], "answer": "a" }
    ]
  }
  O campo "questions" só existe para desafios do tipo Quiz.
"#;

/// Attempt to load `AgentConfig` from AGENT_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_agent_config_from_env() -> Option<AgentConfig> {
  let path = std::env::var("AGENT_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<AgentConfig>(&s) {
      Ok(cfg) => {
        info!(target: "careertrials_backend", %path, "Loaded agent config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "careertrials_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "careertrials_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashMap;

  fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    move |k| map.get(k).cloned()
  }

  #[test]
  fn defaults_apply_when_only_the_key_is_set() {
    let cfg = Config::from_lookup(lookup(&[("GOOGLE_API_KEY", "k")])).unwrap();
    assert_eq!(cfg.port, 8000);
    assert_eq!(cfg.default_model, "gemini-2.0-flash-exp");
    assert_eq!(cfg.google_cloud_location, "us-central1");
    assert_eq!(cfg.db_file, PathBuf::from("/tmp/agents.db"));
    assert_eq!((cfg.max_questions, cfg.max_challenges), (5, 20));
    assert_eq!(cfg.google_cloud_project, None);
  }

  #[test]
  fn missing_api_key_is_rejected() {
    let err = Config::from_lookup(lookup(&[("GOOGLE_API_KEY", "  ")])).unwrap_err();
    assert!(matches!(err, ConfigError::Missing("GOOGLE_API_KEY")));
  }

  #[test]
  fn malformed_numbers_are_rejected() {
    let err = Config::from_lookup(lookup(&[("GOOGLE_API_KEY", "k"), ("MAX_QUESTIONS", "five")])).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { var: "MAX_QUESTIONS", .. }));
  }

  #[test]
  fn zero_timeout_is_rejected() {
    let err = Config::from_lookup(lookup(&[("GOOGLE_API_KEY", "k"), ("MODEL_TIMEOUT_SECS", "0")])).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { var: "MODEL_TIMEOUT_SECS", .. }));

    let cfg = Config::from_lookup(lookup(&[("GOOGLE_API_KEY", "k"), ("MODEL_TIMEOUT_SECS", "5")])).unwrap();
    assert_eq!(cfg.model_timeout_secs, 5);
  }

  #[test]
  fn partial_toml_keeps_other_defaults() {
    let cfg: AgentConfig = toml::from_str(
      r#"
      [prompts]
      fallback_reply = "Got it! What's your next answer?"

      [classifier]
      internal_phrases = ["store in memory", "task:"]
      "#,
    )
    .unwrap();
    assert_eq!(cfg.prompts.fallback_reply, "Got it! What's your next answer?");
    assert_eq!(cfg.prompts.generate_command, "GENERATE_CHALLENGES");
    assert_eq!(cfg.classifier.internal_phrases.len(), 2);
  }

  #[test]
  fn default_template_has_both_placeholders() {
    let p = Prompts::default();
    assert!(p.system_template.contains("{max_questions}"));
    assert!(p.system_template.contains("{max_challenges}"));
  }
}
