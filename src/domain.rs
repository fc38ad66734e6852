//! Domain models produced by the challenge-generation phase: challenge kinds,
//! difficulty, quiz questions, and the challenge record itself.

use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// What kind of learning task a challenge is.
/// Labels match case-insensitively; Portuguese labels emitted by the model are
/// accepted and normalized to the English variant.
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
pub enum ChallengeType {
  Code,
  Quiz,
  Project,
  Reading,
}

impl ChallengeType {
  const LABELS: &'static [&'static str] = &["Code", "Quiz", "Project", "Reading"];

  fn from_label(label: &str) -> Option<Self> {
    match label.trim().to_lowercase().as_str() {
      "code" | "código" | "codigo" => Some(Self::Code),
      "quiz" | "questionário" | "questionario" => Some(Self::Quiz),
      "project" | "projeto" => Some(Self::Project),
      "reading" | "leitura" => Some(Self::Reading),
      _ => None,
    }
  }
}

impl<'de> Deserialize<'de> for ChallengeType {
  fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
    let label = String::deserialize(d)?;
    Self::from_label(&label).ok_or_else(|| de::Error::unknown_variant(&label, Self::LABELS))
  }
}

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
pub enum Difficulty {
  Easy,
  Medium,
  Hard,
}

impl Difficulty {
  const LABELS: &'static [&'static str] = &["Easy", "Medium", "Hard"];

  fn from_label(label: &str) -> Option<Self> {
    match label.trim().to_lowercase().as_str() {
      "easy" | "fácil" | "facil" => Some(Self::Easy),
      "medium" | "médio" | "medio" => Some(Self::Medium),
      "hard" | "difícil" | "dificil" => Some(Self::Hard),
      _ => None,
    }
  }
}

impl<'de> Deserialize<'de> for Difficulty {
  fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
    let label = String::deserialize(d)?;
    Self::from_label(&label).ok_or_else(|| de::Error::unknown_variant(&label, Self::LABELS))
  }
}

/// One multiple-choice question attached to a quiz challenge.
/// `answer` should match one of `choices`; that is not checked.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Question {
  pub question: String,
  pub choices: Vec<String>,
  pub answer: String,
}

/// A validated challenge. Deserializing goes through `RawChallenge`, so any
/// `Challenge` value obeys the required-field rules.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "RawChallenge")]
pub struct Challenge {
  pub title: String,
  pub description: String,
  #[serde(rename = "type")]
  pub kind: ChallengeType,
  pub difficulty: Difficulty,
  /// Guidance range 10–500, not enforced.
  pub xp: i64,
  /// Guidance range 1–10, not enforced.
  pub level: i64,
  #[serde(rename = "estimatedTime", skip_serializing_if = "Option::is_none")]
  pub estimated_time: Option<String>,
  pub tags: Vec<String>,
  pub questions: Vec<Question>,
}

#[derive(Deserialize)]
struct RawChallenge {
  title: String,
  description: String,
  #[serde(rename = "type")]
  kind: ChallengeType,
  difficulty: Difficulty,
  #[serde(deserialize_with = "lax_int")]
  xp: i64,
  #[serde(deserialize_with = "lax_int")]
  level: i64,
  #[serde(rename = "estimatedTime", default)]
  estimated_time: Option<String>,
  #[serde(default, deserialize_with = "null_as_default")]
  tags: Vec<String>,
  // Shape is checked only for quizzes, see `try_from`.
  #[serde(default, deserialize_with = "null_as_default")]
  questions: Vec<Value>,
}

impl TryFrom<RawChallenge> for Challenge {
  type Error = String;

  fn try_from(raw: RawChallenge) -> Result<Self, Self::Error> {
    if raw.title.trim().is_empty() {
      return Err("title must not be empty".into());
    }
    if raw.description.trim().is_empty() {
      return Err("description must not be empty".into());
    }
    // Questions only make sense on quizzes; elsewhere they are dropped unread.
    let questions = if raw.kind == ChallengeType::Quiz {
      serde_json::from_value::<Vec<Question>>(Value::Array(raw.questions))
        .map_err(|e| format!("invalid questions: {e}"))?
    } else {
      Vec::new()
    };
    Ok(Challenge {
      title: raw.title,
      description: raw.description,
      kind: raw.kind,
      difficulty: raw.difficulty,
      xp: raw.xp,
      level: raw.level,
      estimated_time: raw.estimated_time,
      tags: raw.tags,
      questions,
    })
  }
}

/// Treat an explicit `null` the same as a missing field.
fn null_as_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
  D: Deserializer<'de>,
  T: Default + Deserialize<'de>,
{
  Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}

/// Integer field that also takes whole-number floats (`100.0`) and numeric
/// strings (`"100"`). Fractions and other text are rejected.
fn lax_int<'de, D>(d: D) -> Result<i64, D::Error>
where
  D: Deserializer<'de>,
{
  let value = Value::deserialize(d)?;
  let parsed = match &value {
    Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(whole_f64)),
    Value::String(s) => {
      let s = s.trim();
      s.parse::<i64>().ok().or_else(|| s.parse::<f64>().ok().and_then(whole_f64))
    }
    _ => None,
  };
  parsed.ok_or_else(|| de::Error::custom(format!("expected an integer, got {value}")))
}

fn whole_f64(f: f64) -> Option<i64> {
  (f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64).then(|| f as i64)
}
