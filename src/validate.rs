//! Per-element validation of a parsed challenge batch.
//! One malformed element is dropped and logged; it never fails the batch.

use serde_json::Value;
use tracing::{instrument, warn};

use crate::domain::Challenge;

/// Try to build one `Challenge` from a loosely typed JSON value.
pub fn validate_challenge(value: Value) -> Result<Challenge, String> {
  serde_json::from_value(value).map_err(|e| e.to_string())
}

/// Keep every element that forms a valid `Challenge`, in input order.
#[instrument(level = "debug", skip(raw), fields(input = raw.len()))]
pub fn validate_challenges(raw: Vec<Value>) -> Vec<Challenge> {
  raw
    .into_iter()
    .enumerate()
    .filter_map(|(idx, value)| match validate_challenge(value) {
      Ok(c) => Some(c),
      Err(reason) => {
        warn!(target: "challenge", index = idx, %reason, "Challenge validation failed; dropping element");
        None
      }
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn valid(i: usize) -> Value {
    json!({
      "title": format!("Desafio {i}"),
      "description": "Implemente um endpoint REST",
      "type": "Code",
      "difficulty": "Medium",
      "xp": 100 + i,
      "level": 2,
      "estimatedTime": "2h",
      "tags": ["rust", "http"]
    })
  }

  #[test]
  fn all_valid_elements_survive_in_order() {
    let out = validate_challenges((0..5).map(valid).collect());
    assert_eq!(out.len(), 5);
    let titles: Vec<_> = out.iter().map(|c| c.title.as_str()).collect();
    assert_eq!(titles, ["Desafio 0", "Desafio 1", "Desafio 2", "Desafio 3", "Desafio 4"]);
  }

  #[test]
  fn invalid_elements_are_dropped() {
    let input = vec![
      valid(0),
      json!({ "title": "missing everything else" }),
      valid(1),
      json!("not an object"),
      json!({ "title": "t", "description": "d", "type": "Dance", "difficulty": "Easy", "xp": 1, "level": 1 }),
      json!({ "title": "t", "description": "d", "type": "Quiz", "difficulty": "Easy", "xp": "lots", "level": 1 }),
      valid(2),
    ];
    let out = validate_challenges(input);
    let titles: Vec<_> = out.iter().map(|c| c.title.as_str()).collect();
    assert_eq!(titles, ["Desafio 0", "Desafio 1", "Desafio 2"]);
  }

  #[test]
  fn whole_number_floats_and_numeric_strings_are_accepted() {
    let mut c = valid(0);
    c["xp"] = json!(100.0);
    c["level"] = json!("3");
    let out = validate_challenge(c).unwrap();
    assert_eq!((out.xp, out.level), (100, 3));

    for bad in [json!("lots"), json!(1.5), json!("2.5"), json!(true)] {
      let mut c = valid(0);
      c["xp"] = bad;
      assert!(validate_challenge(c).is_err());
    }
  }

  #[test]
  fn malformed_quiz_question_drops_the_challenge() {
    let bad = json!({
      "title": "Quiz", "description": "d", "type": "Quiz", "difficulty": "Easy",
      "xp": 20, "level": 1, "questions": [{ "question": "?", "choices": ["a"] }]
    });
    assert!(validate_challenge(bad).is_err());
  }

  #[test]
  fn empty_input_gives_empty_output() {
    assert!(validate_challenges(Vec::new()).is_empty());
  }
}
