//! Recovers a JSON array from a noisy model reply: markdown fences, leading
//! prose, trailing commentary.
//!
//! The result is not guaranteed to parse. Callers must handle parse failure.

/// Strip code fences and narrow the text to the outermost `[...]` span.
///
/// Nested arrays are not specially handled: the span runs from the first `[`
/// to the last `]`, whatever lies between.
pub fn clean_json(raw: &str) -> String {
  let mut content = raw.trim();

  if content.starts_with("```json") && content.ends_with("```") {
    content = fence_body(content, "```json".len());
  } else if content.starts_with("```") && content.ends_with("```") {
    content = fence_body(content, "```".len());
  }
  content = content.trim();

  if !content.starts_with('[') {
    if let (Some(start), Some(end)) = (content.find('['), content.rfind(']')) {
      if end > start {
        content = &content[start..=end];
      }
    }
  }

  content.to_string()
}

/// Body between an opening marker of `open_len` bytes and a closing "```".
/// A fence too short to hold both markers has an empty body.
fn fence_body(content: &str, open_len: usize) -> &str {
  let close = content.len().saturating_sub("```".len());
  content.get(open_len..close).unwrap_or("").trim()
}
