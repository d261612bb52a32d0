//! Turns raw model output into a validated `Feedback`.
//!
//! Models wrap JSON in markdown fences, prepend chatter, or leak control
//! characters. `clean_feedback_text` strips all of that before parsing.

use thiserror::Error;

use crate::llm_client::ChatResponse;
use crate::models::feedback::{Feedback, ScoreOutOfRange};

#[derive(Debug, Error)]
pub enum FeedbackParseError {
    #[error("response contained no text content")]
    NoText,

    #[error("malformed feedback JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Score(#[from] ScoreOutOfRange),
}

/// The payload text of a feedback response.
pub fn extract_text(response: &ChatResponse) -> Result<&str, FeedbackParseError> {
    response.text().ok_or(FeedbackParseError::NoText)
}

/// Removes markdown fencing and non-printable characters, then narrows the
/// text to the outermost `{ ... }` span when one exists.
pub fn clean_feedback_text(text: &str) -> String {
    let mut cleaned = remove_json_fences(text);
    cleaned = strip_trailing_fence(&cleaned).to_string();
    cleaned = strip_leading_fence(&cleaned).to_string();
    cleaned = strip_trailing_fence(&cleaned).trim().to_string();

    cleaned.retain(|c| !is_control(c));

    match (cleaned.find('{'), cleaned.rfind('}')) {
        (Some(first), Some(last)) if last > first => cleaned[first..=last].to_string(),
        _ => cleaned,
    }
}

/// Cleans, deserializes and range-checks a feedback payload.
pub fn parse_feedback(text: &str) -> Result<Feedback, FeedbackParseError> {
    let cleaned = clean_feedback_text(text);
    let feedback: Feedback = serde_json::from_str(&cleaned)?;
    feedback.validate()?;
    Ok(feedback)
}

/// Drops every case-insensitive "```json" together with the whitespace after it.
fn remove_json_fences(text: &str) -> String {
    const FENCE: &str = "```json";
    let lowered = text.to_ascii_lowercase();
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    while let Some(offset) = lowered[cursor..].find(FENCE) {
        let start = cursor + offset;
        out.push_str(&text[cursor..start]);
        let after = start + FENCE.len();
        let rest = &text[after..];
        cursor = after + (rest.len() - rest.trim_start().len());
    }
    out.push_str(&text[cursor..]);
    out
}

/// Strips a "```" that is followed only by whitespace at the end of the text.
fn strip_trailing_fence(text: &str) -> &str {
    text.trim_end().strip_suffix("```").unwrap_or(text)
}

/// Strips a "```" preceded only by whitespace, plus the whitespace after it.
fn strip_leading_fence(text: &str) -> &str {
    match text.trim_start().strip_prefix("```") {
        Some(rest) => rest.trim_start(),
        None => text,
    }
}

fn is_control(c: char) -> bool {
    matches!(c, '\u{0}'..='\u{1f}' | '\u{7f}'..='\u{9f}')
}
