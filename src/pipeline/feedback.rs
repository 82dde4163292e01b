//! Scorer response normalisation: raw content → parsed feedback JSON.
//!
//! Scoring backends answer in one of two shapes:
//!
//! ```json
//! { "content": "{\"overallScore\": 80, …}" }
//! { "content": [ { "type": "text", "text": "{\"overallScore\": 80, …}" } ] }
//! ```
//!
//! Both are accepted by [`ScoringResponse`] and normalised by
//! [`parse_feedback`] into the same `serde_json::Value`.
//!
//! Vision models also like to wrap JSON in a ```` ```json ```` fence even
//! when told not to, so one outer fence is stripped before parsing.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// What a scoring adapter returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringResponse {
    pub content: MessageContent,
}

impl ScoringResponse {
    /// A response whose content is a plain string.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: MessageContent::Text(content.into()),
        }
    }

    /// A response whose content is a list of parts.
    pub fn parts(parts: Vec<ContentPart>) -> Self {
        Self {
            content: MessageContent::Parts(parts),
        }
    }
}

/// The two accepted content shapes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    /// The text to parse: the string itself, or the first part's `text`.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessageContent::Text(s) => Some(s),
            MessageContent::Parts(parts) => parts.first().map(|p| p.text.as_str()),
        }
    }
}

/// One element of a list-shaped content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentPart {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub text: String,
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: Some("text".to_string()),
            text: text.into(),
        }
    }
}

/// Why a scorer payload could not be turned into feedback.
#[derive(Debug, Error)]
pub enum FeedbackError {
    #[error("response has no text content")]
    NoContent,

    #[error("response is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// The JSON parsed to `null` or `""`, which a record cannot tell apart
    /// from "not scored yet".
    #[error("response JSON is empty")]
    EmptyPayload,
}

static RE_OUTER_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z]*\s*\n(.*?)\n?```$").unwrap());

/// Parse a scorer response into structured feedback.
pub fn parse_feedback(response: &ScoringResponse) -> Result<Value, FeedbackError> {
    let text = response
        .content
        .as_text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(FeedbackError::NoContent)?;

    let value: Value = serde_json::from_str(strip_outer_fence(text))?;
    match value {
        Value::Null => Err(FeedbackError::EmptyPayload),
        Value::String(ref s) if s.is_empty() => Err(FeedbackError::EmptyPayload),
        other => Ok(other),
    }
}

fn strip_outer_fence(text: &str) -> &str {
    match RE_OUTER_FENCE.captures(text).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str(),
        None => text,
    }
}
