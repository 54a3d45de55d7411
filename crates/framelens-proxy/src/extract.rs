//! Pulling caption text out of an upstream `/responses` body.
//!
//! The body carries an `output` array of typed items. Strategies are tried
//! in order and the first non-empty text wins.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::debug;

/// Caption returned when no strategy finds any text.
pub const NO_DESCRIPTION: &str = "no description obtained";

/// Reasoning summaries longer than this many characters are cut.
pub const SUMMARY_LIMIT: usize = 500;

#[derive(Debug, Deserialize)]
pub struct ResponsesBody {
    #[serde(default, deserialize_with = "lenient")]
    pub id: Option<String>,
    /// Required; items that do not parse are dropped.
    #[serde(deserialize_with = "items")]
    pub output: Vec<OutputItem>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputItem {
    Message {
        #[serde(default, deserialize_with = "lenient")]
        role: String,
        #[serde(default, deserialize_with = "lenient_items")]
        content: Vec<MessageContent>,
    },
    Reasoning {
        #[serde(default, deserialize_with = "lenient_items")]
        summary: Vec<SummaryPart>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    OutputText {
        #[serde(default, deserialize_with = "lenient")]
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SummaryPart {
    SummaryText {
        #[serde(default, deserialize_with = "lenient")]
        text: String,
    },
    #[serde(other)]
    Other,
}

/// A value of the wrong shape reads as `T::default()`.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// Must be an array; elements that do not parse as `T` are skipped.
fn items<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let values = Vec::<Value>::deserialize(deserializer)?;
    Ok(parse_each(values))
}

/// Like [`items`], but anything other than an array is empty.
fn lenient_items<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    match Value::deserialize(deserializer)? {
        Value::Array(values) => Ok(parse_each(values)),
        _ => Ok(Vec::new()),
    }
}

fn parse_each<T: DeserializeOwned>(values: Vec<Value>) -> Vec<T> {
    values
        .into_iter()
        .filter_map(|value| serde_json::from_value(value).ok())
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStrategy {
    /// Text of the first assistant message.
    AssistantMessage,
    /// Truncated text of the first reasoning summary.
    ReasoningSummary,
}

pub const STRATEGIES: &[ExtractionStrategy] = &[
    ExtractionStrategy::AssistantMessage,
    ExtractionStrategy::ReasoningSummary,
];

impl ExtractionStrategy {
    pub fn apply(self, body: &ResponsesBody) -> Option<String> {
        match self {
            ExtractionStrategy::AssistantMessage => {
                let content = body.output.iter().find_map(|item| match item {
                    OutputItem::Message { role, content } if role == "assistant" => Some(content),
                    _ => None,
                })?;
                content
                    .iter()
                    .find_map(|part| match part {
                        MessageContent::OutputText { text } => Some(text),
                        MessageContent::Other => None,
                    })
                    .filter(|text| !text.is_empty())
                    .cloned()
            }
            ExtractionStrategy::ReasoningSummary => {
                let summary = body.output.iter().find_map(|item| match item {
                    OutputItem::Reasoning { summary } => Some(summary),
                    _ => None,
                })?;
                summary
                    .iter()
                    .find_map(|part| match part {
                        SummaryPart::SummaryText { text } => Some(text),
                        SummaryPart::Other => None,
                    })
                    .filter(|text| !text.is_empty())
                    .map(|text| truncate_summary(text))
            }
        }
    }
}

/// Caption text for `body`, falling back to [`NO_DESCRIPTION`].
pub fn extract_caption(body: &ResponsesBody) -> String {
    for strategy in STRATEGIES {
        if let Some(text) = strategy.apply(body) {
            debug!(?strategy, chars = text.chars().count(), "caption extracted");
            return text;
        }
    }
    debug!(items = body.output.len(), "no caption in upstream output");
    NO_DESCRIPTION.to_string()
}

fn truncate_summary(text: &str) -> String {
    match text.char_indices().nth(SUMMARY_LIMIT) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
