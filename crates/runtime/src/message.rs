//! Conversation message model.
//!
//! These are the in-memory types a turn produces and the agent keeps as
//! history. Persistence goes through [`storage::MessageRecord`] rows, with
//! content blocks and usage carried as JSON.

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use storage::{MessageRecord, Role};
use uuid::Uuid;

/// A block of message content. Text is the only kind today; the tagged
/// representation leaves room for more.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
}

impl ContentBlock {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text { text: s.into() }
    }
}

/// Derived pricing for one message's usage. All fields stay zero until a
/// transport actually prices usage; when non-zero, `total` equals the sum of
/// the component fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Cost {
    pub input: f64,
    pub output: f64,
    pub cache_read: f64,
    pub cache_write: f64,
    pub total: f64,
}

impl Cost {
    /// Tolerance scales with the total so summed per-turn costs still
    /// compare equal after accumulated rounding.
    pub fn is_consistent(&self) -> bool {
        let sum = self.input + self.output + self.cache_read + self.cache_write;
        (self.total - sum).abs() <= 1e-9 * self.total.abs().max(1.0)
    }
}

/// Token accounting for one message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub input: u64,
    pub output: u64,
    pub cache_read: u64,
    pub cache_write: u64,
    pub cost: Cost,
}

impl Usage {
    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

/// Why the assistant stopped producing output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    #[default]
    Stop,
    Length,
    Aborted,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::Length => "length",
            Self::Aborted => "aborted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "stop" => Some(Self::Stop),
            "length" => Some(Self::Length),
            "aborted" => Some(Self::Aborted),
            _ => None,
        }
    }
}

/// A message in the conversation.
///
/// The `api`/`provider`/`model` identifiers are set on assistant messages
/// only; user messages leave them empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentBlock>,
    pub api: Option<String>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub usage: Usage,
    pub stop_reason: StopReason,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            content: vec![ContentBlock::text(text)],
            api: None,
            provider: None,
            model: None,
            usage: Usage::default(),
            stop_reason: StopReason::Stop,
            timestamp: Utc::now(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }

    /// Attach the producing model's identifiers.
    pub fn with_model(mut self, api: &str, provider: &str, id: &str) -> Self {
        self.api = Some(api.to_string());
        self.provider = Some(provider.to_string());
        self.model = Some(id.to_string());
        self
    }

    /// The first text block, if any.
    pub fn first_text(&self) -> Option<&str> {
        self.content.iter().find_map(|block| match block {
            ContentBlock::Text { text } => Some(text.as_str()),
        })
    }

    /// All text blocks joined.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .map(|block| match block {
                ContentBlock::Text { text } => text.as_str(),
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// Serialize into a transcript row for `session_key`.
    pub fn to_record(&self, session_key: &str) -> Result<MessageRecord> {
        Ok(MessageRecord {
            id: Uuid::new_v4().to_string(),
            session_key: session_key.to_string(),
            role: self.role,
            content: serde_json::to_string(&self.content)?,
            api: self.api.clone(),
            provider: self.provider.clone(),
            model: self.model.clone(),
            usage: serde_json::to_string(&self.usage)?,
            stop_reason: self.stop_reason.as_str().to_string(),
            created_at: self.timestamp.to_rfc3339(),
        })
    }

    /// Rebuild a message from a transcript row.
    pub fn from_record(record: &MessageRecord) -> Result<Self> {
        let stop_reason = StopReason::parse(&record.stop_reason).ok_or_else(|| {
            Error::InvalidState(format!("unknown stop reason '{}'", record.stop_reason))
        })?;
        let timestamp = DateTime::parse_from_rfc3339(&record.created_at)
            .map_err(|e| Error::InvalidState(format!("bad message timestamp: {e}")))?
            .with_timezone(&Utc);

        Ok(Self {
            role: record.role,
            content: serde_json::from_str(&record.content)?,
            api: record.api.clone(),
            provider: record.provider.clone(),
            model: record.model.clone(),
            usage: serde_json::from_str(&record.usage)?,
            stop_reason,
            timestamp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_text_and_joined_text() {
        let mut msg = Message::user("hello");
        msg.content.push(ContentBlock::text(" world"));

        assert_eq!(msg.first_text(), Some("hello"));
        assert_eq!(msg.text(), "hello world");
        assert_eq!(Message::user("").first_text(), Some(""));
    }

    #[test]
    fn zero_cost_is_consistent() {
        let usage = Usage::default();
        assert!(usage.is_zero());
        assert!(usage.cost.is_consistent());
    }

    #[test]
    fn priced_cost_checks_component_sum() {
        let good = Cost {
            input: 1.0,
            output: 2.0,
            cache_read: 0.5,
            cache_write: 0.5,
            total: 4.0,
        };
        assert!(good.is_consistent());

        let bad = Cost { total: 5.0, ..good };
        assert!(!bad.is_consistent());
    }

    #[test]
    fn record_round_trip() {
        let original = Message::assistant("Hello!").with_model("chat", "host", "default");
        let record = original.to_record("main").unwrap();
        assert_eq!(record.session_key, "main");
        assert_eq!(record.stop_reason, "stop");

        let restored = Message::from_record(&record).unwrap();
        assert_eq!(restored, original);
    }

    #[test]
    fn unknown_stop_reason_is_rejected() {
        let mut record = Message::user("hi").to_record("main").unwrap();
        record.stop_reason = "paused".to_string();
        assert!(Message::from_record(&record).is_err());
    }

    #[test]
    fn content_block_serializes_with_type_tag() {
        let json = serde_json::to_value(ContentBlock::text("hi")).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "text", "text": "hi" }));
    }
}
