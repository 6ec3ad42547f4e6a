//! Turn lifecycle events.

use crate::Message;
use serde::{Deserialize, Serialize};

/// One event in an assistant turn.
///
/// A successful turn is a fixed sequence: exactly one `turn_start` first,
/// exactly one `agent_end` last, and `message_start`/`message_end` emitted
/// as a matched pair in between. Only the message-bearing variants carry
/// state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    TurnStart,
    MessageStart { message: Message },
    MessageEnd { message: Message },
    TurnEnd,
    AgentEnd,
}

impl TurnEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TurnStart => "turn_start",
            Self::MessageStart { .. } => "message_start",
            Self::MessageEnd { .. } => "message_end",
            Self::TurnEnd => "turn_end",
            Self::AgentEnd => "agent_end",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_snake_case_kinds() {
        let json = serde_json::to_value(TurnEvent::TurnStart).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "turn_start" }));

        let json = serde_json::to_value(TurnEvent::AgentEnd).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "agent_end" }));

        let event = TurnEvent::MessageEnd {
            message: Message::assistant("hi"),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "message_end");
        assert_eq!(event.kind(), "message_end");
    }
}
