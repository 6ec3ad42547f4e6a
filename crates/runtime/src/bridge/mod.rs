//! Host application bridge.
//!
//! The host call is opaque: one chat request in, one response out. The
//! trait exists so the turn transport and tests can swap implementations;
//! [`ProcessBridge`] is the production one.

mod process;

pub use process::ProcessBridge;

use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Request envelope sent to the host.
#[derive(Debug, Clone, Serialize)]
pub struct BridgeRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub payload: BridgePayload,
}

/// Chat payload. `sessionKey` is the host's routing key for the logical
/// conversation, camel-cased on the wire.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgePayload {
    pub text: String,
    pub session_key: String,
}

impl BridgeRequest {
    pub fn chat(text: impl Into<String>, session_key: impl Into<String>) -> Self {
        Self {
            kind: "chat".to_string(),
            payload: BridgePayload {
                text: text.into(),
                session_key: session_key.into(),
            },
        }
    }
}

/// Response from the host. Absent fields are tolerated.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BridgeResponse {
    #[serde(default)]
    pub text: Option<String>,
}

/// The opaque host call: exactly one request per turn, no streaming
/// partials at this boundary.
#[async_trait]
pub trait HostBridge: Send + Sync {
    async fn request(&self, request: BridgeRequest) -> Result<BridgeResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_request_wire_shape() {
        let request = BridgeRequest::chat("hi", "s1");
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "chat",
                "payload": { "text": "hi", "sessionKey": "s1" }
            })
        );
    }

    #[test]
    fn response_tolerates_missing_text() {
        let response: BridgeResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(response.text, None);

        let response: BridgeResponse = serde_json::from_str(r#"{"text":"hello"}"#).unwrap();
        assert_eq!(response.text.as_deref(), Some("hello"));
    }
}
