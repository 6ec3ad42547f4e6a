//! Single-shot host bridge transport.
//!
//! Adapts the host's one-request/one-response chat call into the turn event
//! sequence. The bridge reports no token accounting, so assistant usage is
//! always the zero record.

use super::{EventStream, TurnInput, TurnTransport};
use crate::bridge::{BridgeRequest, HostBridge};
use crate::{Error, Message, TurnEvent};
use async_stream::stream;
use tracing::debug;

/// Turn transport over a [`HostBridge`].
///
/// Issues exactly one bridge call per turn. The session key names the
/// logical conversation the host should route to.
pub struct BridgeTransport<B> {
    bridge: B,
    session_key: String,
}

impl<B: HostBridge> BridgeTransport<B> {
    pub fn new(bridge: B, session_key: impl Into<String>) -> Self {
        Self {
            bridge,
            session_key: session_key.into(),
        }
    }

    pub fn session_key(&self) -> &str {
        &self.session_key
    }
}

impl<B: HostBridge> TurnTransport for BridgeTransport<B> {
    fn run<'a>(&'a self, input: TurnInput<'a>) -> EventStream<'a> {
        Box::pin(stream! {
            let text = input.user.first_text().unwrap_or("").to_string();
            let request = BridgeRequest::chat(text, self.session_key.clone());

            debug!(session_key = %self.session_key, "running turn over host bridge");

            // No events may be emitted until the response is committed: a
            // failed or cancelled call fails the whole sequence instead of
            // leaving a partial turn behind.
            let result = tokio::select! {
                biased;
                () = input.cancel.cancelled() => Err(Error::Cancelled),
                result = self.bridge.request(request) => result,
            };
            let response = match result {
                Ok(response) => response,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };

            let message = Message::assistant(response.text.unwrap_or_default()).with_model(
                &input.config.model.api,
                &input.config.model.provider,
                &input.config.model.id,
            );

            yield Ok(TurnEvent::TurnStart);
            yield Ok(TurnEvent::MessageStart { message: message.clone() });
            yield Ok(TurnEvent::MessageEnd { message });
            yield Ok(TurnEvent::TurnEnd);
            yield Ok(TurnEvent::AgentEnd);
        })
    }
}
