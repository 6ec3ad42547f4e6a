//! The conversation engine.
//!
//! An [`Agent`] owns the in-memory history for one session and drives turns
//! through whatever [`TurnTransport`] it was given. It consumes the turn
//! event sequence, rejects malformed orderings, and persists both sides of
//! the exchange through the composed storage handle.

use crate::transport::{RunConfig, TurnInput, TurnTransport};
use crate::{Error, Message, Result, TurnEvent};
use futures::StreamExt;
use storage::{AppStorage, UsageRecord};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Boot descriptor for an agent: the transcript to resume from and the
/// session key the host routes on.
#[derive(Debug, Clone)]
pub struct Bootstrap {
    pub initial_messages: Vec<Message>,
    pub session_key: String,
}

impl Default for Bootstrap {
    fn default() -> Self {
        Self {
            initial_messages: Vec::new(),
            session_key: "main".to_string(),
        }
    }
}

/// Drives conversational turns over a transport.
///
/// One turn at a time: a prompt must complete or cancel before the next.
pub struct Agent<T: TurnTransport> {
    transport: T,
    config: RunConfig,
    session_key: String,
    messages: Vec<Message>,
    storage: Arc<AppStorage>,
}

impl<T: TurnTransport> Agent<T> {
    pub fn new(
        transport: T,
        config: RunConfig,
        bootstrap: Bootstrap,
        storage: Arc<AppStorage>,
    ) -> Result<Self> {
        storage
            .sessions
            .upsert(&bootstrap.session_key, &config.model.id)?;

        info!(
            session_key = %bootstrap.session_key,
            resumed = bootstrap.initial_messages.len(),
            "agent ready"
        );

        Ok(Self {
            transport,
            config,
            session_key: bootstrap.session_key,
            messages: bootstrap.initial_messages,
            storage,
        })
    }

    pub fn session_key(&self) -> &str {
        &self.session_key
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Run one turn for `text` and return the assistant's message.
    pub async fn prompt(&mut self, text: &str) -> Result<Message> {
        self.prompt_with(text, CancellationToken::new()).await
    }

    /// Like [`prompt`](Self::prompt), with a caller-held cancellation
    /// signal. Cancellation mid-turn leaves the persisted transcript ending
    /// with the user message.
    pub async fn prompt_with(&mut self, text: &str, cancel: CancellationToken) -> Result<Message> {
        let user = Message::user(text);
        self.storage
            .messages
            .append(&user.to_record(&self.session_key)?)?;
        self.storage.sessions.record_message(&self.session_key)?;
        self.messages.push(user);

        let completed = self.run_turn(cancel).await?;
        let Some(assistant) = completed.last().cloned() else {
            return Err(Error::InvalidState(
                "turn completed without an assistant message".to_string(),
            ));
        };

        for message in completed {
            self.storage
                .messages
                .append(&message.to_record(&self.session_key)?)?;
            self.storage.sessions.record_message(&self.session_key)?;
            self.storage.messages.record_usage(&UsageRecord {
                session_key: self.session_key.clone(),
                model: self.config.model.id.clone(),
                input_tokens: message.usage.input as i64,
                output_tokens: message.usage.output as i64,
                cache_read_tokens: message.usage.cache_read as i64,
                cache_write_tokens: message.usage.cache_write as i64,
                cost_total: message.usage.cost.total,
            })?;
            self.messages.push(message);
        }

        Ok(assistant)
    }

    /// Consume one turn's event sequence and collect the completed assistant
    /// messages, rejecting any ordering the protocol does not allow.
    async fn run_turn(&mut self, cancel: CancellationToken) -> Result<Vec<Message>> {
        let (history, user) = self.messages.split_at(self.messages.len() - 1);
        let mut stream = self.transport.run(TurnInput {
            history,
            user: &user[0],
            config: &self.config,
            cancel,
        });

        let mut started = false;
        let mut message_open = false;
        let mut turn_ended = false;
        let mut ended = false;
        let mut completed = Vec::new();

        while let Some(event) = stream.next().await {
            let event = event?;
            debug!(kind = event.kind(), "turn event");

            if ended {
                return Err(Error::InvalidState(format!(
                    "{} after agent_end",
                    event.kind()
                )));
            }
            match event {
                TurnEvent::TurnStart if !started => started = true,
                TurnEvent::MessageStart { .. } if started && !turn_ended && !message_open => {
                    message_open = true;
                }
                TurnEvent::MessageEnd { message } if message_open => {
                    message_open = false;
                    completed.push(message);
                }
                TurnEvent::TurnEnd if started && !message_open && !turn_ended => turn_ended = true,
                TurnEvent::AgentEnd if turn_ended => ended = true,
                other => {
                    return Err(Error::InvalidState(format!(
                        "unexpected {} in turn sequence",
                        other.kind()
                    )));
                }
            }
        }
        drop(stream);

        if !ended {
            return Err(Error::InvalidState(
                "turn sequence ended before agent_end".to_string(),
            ));
        }

        Ok(completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{BridgeRequest, BridgeResponse, HostBridge};
    use crate::transport::{BridgeTransport, EventStream, ModelRef};
    use crate::StopReason;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use storage::Role;

    struct CannedBridge {
        reply: Mutex<Option<Result<BridgeResponse>>>,
    }

    impl CannedBridge {
        fn text(text: &str) -> Self {
            Self {
                reply: Mutex::new(Some(Ok(BridgeResponse {
                    text: Some(text.to_string()),
                }))),
            }
        }

        fn hanging() -> Self {
            Self {
                reply: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl HostBridge for CannedBridge {
        async fn request(&self, _request: BridgeRequest) -> Result<BridgeResponse> {
            let taken = self.reply.lock().unwrap().take();
            match taken {
                Some(reply) => reply,
                None => futures::future::pending().await,
            }
        }
    }

    /// Replays a fixed event sequence, ignoring its input.
    struct ScriptedTransport {
        events: Mutex<Option<Vec<Result<TurnEvent>>>>,
    }

    impl ScriptedTransport {
        fn new(events: Vec<Result<TurnEvent>>) -> Self {
            Self {
                events: Mutex::new(Some(events)),
            }
        }
    }

    impl TurnTransport for ScriptedTransport {
        fn run<'a>(&'a self, _input: TurnInput<'a>) -> EventStream<'a> {
            let events = self.events.lock().unwrap().take().unwrap_or_default();
            Box::pin(futures::stream::iter(events))
        }
    }

    fn config() -> RunConfig {
        RunConfig {
            model: ModelRef {
                api: "chat".to_string(),
                provider: "host".to_string(),
                id: "default".to_string(),
            },
        }
    }

    fn agent_over<T: TurnTransport>(transport: T) -> Agent<T> {
        let storage = Arc::new(AppStorage::in_memory().unwrap());
        Agent::new(transport, config(), Bootstrap::default(), storage).unwrap()
    }

    #[tokio::test]
    async fn prompt_round_trip_persists_both_sides() {
        let transport = BridgeTransport::new(CannedBridge::text("Hello!"), "main");
        let mut agent = agent_over(transport);

        let assistant = agent.prompt("Hi").await.unwrap();
        assert_eq!(assistant.text(), "Hello!");
        assert_eq!(assistant.stop_reason, StopReason::Stop);
        assert!(assistant.usage.is_zero());

        assert_eq!(agent.messages().len(), 2);
        assert_eq!(agent.messages()[0].role, Role::User);
        assert_eq!(agent.messages()[1].role, Role::Assistant);

        let transcript = agent.storage.messages.load("main").unwrap();
        assert_eq!(transcript.len(), 2);
        let restored = Message::from_record(&transcript[1]).unwrap();
        assert_eq!(restored.text(), "Hello!");

        let session = agent.storage.sessions.get("main").unwrap().unwrap();
        assert_eq!(session.message_count, 2);

        let usage = agent.storage.messages.usage_total("main").unwrap();
        assert_eq!(usage.input_tokens, 0);
        assert_eq!(usage.cost_total, 0.0);
    }

    #[tokio::test]
    async fn cancelled_turn_leaves_transcript_ending_with_the_user_message() {
        let transport = BridgeTransport::new(CannedBridge::hanging(), "main");
        let mut agent = agent_over(transport);

        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = agent.prompt_with("Hi", cancel).await.unwrap_err();
        assert!(matches!(err, Error::Cancelled));

        assert_eq!(agent.messages().len(), 1);
        let transcript = agent.storage.messages.load("main").unwrap();
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript[0].role, Role::User);
    }

    #[tokio::test]
    async fn bootstrap_defaults_are_empty_history_and_main() {
        let bootstrap = Bootstrap::default();
        assert!(bootstrap.initial_messages.is_empty());
        assert_eq!(bootstrap.session_key, "main");
    }

    #[tokio::test]
    async fn resumed_history_is_passed_to_the_next_turn() {
        let transport = BridgeTransport::new(CannedBridge::text("again"), "main");
        let storage = Arc::new(AppStorage::in_memory().unwrap());
        let bootstrap = Bootstrap {
            initial_messages: vec![Message::user("earlier"), Message::assistant("yes")],
            session_key: "main".to_string(),
        };
        let mut agent = Agent::new(transport, config(), bootstrap, storage).unwrap();

        agent.prompt("Hi").await.unwrap();
        assert_eq!(agent.messages().len(), 4);
        assert_eq!(agent.messages()[0].text(), "earlier");
    }

    #[tokio::test]
    async fn missing_turn_start_is_rejected() {
        let transport = ScriptedTransport::new(vec![
            Ok(TurnEvent::MessageStart {
                message: Message::assistant("x"),
            }),
            Ok(TurnEvent::AgentEnd),
        ]);
        let mut agent = agent_over(transport);

        let err = agent.prompt("Hi").await.unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
    }

    #[tokio::test]
    async fn unpaired_message_start_is_rejected() {
        let transport = ScriptedTransport::new(vec![
            Ok(TurnEvent::TurnStart),
            Ok(TurnEvent::MessageStart {
                message: Message::assistant("x"),
            }),
            Ok(TurnEvent::TurnEnd),
            Ok(TurnEvent::AgentEnd),
        ]);
        let mut agent = agent_over(transport);

        let err = agent.prompt("Hi").await.unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
    }

    #[tokio::test]
    async fn truncated_sequence_is_rejected() {
        let transport = ScriptedTransport::new(vec![
            Ok(TurnEvent::TurnStart),
            Ok(TurnEvent::MessageStart {
                message: Message::assistant("x"),
            }),
            Ok(TurnEvent::MessageEnd {
                message: Message::assistant("x"),
            }),
            Ok(TurnEvent::TurnEnd),
        ]);
        let mut agent = agent_over(transport);

        let err = agent.prompt("Hi").await.unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
    }
}
