//! Turn transport abstraction.
//!
//! A transport turns one prompt into a lazy, finite, ordered sequence of
//! [`TurnEvent`]s. The agent loop iterates any transport identically, so a
//! streaming network transport and the single-shot host bridge transport are
//! interchangeable.

mod bridge;

pub use bridge::BridgeTransport;

use crate::{Message, Result, TurnEvent};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use tokio_util::sync::CancellationToken;

/// Identifies the model behind a transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelRef {
    pub api: String,
    pub provider: String,
    pub id: String,
}

/// Configuration for running turns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub model: ModelRef,
}

/// Everything a transport needs for one turn. The history is read-only and
/// does not include the triggering user message.
pub struct TurnInput<'a> {
    pub history: &'a [Message],
    pub user: &'a Message,
    pub config: &'a RunConfig,
    pub cancel: CancellationToken,
}

/// The event sequence for one turn. Lazy (nothing happens until polled),
/// finite, and non-restartable. A failed turn yields a single `Err` and
/// ends with no events emitted.
pub type EventStream<'a> = Pin<Box<dyn Stream<Item = Result<TurnEvent>> + Send + 'a>>;

/// A strategy for producing one assistant turn.
pub trait TurnTransport: Send + Sync {
    fn run<'a>(&'a self, input: TurnInput<'a>) -> EventStream<'a>;
}
