//! Coxswain runtime — turn transport and conversation engine.
//!
//! The runtime adapts the host application's single request/response chat
//! call into the ordered event sequence a chat loop expects, and drives
//! conversations over that adapter.
//!
//! # Overview
//!
//! - **TurnTransport**: a trait producing one turn as a lazy, finite stream
//!   of [`TurnEvent`]s. Any transport — the single-shot host bridge today, a
//!   streaming network transport later — is iterated identically.
//! - **HostBridge**: the opaque host call (`{ type: "chat", payload }` in,
//!   `{ text }` out), with a subprocess implementation.
//! - **Agent**: owns one session's history, runs turns over whichever
//!   transport it was given, and persists the transcript through the
//!   composed storage handle.
//!
//! # Example
//!
//! ```ignore
//! use runtime::{Agent, Bootstrap, BridgeTransport, ProcessBridge};
//!
//! # async fn example(config: runtime::RunConfig) -> runtime::Result<()> {
//! let storage = storage::install_app_storage(storage::AppStorage::open("chat.db")?)?;
//! let bridge = ProcessBridge::new("coxswain-host");
//! let transport = BridgeTransport::new(bridge, "main");
//!
//! let mut agent = Agent::new(transport, config, Bootstrap::default(), storage)?;
//! let reply = agent.prompt("Hello!").await?;
//! println!("{}", reply.text());
//! # Ok(())
//! # }
//! ```

mod agent;
mod bridge;
mod error;
mod message;
mod transport;
mod turn;

// Conversation engine
pub use agent::{Agent, Bootstrap};

// Host bridge
pub use bridge::{BridgePayload, BridgeRequest, BridgeResponse, HostBridge, ProcessBridge};

// Error types
pub use error::{Error, Result};

// Message and turn model
pub use message::{ContentBlock, Cost, Message, StopReason, Usage};
pub use turn::TurnEvent;

// Transports
pub use transport::{BridgeTransport, EventStream, ModelRef, RunConfig, TurnInput, TurnTransport};
