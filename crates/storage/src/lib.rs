//! Composed SQLite storage for Coxswain.
//!
//! Several independent logical stores — the transcript, session metadata,
//! and settings — share one SQLite backend. Each store declares its schema
//! through [`LogicalStore::config`]; the composer unions the declarations in
//! order, opens a single [`Backend`] keyed by `(name, version)`, and binds
//! every store to it. The resulting [`AppStorage`] aggregate is installed
//! once as the process-wide persistence handle.
//!
//! # Core Concepts
//!
//! ## LogicalStore
//!
//! A named store with a schema descriptor, bound at most once to exactly one
//! backend. Using a store before binding fails with
//! [`Error::NotInitialized`]; binding it twice is rejected.
//!
//! ## Backend
//!
//! The single shared connection. The composed schema union is executed at
//! open and its version is recorded in `user_version`, so reopening at a
//! lower version fails instead of risking data loss.
//!
//! ## Composition
//!
//! [`AppStorage::open`] composes the chat stores (plus the message store's
//! class-level `token_usage` ledger) over one database file.
//! [`install_app_storage`] publishes the aggregate process-wide;
//! [`app_storage`] reads it back and fails until installation has happened.
//!
//! # Example
//!
//! ```no_run
//! use storage::{AppStorage, install_app_storage, app_storage};
//!
//! let storage = install_app_storage(AppStorage::open("chat.db")?)?;
//! storage.sessions.upsert("main", "default")?;
//!
//! // Any later consumer:
//! let storage = app_storage()?;
//! let sessions = storage.sessions.list()?;
//! # Ok::<(), storage::Error>(())
//! ```

mod backend;
mod composer;
mod error;
mod schema;
mod stores;

pub use backend::Backend;
pub use composer::{
    AppStorage, LogicalStore, app_storage, compose, compose_in_memory, install_app_storage,
};
pub use error::{Error, Result};
pub use schema::TableSchema;
pub use stores::{
    MessageRecord, MessageStore, Role, SessionRecord, SessionStore, SettingsStore, UsageRecord,
    UsageSummary,
};
