//! The logical stores composed into the chat database.

mod messages;
mod sessions;
mod settings;

pub use messages::{MessageRecord, MessageStore, Role, UsageRecord, UsageSummary};
pub use sessions::{SessionRecord, SessionStore};
pub use settings::SettingsStore;
