//! Transcript store.
//!
//! One row per message, keyed by session. Content blocks and usage are
//! stored as JSON so the row shape survives additive changes to the message
//! model. The store also declares a class-level companion schema, the
//! `token_usage` ledger, which is independent of any single store instance.

use crate::backend::Backend;
use crate::composer::LogicalStore;
use crate::schema::TableSchema;
use crate::{Error, Result};
use rusqlite::params;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};

/// The role of a transcript message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }
}

/// A persisted message row.
#[derive(Debug, Clone)]
pub struct MessageRecord {
    pub id: String,
    pub session_key: String,
    pub role: Role,
    /// Content blocks as JSON.
    pub content: String,
    pub api: Option<String>,
    pub provider: Option<String>,
    pub model: Option<String>,
    /// Usage record as JSON.
    pub usage: String,
    pub stop_reason: String,
    /// RFC 3339 capture time.
    pub created_at: String,
}

/// One turn's token accounting for the `token_usage` ledger.
#[derive(Debug, Clone)]
pub struct UsageRecord {
    pub session_key: String,
    pub model: String,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub cache_read_tokens: i64,
    pub cache_write_tokens: i64,
    pub cost_total: f64,
}

/// Summed ledger counters for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct UsageSummary {
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub cache_read_tokens: i64,
    pub cache_write_tokens: i64,
    pub cost_total: f64,
}

/// Store for session transcripts.
#[derive(Debug)]
pub struct MessageStore {
    backend: OnceLock<Arc<Backend>>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self {
            backend: OnceLock::new(),
        }
    }

    /// Class-level auxiliary schema: the token-usage ledger shared by every
    /// message store instance.
    pub fn usage_schema() -> TableSchema {
        TableSchema::new(
            "token_usage",
            r#"
            CREATE TABLE IF NOT EXISTS token_usage (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_key TEXT NOT NULL,
                model TEXT NOT NULL,
                input_tokens INTEGER NOT NULL,
                output_tokens INTEGER NOT NULL,
                cache_read_tokens INTEGER NOT NULL,
                cache_write_tokens INTEGER NOT NULL,
                cost_total REAL NOT NULL,
                recorded_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_token_usage_session
                ON token_usage(session_key, recorded_at);
            "#,
        )
    }

    fn backend(&self) -> Result<&Arc<Backend>> {
        self.backend.get().ok_or_else(|| {
            Error::NotInitialized("message store used before binding".to_string())
        })
    }

    /// Append a message row.
    pub fn append(&self, record: &MessageRecord) -> Result<()> {
        self.backend()?.with_conn(|conn| {
            conn.execute(
                r#"
                INSERT INTO messages (id, session_key, role, content, api, provider,
                                      model, usage, stop_reason, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                "#,
                params![
                    record.id,
                    record.session_key,
                    record.role.as_str(),
                    record.content,
                    record.api,
                    record.provider,
                    record.model,
                    record.usage,
                    record.stop_reason,
                    record.created_at,
                ],
            )?;
            Ok(())
        })
    }

    /// Load a session transcript in insertion order.
    pub fn load(&self, session_key: &str) -> Result<Vec<MessageRecord>> {
        self.backend()?.with_conn(|conn| {
            let mut stmt = conn.prepare(
                r#"
                SELECT id, session_key, role, content, api, provider,
                       model, usage, stop_reason, created_at
                FROM messages
                WHERE session_key = ?1
                ORDER BY created_at, rowid
                "#,
            )?;

            let records = stmt
                .query_map([session_key], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, Option<String>>(4)?,
                        row.get::<_, Option<String>>(5)?,
                        row.get::<_, Option<String>>(6)?,
                        row.get::<_, String>(7)?,
                        row.get::<_, String>(8)?,
                        row.get::<_, String>(9)?,
                    ))
                })?
                .filter_map(|r| r.ok())
                .filter_map(
                    |(id, session_key, role, content, api, provider, model, usage, stop, at)| {
                        Some(MessageRecord {
                            id,
                            session_key,
                            role: Role::parse(&role)?,
                            content,
                            api,
                            provider,
                            model,
                            usage,
                            stop_reason: stop,
                            created_at: at,
                        })
                    },
                )
                .collect();

            Ok(records)
        })
    }

    /// Number of messages stored for a session.
    pub fn count(&self, session_key: &str) -> Result<i64> {
        self.backend()?.with_conn(|conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM messages WHERE session_key = ?1",
                [session_key],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }

    /// Record one turn's token accounting in the ledger.
    pub fn record_usage(&self, record: &UsageRecord) -> Result<()> {
        self.backend()?.with_conn(|conn| {
            conn.execute(
                r#"
                INSERT INTO token_usage (session_key, model, input_tokens, output_tokens,
                                         cache_read_tokens, cache_write_tokens, cost_total,
                                         recorded_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
                params![
                    record.session_key,
                    record.model,
                    record.input_tokens,
                    record.output_tokens,
                    record.cache_read_tokens,
                    record.cache_write_tokens,
                    record.cost_total,
                    chrono::Utc::now().to_rfc3339(),
                ],
            )?;
            Ok(())
        })
    }

    /// Summed ledger counters for a session.
    pub fn usage_total(&self, session_key: &str) -> Result<UsageSummary> {
        self.backend()?.with_conn(|conn| {
            let summary = conn.query_row(
                r#"
                SELECT COALESCE(SUM(input_tokens), 0),
                       COALESCE(SUM(output_tokens), 0),
                       COALESCE(SUM(cache_read_tokens), 0),
                       COALESCE(SUM(cache_write_tokens), 0),
                       COALESCE(SUM(cost_total), 0)
                FROM token_usage WHERE session_key = ?1
                "#,
                [session_key],
                |row| {
                    Ok(UsageSummary {
                        input_tokens: row.get(0)?,
                        output_tokens: row.get(1)?,
                        cache_read_tokens: row.get(2)?,
                        cache_write_tokens: row.get(3)?,
                        cost_total: row.get(4)?,
                    })
                },
            )?;
            Ok(summary)
        })
    }
}

impl Default for MessageStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LogicalStore for MessageStore {
    fn config(&self) -> TableSchema {
        TableSchema::new(
            "messages",
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                session_key TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                api TEXT,
                provider TEXT,
                model TEXT,
                usage TEXT NOT NULL,
                stop_reason TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_messages_session
                ON messages(session_key, created_at);
            "#,
        )
    }

    fn bind(&self, backend: Arc<Backend>) -> Result<()> {
        self.backend
            .set(backend)
            .map_err(|_| Error::Initialization("message store already bound".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AppStorage;

    fn record(session_key: &str, role: Role, content: &str) -> MessageRecord {
        MessageRecord {
            id: format!("{role:?}-{content}"),
            session_key: session_key.to_string(),
            role,
            content: content.to_string(),
            api: None,
            provider: None,
            model: None,
            usage: "{}".to_string(),
            stop_reason: "stop".to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    #[test]
    fn append_and_load_preserve_order() {
        let storage = AppStorage::in_memory().unwrap();

        storage
            .messages
            .append(&record("main", Role::User, "[]"))
            .unwrap();
        storage
            .messages
            .append(&record("main", Role::Assistant, "[1]"))
            .unwrap();
        storage
            .messages
            .append(&record("other", Role::User, "[2]"))
            .unwrap();

        let transcript = storage.messages.load("main").unwrap();
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[0].role, Role::User);
        assert_eq!(transcript[1].role, Role::Assistant);
        assert_eq!(storage.messages.count("main").unwrap(), 2);
        assert_eq!(storage.messages.count("other").unwrap(), 1);
    }

    #[test]
    fn access_before_binding_fails() {
        let store = MessageStore::new();
        let err = store.count("main").unwrap_err();
        assert!(matches!(err, Error::NotInitialized(_)));
    }

    #[test]
    fn usage_ledger_sums_per_session() {
        let storage = AppStorage::in_memory().unwrap();

        let usage = UsageRecord {
            session_key: "main".to_string(),
            model: "default".to_string(),
            input_tokens: 3,
            output_tokens: 5,
            cache_read_tokens: 0,
            cache_write_tokens: 0,
            cost_total: 0.0,
        };
        storage.messages.record_usage(&usage).unwrap();
        storage.messages.record_usage(&usage).unwrap();

        let total = storage.messages.usage_total("main").unwrap();
        assert_eq!(total.input_tokens, 6);
        assert_eq!(total.output_tokens, 10);
        assert_eq!(total.cost_total, 0.0);

        let empty = storage.messages.usage_total("other").unwrap();
        assert_eq!(empty, UsageSummary::default());
    }
}
