//! Session metadata store.

use crate::backend::Backend;
use crate::composer::LogicalStore;
use crate::schema::TableSchema;
use crate::{Error, Result};
use rusqlite::{OptionalExtension, params};
use std::sync::{Arc, OnceLock};

/// A persisted session row.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub key: String,
    pub model: String,
    pub message_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// Store for per-session metadata.
#[derive(Debug)]
pub struct SessionStore {
    backend: OnceLock<Arc<Backend>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            backend: OnceLock::new(),
        }
    }

    fn backend(&self) -> Result<&Arc<Backend>> {
        self.backend.get().ok_or_else(|| {
            Error::NotInitialized("session store used before binding".to_string())
        })
    }

    /// Create the session row if missing, otherwise refresh its model and
    /// update time.
    pub fn upsert(&self, key: &str, model: &str) -> Result<()> {
        self.backend()?.with_conn(|conn| {
            let now = chrono::Utc::now().to_rfc3339();
            conn.execute(
                r#"
                INSERT INTO sessions (key, model, message_count, created_at, updated_at)
                VALUES (?1, ?2, 0, ?3, ?3)
                ON CONFLICT(key) DO UPDATE SET
                    model = excluded.model,
                    updated_at = excluded.updated_at
                "#,
                params![key, model, now],
            )?;
            Ok(())
        })
    }

    /// Bump the message count after a transcript append.
    pub fn record_message(&self, key: &str) -> Result<()> {
        self.backend()?.with_conn(|conn| {
            conn.execute(
                "UPDATE sessions SET message_count = message_count + 1, updated_at = ?2 WHERE key = ?1",
                params![key, chrono::Utc::now().to_rfc3339()],
            )?;
            Ok(())
        })
    }

    pub fn get(&self, key: &str) -> Result<Option<SessionRecord>> {
        self.backend()?.with_conn(|conn| {
            let record = conn
                .query_row(
                    "SELECT key, model, message_count, created_at, updated_at
                     FROM sessions WHERE key = ?1",
                    [key],
                    |row| {
                        Ok(SessionRecord {
                            key: row.get(0)?,
                            model: row.get(1)?,
                            message_count: row.get(2)?,
                            created_at: row.get(3)?,
                            updated_at: row.get(4)?,
                        })
                    },
                )
                .optional()?;
            Ok(record)
        })
    }

    /// All sessions, most recently active first.
    pub fn list(&self) -> Result<Vec<SessionRecord>> {
        self.backend()?.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT key, model, message_count, created_at, updated_at
                 FROM sessions ORDER BY updated_at DESC",
            )?;

            let records = stmt
                .query_map([], |row| {
                    Ok(SessionRecord {
                        key: row.get(0)?,
                        model: row.get(1)?,
                        message_count: row.get(2)?,
                        created_at: row.get(3)?,
                        updated_at: row.get(4)?,
                    })
                })?
                .filter_map(|r| r.ok())
                .collect();

            Ok(records)
        })
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LogicalStore for SessionStore {
    fn config(&self) -> TableSchema {
        TableSchema::new(
            "sessions",
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                key TEXT PRIMARY KEY,
                model TEXT NOT NULL,
                message_count INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
    }

    fn bind(&self, backend: Arc<Backend>) -> Result<()> {
        self.backend
            .set(backend)
            .map_err(|_| Error::Initialization("session store already bound".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AppStorage;

    #[test]
    fn upsert_then_record_messages() {
        let storage = AppStorage::in_memory().unwrap();

        storage.sessions.upsert("main", "default").unwrap();
        storage.sessions.upsert("main", "other-model").unwrap();
        storage.sessions.record_message("main").unwrap();
        storage.sessions.record_message("main").unwrap();

        let session = storage.sessions.get("main").unwrap().unwrap();
        assert_eq!(session.model, "other-model");
        assert_eq!(session.message_count, 2);

        assert!(storage.sessions.get("missing").unwrap().is_none());
        assert_eq!(storage.sessions.list().unwrap().len(), 1);
    }
}
