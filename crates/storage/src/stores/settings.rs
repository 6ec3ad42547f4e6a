//! Small key/value store for UI and boot settings.

use crate::backend::Backend;
use crate::composer::LogicalStore;
use crate::schema::TableSchema;
use crate::{Error, Result};
use rusqlite::{OptionalExtension, params};
use serde_json::Value;
use std::sync::{Arc, OnceLock};

#[derive(Debug)]
pub struct SettingsStore {
    backend: OnceLock<Arc<Backend>>,
}

impl SettingsStore {
    pub fn new() -> Self {
        Self {
            backend: OnceLock::new(),
        }
    }

    fn backend(&self) -> Result<&Arc<Backend>> {
        self.backend.get().ok_or_else(|| {
            Error::NotInitialized("settings store used before binding".to_string())
        })
    }

    pub fn set(&self, key: &str, value: &Value) -> Result<()> {
        let json = serde_json::to_string(value)?;
        self.backend()?.with_conn(|conn| {
            conn.execute(
                "INSERT INTO settings (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, json],
            )?;
            Ok(())
        })
    }

    pub fn get(&self, key: &str) -> Result<Option<Value>> {
        let json: Option<String> = self.backend()?.with_conn(|conn| {
            let value = conn
                .query_row("SELECT value FROM settings WHERE key = ?1", [key], |row| {
                    row.get(0)
                })
                .optional()?;
            Ok(value)
        })?;

        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LogicalStore for SettingsStore {
    fn config(&self) -> TableSchema {
        TableSchema::new(
            "settings",
            r#"
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )
    }

    fn bind(&self, backend: Arc<Backend>) -> Result<()> {
        self.backend
            .set(backend)
            .map_err(|_| Error::Initialization("settings store already bound".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AppStorage;
    use serde_json::json;

    #[test]
    fn set_overwrites_and_get_round_trips() {
        let storage = AppStorage::in_memory().unwrap();

        storage.settings.set("last_session_key", &json!("main")).unwrap();
        storage
            .settings
            .set("last_session_key", &json!("scratch"))
            .unwrap();

        assert_eq!(
            storage.settings.get("last_session_key").unwrap(),
            Some(json!("scratch"))
        );
        assert_eq!(storage.settings.get("missing").unwrap(), None);
    }
}
