//! Shared SQLite backend.
//!
//! One connection serves every bound store. The backend is keyed by
//! `(name, version)`: the composed schema union is executed at open and the
//! version is recorded in SQLite's `user_version`, so a reopen at an older
//! version is refused instead of silently dropping schema.

use crate::schema::TableSchema;
use crate::{Error, Result};
use rusqlite::Connection;
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

/// A single persistent-storage handle shared by all composed stores.
#[derive(Debug)]
pub struct Backend {
    name: String,
    version: i32,
    schema: Vec<TableSchema>,
    conn: Mutex<Connection>,
}

impl Backend {
    /// Open or create the backing database at `path` and apply the composed
    /// schema union in order.
    pub(crate) fn open(
        path: impl AsRef<Path>,
        name: &str,
        version: i32,
        schema: Vec<TableSchema>,
    ) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        Self::init(conn, name, version, schema)
    }

    /// In-memory backend for tests.
    pub(crate) fn open_in_memory(
        name: &str,
        version: i32,
        schema: Vec<TableSchema>,
    ) -> Result<Self> {
        Self::init(Connection::open_in_memory()?, name, version, schema)
    }

    fn init(conn: Connection, name: &str, version: i32, schema: Vec<TableSchema>) -> Result<Self> {
        let stored: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
        if stored > version {
            return Err(Error::Initialization(format!(
                "backend '{name}' is at schema version {stored}, requested {version}"
            )));
        }

        for table in &schema {
            conn.execute_batch(&table.ddl)?;
        }
        conn.pragma_update(None, "user_version", version)?;

        debug!(backend = name, version, tables = schema.len(), "backend open");

        Ok(Self {
            name: name.to_string(),
            version,
            schema,
            conn: Mutex::new(conn),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    /// The composed schema union, in composition order.
    pub fn schema(&self) -> &[TableSchema] {
        &self.schema
    }

    /// Run a closure against the shared connection.
    pub(crate) fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| Error::Internal("backend lock poisoned".to_string()))?;
        f(&conn)
    }
}
