//! Storage composition.
//!
//! Several independent logical stores share one backend. The composer
//! collects every store's schema descriptor (plus any class-level auxiliary
//! descriptors), unions them in the order supplied, opens a single backend
//! from the union, and binds each store to it. The resulting aggregate is
//! installed once into a process-wide holder; reading the holder before
//! installation is an error, never a silent default.

use crate::backend::Backend;
use crate::schema::TableSchema;
use crate::stores::{MessageStore, SessionStore, SettingsStore};
use crate::{Error, Result};
use std::path::Path;
use std::sync::{Arc, OnceLock};
use tracing::info;

/// Backend identity for the composed chat database.
const BACKEND_NAME: &str = "coxswain";

/// Version of the whole schema union. Bump only for additive, order-stable
/// changes; the backend refuses to reopen at a lower version.
const SCHEMA_VERSION: i32 = 1;

/// A named store that contributes a schema descriptor and is bound to
/// exactly one backend after composition.
pub trait LogicalStore {
    /// This store's schema declaration.
    fn config(&self) -> TableSchema;

    /// Bind the store to the composed backend. Binding twice is rejected.
    fn bind(&self, backend: Arc<Backend>) -> Result<()>;
}

/// Union the descriptors of `stores` and `aux_schemas` in order, open one
/// backend at `(name, version)`, and bind every store to it.
///
/// Two descriptors that collide on the same name with differing DDL fail
/// composition: that is a data-loss risk on migration and must surface.
/// Identical duplicates are tolerated and kept once.
pub fn compose(
    path: impl AsRef<Path>,
    name: &str,
    version: i32,
    stores: &[&dyn LogicalStore],
    aux_schemas: &[TableSchema],
) -> Result<Arc<Backend>> {
    let schema = union_schemas(stores, aux_schemas)?;
    let backend = Arc::new(Backend::open(path, name, version, schema)?);
    bind_all(stores, &backend)?;
    Ok(backend)
}

/// In-memory variant of [`compose`] for tests.
pub fn compose_in_memory(
    name: &str,
    version: i32,
    stores: &[&dyn LogicalStore],
    aux_schemas: &[TableSchema],
) -> Result<Arc<Backend>> {
    let schema = union_schemas(stores, aux_schemas)?;
    let backend = Arc::new(Backend::open_in_memory(name, version, schema)?);
    bind_all(stores, &backend)?;
    Ok(backend)
}

fn union_schemas(
    stores: &[&dyn LogicalStore],
    aux_schemas: &[TableSchema],
) -> Result<Vec<TableSchema>> {
    let mut union: Vec<TableSchema> = Vec::new();

    for schema in stores
        .iter()
        .map(|s| s.config())
        .chain(aux_schemas.iter().cloned())
    {
        match union.iter().find(|existing| existing.name == schema.name) {
            None => union.push(schema),
            Some(existing) if existing.ddl == schema.ddl => {}
            Some(_) => {
                return Err(Error::Initialization(format!(
                    "conflicting schema declarations for store '{}'",
                    schema.name
                )));
            }
        }
    }

    Ok(union)
}

fn bind_all(stores: &[&dyn LogicalStore], backend: &Arc<Backend>) -> Result<()> {
    for store in stores {
        store.bind(Arc::clone(backend))?;
    }
    Ok(())
}

/// The composed persistence façade: every logical store plus the backend
/// they share.
#[derive(Debug)]
pub struct AppStorage {
    pub messages: MessageStore,
    pub sessions: SessionStore,
    pub settings: SettingsStore,
    backend: Arc<Backend>,
}

impl AppStorage {
    /// Compose the chat stores over a database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let messages = MessageStore::new();
        let sessions = SessionStore::new();
        let settings = SettingsStore::new();
        let backend = compose(
            path,
            BACKEND_NAME,
            SCHEMA_VERSION,
            &[&messages, &sessions, &settings],
            &[MessageStore::usage_schema()],
        )?;
        Ok(Self {
            messages,
            sessions,
            settings,
            backend,
        })
    }

    /// In-memory composition for tests.
    pub fn in_memory() -> Result<Self> {
        let messages = MessageStore::new();
        let sessions = SessionStore::new();
        let settings = SettingsStore::new();
        let backend = compose_in_memory(
            BACKEND_NAME,
            SCHEMA_VERSION,
            &[&messages, &sessions, &settings],
            &[MessageStore::usage_schema()],
        )?;
        Ok(Self {
            messages,
            sessions,
            settings,
            backend,
        })
    }

    pub fn backend(&self) -> &Arc<Backend> {
        &self.backend
    }
}

/// Holder for the process-wide storage handle.
///
/// Kept as its own type so the install/read contract is testable without
/// touching the real process-wide cell.
pub(crate) struct StorageCell(OnceLock<Arc<AppStorage>>);

impl StorageCell {
    pub(crate) const fn new() -> Self {
        Self(OnceLock::new())
    }

    pub(crate) fn install(&self, storage: AppStorage) -> Result<Arc<AppStorage>> {
        let storage = Arc::new(storage);
        self.0
            .set(Arc::clone(&storage))
            .map_err(|_| Error::Initialization("app storage already installed".to_string()))?;
        Ok(storage)
    }

    pub(crate) fn get(&self) -> Result<Arc<AppStorage>> {
        self.0.get().cloned().ok_or_else(|| {
            Error::NotInitialized("app storage read before installation".to_string())
        })
    }
}

static APP_STORAGE: StorageCell = StorageCell::new();

/// Install the composed storage as the process-wide handle. Allowed exactly
/// once; re-installation is rejected to keep the lifecycle unambiguous.
pub fn install_app_storage(storage: AppStorage) -> Result<Arc<AppStorage>> {
    let storage = APP_STORAGE.install(storage)?;
    info!(
        backend = storage.backend.name(),
        version = storage.backend.version(),
        "app storage installed"
    );
    Ok(storage)
}

/// The process-wide storage handle. Fails until [`install_app_storage`] has
/// run.
pub fn app_storage() -> Result<Arc<AppStorage>> {
    APP_STORAGE.get()
}
