use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("storage initialization failed: {0}")]
    Initialization(String),

    #[error("storage not initialized: {0}")]
    NotInitialized(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
