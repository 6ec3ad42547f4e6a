use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("bridge error: {0}")]
    Bridge(String),

    #[error("turn cancelled")]
    Cancelled,

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error(transparent)]
    Storage(#[from] storage::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
