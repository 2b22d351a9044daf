//! Error types for the store module.

use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend could not be reached or failed to answer.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A multi-window read failed after part of the value was assembled.
    #[error("partial read of {key:?} after {chunks_read} chunks: {source}")]
    PartialRead {
        key: String,
        chunks_read: usize,
        #[source]
        source: Box<StoreError>,
    },

    /// A command was issued against a key holding a different type.
    #[error("wrong type for key {key:?}: expected {expected}")]
    WrongType { key: String, expected: &'static str },

    /// A single command exceeded the backend's payload limit.
    #[error("command payload of {size} bytes exceeds limit of {limit} bytes")]
    CommandTooLarge { size: usize, limit: usize },

    /// Keys must be non-empty.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Rejected chunking configuration.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Invalid data in storage.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),
}

impl StoreError {
    /// Whether this error means the backend itself is failing, as opposed to
    /// a problem with the request or the stored data.
    pub fn is_unavailable(&self) -> bool {
        match self {
            StoreError::Unavailable(_) | StoreError::Database(_) => true,
            StoreError::PartialRead { .. } => true,
            _ => false,
        }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
