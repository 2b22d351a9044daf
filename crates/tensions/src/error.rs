//! Error types for the Registry.

use tensions_core::{ContentId, CoreError};
use tensions_store::StoreError;
use thiserror::Error;

/// Errors that can occur during Registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Record encoding, decoding or signing error.
    #[error("record error: {0}")]
    Core(#[from] CoreError),

    /// No record stored under the id.
    #[error("record not found: {0}")]
    NotFound(String),

    /// The template named by a claim does not exist.
    #[error("template not found: {0}")]
    TemplateMissing(String),

    /// A record with the claimed content id is already stored.
    #[error("already minted record {0}")]
    AlreadyMinted(ContentId),

    /// The claim's signature does not verify.
    #[error("invalid claim signature")]
    InvalidSignature,

    /// Request is missing a field or carries one of the wrong type.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A stored value that does not parse as a record.
    #[error("corrupt record at {key}: {reason}")]
    CorruptRecord { key: String, reason: String },

    /// Missing or malformed configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Coarse classification of a [`RegistryError`], for mapping onto a
/// transport's status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    BadRequest,
    Conflict,
    Unavailable,
    Internal,
}

impl RegistryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RegistryError::NotFound(_) | RegistryError::TemplateMissing(_) => ErrorKind::NotFound,
            RegistryError::InvalidSignature | RegistryError::InvalidRequest(_) => {
                ErrorKind::BadRequest
            }
            RegistryError::AlreadyMinted(_) => ErrorKind::Conflict,
            RegistryError::Store(e) if e.is_unavailable() => ErrorKind::Unavailable,
            RegistryError::Store(StoreError::InvalidKey(_)) => ErrorKind::BadRequest,
            RegistryError::Store(_) => ErrorKind::Internal,
            RegistryError::Core(CoreError::EncodingError(_)) => ErrorKind::Internal,
            RegistryError::Core(_) => ErrorKind::BadRequest,
            RegistryError::CorruptRecord { .. } | RegistryError::Config(_) => ErrorKind::Internal,
        }
    }
}

/// Result type for Registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;
