//! Error types for Tensions Core.

use thiserror::Error;

/// Errors that can occur while building, signing or decoding PODs.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("invalid entry name: {0:?}")]
    InvalidEntryName(String),

    #[error("invalid hex value: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    #[error("malformed pod: {0}")]
    MalformedPod(String),

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("decoding error: {0}")]
    DecodingError(String),
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::DecodingError(e.to_string())
    }
}
