//! Strong type definitions for Tensions.
//!
//! All identifiers are newtypes to prevent misuse at compile time.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::crypto::Ed25519PublicKey;

/// Parse exactly 32 bytes from a hex string.
pub(crate) fn decode_hex32(s: &str) -> Result<[u8; 32], hex::FromHexError> {
    let bytes = hex::decode(s)?;
    if bytes.len() != 32 {
        return Err(hex::FromHexError::InvalidStringLength);
    }
    let mut arr = [0u8; 32];
    arr.copy_from_slice(&bytes);
    Ok(arr)
}

/// A 32-byte content identifier, computed as
/// Blake3(ID_DOMAIN || canonical_entries_bytes(entries)).
///
/// This is the content-address of a POD and, once a record is finalized, its
/// storage key. Two PODs with the same entries have the same ContentId,
/// regardless of who signed them.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentId(pub [u8; 32]);

impl ContentId {
    /// Create a new ContentId from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to a lowercase hex string (always 64 characters).
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        decode_hex32(s).map(Self)
    }
}

impl fmt::Debug for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentId({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl AsRef<[u8]> for ContentId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for ContentId {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

/// A 32-byte cryptographic entry value, e.g. the public key of a record owner.
///
/// Serialized as a lowercase hex string.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CryptoValue(pub [u8; 32]);

impl CryptoValue {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        decode_hex32(s).map(Self)
    }
}

impl fmt::Debug for CryptoValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CryptoValue({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for CryptoValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl From<Ed25519PublicKey> for CryptoValue {
    fn from(key: Ed25519PublicKey) -> Self {
        Self(key.0)
    }
}

impl Serialize for CryptoValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for CryptoValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        CryptoValue::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_id_hex_roundtrip() {
        let id = ContentId::from_bytes([0x42; 32]);
        let hex = id.to_hex();
        assert_eq!(hex.len(), 64);
        let recovered = ContentId::from_hex(&hex).unwrap();
        assert_eq!(id, recovered);
    }

    #[test]
    fn test_content_id_display_is_full_hex() {
        let id = ContentId::from_bytes([0xab; 32]);
        assert_eq!(format!("{}", id), "ab".repeat(32));
    }

    #[test]
    fn test_content_id_rejects_short_hex() {
        assert!(ContentId::from_hex("abcd").is_err());
    }

    #[test]
    fn test_crypto_value_json_is_hex_string() {
        let value = CryptoValue::from_bytes([0x01; 32]);
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, format!("\"{}\"", "01".repeat(32)));

        let back: CryptoValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, value);
    }
}
