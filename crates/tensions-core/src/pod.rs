//! POD: a signed, content-addressed record of typed entries.
//!
//! A POD is immutable once signed. Changing any entry yields a new POD with
//! a new content id; the signature covers the content id.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::canonical::content_id;
use crate::crypto::{Ed25519PublicKey, Ed25519Signature, Keypair};
use crate::error::CoreError;
use crate::types::{ContentId, CryptoValue};

/// A typed entry value.
///
/// JSON form: `{"type": "string" | "int" | "cryptographic", "value": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum PodValue {
    String(String),
    Int(i64),
    Cryptographic(CryptoValue),
}

impl PodValue {
    /// The string payload, if this is a string entry.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PodValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            PodValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_cryptographic(&self) -> Option<&CryptoValue> {
        match self {
            PodValue::Cryptographic(c) => Some(c),
            _ => None,
        }
    }

    /// Name of the value type as it appears in JSON.
    pub fn type_name(&self) -> &'static str {
        match self {
            PodValue::String(_) => "string",
            PodValue::Int(_) => "int",
            PodValue::Cryptographic(_) => "cryptographic",
        }
    }
}

/// Check an entry name against `[A-Za-z_][A-Za-z0-9_]*`.
pub fn validate_entry_name(name: &str) -> Result<(), CoreError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };

    if valid {
        Ok(())
    } else {
        Err(CoreError::InvalidEntryName(name.to_string()))
    }
}

/// The entries of a POD, ordered by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, PodValue>")]
pub struct PodEntries(BTreeMap<String, PodValue>);

impl PodEntries {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Insert or replace an entry, returning the previous value.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        value: PodValue,
    ) -> Result<Option<PodValue>, CoreError> {
        let name = name.into();
        validate_entry_name(&name)?;
        Ok(self.0.insert(name, value))
    }

    pub fn get(&self, name: &str) -> Option<&PodValue> {
        self.0.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<PodValue> {
        self.0.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PodValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Compute the content id of these entries.
    pub fn content_id(&self) -> ContentId {
        content_id(self)
    }
}

impl TryFrom<BTreeMap<String, PodValue>> for PodEntries {
    type Error = CoreError;

    fn try_from(map: BTreeMap<String, PodValue>) -> Result<Self, Self::Error> {
        for name in map.keys() {
            validate_entry_name(name)?;
        }
        Ok(Self(map))
    }
}

/// Serialized form of a POD.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PodWire {
    entries: PodEntries,
    signer_public_key: String,
    signature: String,
}

/// A signed POD.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pod {
    entries: PodEntries,
    signer: Ed25519PublicKey,
    signature: Ed25519Signature,
    content_id: ContentId,
}

impl Pod {
    /// Sign a set of entries.
    pub fn sign(entries: PodEntries, keypair: &Keypair) -> Self {
        let content_id = entries.content_id();
        let signature = keypair.sign(content_id.as_bytes());
        Self {
            entries,
            signer: keypair.public_key(),
            signature,
            content_id,
        }
    }

    pub fn entries(&self) -> &PodEntries {
        &self.entries
    }

    /// Consume the POD, returning its entries.
    pub fn into_entries(self) -> PodEntries {
        self.entries
    }

    pub fn signer(&self) -> &Ed25519PublicKey {
        &self.signer
    }

    pub fn signature(&self) -> &Ed25519Signature {
        &self.signature
    }

    pub fn content_id(&self) -> ContentId {
        self.content_id
    }

    /// Verify that the signature covers this POD's content id.
    pub fn verify_signature(&self) -> Result<(), CoreError> {
        self.signer
            .verify(self.content_id.as_bytes(), &self.signature)
    }

    /// Serialize to the JSON string form stored and exchanged by clients.
    pub fn serialize(&self) -> Result<String, CoreError> {
        let wire = PodWire {
            entries: self.entries.clone(),
            signer_public_key: self.signer.to_hex(),
            signature: self.signature.to_hex(),
        };
        serde_json::to_string(&wire).map_err(|e| CoreError::EncodingError(e.to_string()))
    }

    /// Parse the JSON string form.
    ///
    /// The content id is recomputed from the entries; the signature is not
    /// checked here, call [`Pod::verify_signature`] for that.
    pub fn deserialize(s: &str) -> Result<Self, CoreError> {
        let wire: PodWire = serde_json::from_str(s)?;
        let signer = Ed25519PublicKey::from_hex(&wire.signer_public_key)
            .map_err(|e| CoreError::MalformedPod(format!("signer public key: {}", e)))?;
        let signature = Ed25519Signature::from_hex(&wire.signature)
            .map_err(|e| CoreError::MalformedPod(format!("signature: {}", e)))?;
        let content_id = wire.entries.content_id();

        Ok(Self {
            entries: wire.entries,
            signer,
            signature,
            content_id,
        })
    }
}
