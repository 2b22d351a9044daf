//! Stored record shapes.
//!
//! Two kinds of record share the keyspace: templates created by an admin
//! ([`StoredTension`]) and owner-bound copies minted by a claim
//! ([`OwnedRecord`]). Both are JSON documents carrying the serialized POD.

use serde::{Deserialize, Serialize};
use tensions_core::{CryptoValue, Pod, PodEntries};

use crate::error::Result;

/// Entry holding the claimant's public key on an owned record.
pub const OWNER_ENTRY: &str = "owner";

/// Entry stamped with the signing time (Unix ms).
pub const TIMESTAMP_ENTRY: &str = "timestamp";

/// A tension as submitted by an admin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TensionRequest {
    pub force_a: String,
    pub force_b: String,
    /// Card image, base64 encoded. Usually the bulk of the record.
    pub base64_image: String,
    pub image_file_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Where the card sits between the two forces, 0 to 100.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tradeoff: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lighthouse: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idea_source: Option<String>,
    pub pod_folder: String,
    /// Entries to sign. Any `owner` entry is dropped on create.
    pub pod_entries: PodEntries,
}

/// A template as stored: the request plus the POD signed from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredTension {
    #[serde(flatten)]
    pub request: TensionRequest,
    #[serde(rename = "serializedPOD")]
    pub serialized_pod: String,
}

/// A claimed copy of a template, bound to its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OwnedRecord {
    pub owner: CryptoValue,
    #[serde(rename = "serializedPOD")]
    pub serialized_pod: String,
}

/// Either kind of stored record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredRecord {
    Owned(OwnedRecord),
    Template(StoredTension),
}

impl StoredRecord {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn serialized_pod(&self) -> &str {
        match self {
            StoredRecord::Owned(r) => &r.serialized_pod,
            StoredRecord::Template(t) => &t.serialized_pod,
        }
    }

    /// Parse the embedded POD.
    pub fn pod(&self) -> Result<Pod> {
        Ok(Pod::deserialize(self.serialized_pod())?)
    }

    pub fn is_owned(&self) -> bool {
        matches!(self, StoredRecord::Owned(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tensions_core::{Keypair, PodValue};

    fn request() -> TensionRequest {
        let mut entries = PodEntries::new();
        entries
            .insert("forceA", PodValue::String("speed".into()))
            .unwrap();
        entries.insert("tradeoff", PodValue::Int(40)).unwrap();

        TensionRequest {
            force_a: "speed".into(),
            force_b: "safety".into(),
            base64_image: "aGVsbG8=".into(),
            image_file_name: "card.png".into(),
            source: None,
            author: None,
            tradeoff: Some(40),
            details: None,
            lighthouse: None,
            idea_source: None,
            pod_folder: "tensions".into(),
            pod_entries: entries,
        }
    }

    #[test]
    fn test_request_json_field_names() {
        let json = serde_json::to_value(request()).unwrap();
        assert_eq!(json["forceA"], "speed");
        assert_eq!(json["base64Image"], "aGVsbG8=");
        assert_eq!(json["podEntries"]["tradeoff"]["type"], "int");
        assert!(json.get("source").is_none());
        assert_eq!(json["tradeoff"], 40);
        assert!(json.get("ideaSource").is_none());
    }

    #[test]
    fn test_request_with_card_details() {
        let json = r#"{
            "forceA": "speed",
            "forceB": "safety",
            "base64Image": "aGVsbG8=",
            "imageFileName": "card.png",
            "author": "ada",
            "tradeoff": 70,
            "details": "ship it",
            "lighthouse": "north",
            "ideaSource": "workshop",
            "podFolder": "tensions",
            "podEntries": {}
        }"#;
        let parsed: TensionRequest = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.author.as_deref(), Some("ada"));
        assert_eq!(parsed.tradeoff, Some(70));
        assert_eq!(parsed.details.as_deref(), Some("ship it"));
        assert_eq!(parsed.lighthouse.as_deref(), Some("north"));
        assert_eq!(parsed.idea_source.as_deref(), Some("workshop"));
        assert_eq!(parsed.source, None);

        let back = serde_json::to_value(&parsed).unwrap();
        assert_eq!(back["ideaSource"], "workshop");
        assert!(back.get("idea_source").is_none());
    }

    #[test]
    fn test_stored_record_shapes() {
        let template = StoredTension {
            request: request(),
            serialized_pod: "{}".into(),
        };
        let json = serde_json::to_string(&template).unwrap();
        assert!(json.contains("\"serializedPOD\""));
        assert_eq!(
            StoredRecord::from_json(&json).unwrap(),
            StoredRecord::Template(template)
        );

        let owner = CryptoValue::from(Keypair::from_seed(&[1; 32]).public_key());
        let owned = OwnedRecord {
            owner,
            serialized_pod: "{}".into(),
        };
        let json = serde_json::to_string(&owned).unwrap();
        let parsed = StoredRecord::from_json(&json).unwrap();
        assert!(parsed.is_owned());
        assert_eq!(parsed.serialized_pod(), "{}");
    }

    #[test]
    fn test_unrelated_json_is_rejected() {
        assert!(StoredRecord::from_json("{\"hello\": 1}").is_err());
        assert!(StoredRecord::from_json("not json").is_err());
    }
}
