//! The Registry: lifecycle of tension records.
//!
//! Templates are signed by the registry's signer and stored under their
//! content id. A claim exchanges a user-signed POD naming a template for an
//! owner-bound copy of that template, signed again by the registry.

use std::sync::Arc;

use tensions_core::{ContentId, Ed25519PublicKey, Pod, PodEntries, PodValue, RecordSigner};
use tensions_store::{ChunkedStore, KvBackend};
use tracing::{debug, info, warn};

use crate::config::RegistryConfig;
use crate::error::{RegistryError, Result};
use crate::tension::{
    OwnedRecord, StoredRecord, StoredTension, TensionRequest, OWNER_ENTRY, TIMESTAMP_ENTRY,
};

/// Claim entry naming the template to copy.
pub const TEMPLATE_ID_ENTRY: &str = "templateId";

/// Claim entry carrying the claimant's public key.
pub const PUBKEY_ENTRY: &str = "pubkey";

/// Template entry coerced from int to string on claimed copies.
pub const TRADEOFF_ENTRY: &str = "tradeoff";

/// The main Registry struct.
///
/// Holds the chunked store and the signing capability. Both are fixed at
/// construction; nothing is global.
pub struct Registry<B: KvBackend, S: RecordSigner> {
    store: ChunkedStore<B>,
    signer: S,
}

impl<B: KvBackend, S: RecordSigner> Registry<B, S> {
    /// Create a registry over a shared backend handle.
    pub fn new(backend: Arc<B>, signer: S, config: RegistryConfig) -> Self {
        Self {
            store: ChunkedStore::new(backend, config.chunking),
            signer,
        }
    }

    /// The public key records are signed with.
    pub fn public_key(&self) -> Ed25519PublicKey {
        self.signer.public_key()
    }

    pub fn store(&self) -> &ChunkedStore<B> {
        &self.store
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Templates
    // ─────────────────────────────────────────────────────────────────────────

    /// Sign and store a new template. Returns the content id it is stored
    /// under.
    pub async fn create(&self, mut request: TensionRequest) -> Result<ContentId> {
        request.pod_entries.remove(OWNER_ENTRY);

        let pod = self.sign_stamped(&request.pod_entries)?;
        let id = pod.content_id();
        let record = StoredTension {
            request,
            serialized_pod: pod.serialize()?,
        };

        self.put(&id.to_hex(), &record).await?;
        info!(id = %id, "created tension");
        Ok(id)
    }

    /// Fetch a record of either kind.
    pub async fn get(&self, id: &str) -> Result<Option<StoredRecord>> {
        match self.store.read(id).await? {
            Some(json) => parse_record(id, &json).map(Some),
            None => Ok(None),
        }
    }

    /// Re-sign a template with new content, keeping its id.
    pub async fn update(&self, id: &str, request: TensionRequest) -> Result<Pod> {
        if self.store.read(id).await?.is_none() {
            return Err(RegistryError::NotFound(id.to_string()));
        }

        let pod = self.sign_stamped(&request.pod_entries)?;
        let record = StoredTension {
            request,
            serialized_pod: pod.serialize()?,
        };

        self.put(id, &record).await?;
        info!(id, content_id = %pod.content_id(), "updated tension");
        Ok(pod)
    }

    /// Remove a record of either kind.
    pub async fn delete(&self, id: &str) -> Result<()> {
        if !self.store.delete(id).await? {
            return Err(RegistryError::NotFound(id.to_string()));
        }
        info!(id, "deleted record");
        Ok(())
    }

    /// All stored templates, keyed by id.
    ///
    /// Owned records are left out. Values that do not parse are logged and
    /// skipped.
    pub async fn list_templates(&self) -> Result<Vec<(String, StoredTension)>> {
        let mut templates = Vec::new();

        for (key, json) in self.store.list().await? {
            match StoredRecord::from_json(&json) {
                Ok(StoredRecord::Template(template)) => templates.push((key, template)),
                Ok(StoredRecord::Owned(_)) => {}
                Err(e) => warn!(key = %key, error = %e, "skipping unparseable record"),
            }
        }

        debug!(count = templates.len(), "listed templates");
        Ok(templates)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Claims
    // ─────────────────────────────────────────────────────────────────────────

    /// Exchange a signed claim for an owner-bound copy of a template.
    ///
    /// The claim must carry a string `templateId` and a cryptographic
    /// `pubkey`. The copy is signed without a timestamp, so the same owner
    /// claiming the same template twice produces the same content id and is
    /// refused with [`RegistryError::AlreadyMinted`].
    pub async fn claim(&self, serialized_claim: &str) -> Result<Pod> {
        let claim = Pod::deserialize(serialized_claim)?;
        claim
            .verify_signature()
            .map_err(|_| RegistryError::InvalidSignature)?;

        let template_id = claim
            .entries()
            .get(TEMPLATE_ID_ENTRY)
            .and_then(PodValue::as_str)
            .ok_or_else(|| missing_entry(TEMPLATE_ID_ENTRY, "string"))?
            .to_string();
        let owner = *claim
            .entries()
            .get(PUBKEY_ENTRY)
            .and_then(PodValue::as_cryptographic)
            .ok_or_else(|| missing_entry(PUBKEY_ENTRY, "cryptographic"))?;

        let template = match self.get(&template_id).await? {
            Some(StoredRecord::Template(template)) => template,
            Some(StoredRecord::Owned(_)) | None => {
                return Err(RegistryError::TemplateMissing(template_id))
            }
        };

        let mut entries = template.request.pod_entries;
        entries.insert(OWNER_ENTRY, PodValue::Cryptographic(owner))?;
        if let Some(tradeoff) = entries.get(TRADEOFF_ENTRY).and_then(PodValue::as_int) {
            entries.insert(TRADEOFF_ENTRY, PodValue::String(tradeoff.to_string()))?;
        }

        let pod = self.signer.sign(entries);
        let id = pod.content_id();
        let key = id.to_hex();

        if self.store.read(&key).await?.is_some() {
            return Err(RegistryError::AlreadyMinted(id));
        }

        let record = OwnedRecord {
            owner,
            serialized_pod: pod.serialize()?,
        };
        self.put(&key, &record).await?;

        info!(id = %id, template = %template_id, owner = %owner, "minted claimed record");
        Ok(pod)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Helpers
    // ─────────────────────────────────────────────────────────────────────────

    fn sign_stamped(&self, entries: &PodEntries) -> Result<Pod> {
        let mut entries = entries.clone();
        entries.insert(TIMESTAMP_ENTRY, PodValue::Int(now_millis()))?;
        Ok(self.signer.sign(entries))
    }

    async fn put<T: serde::Serialize>(&self, key: &str, record: &T) -> Result<()> {
        let json = serde_json::to_string(record).map_err(|e| {
            RegistryError::Core(tensions_core::CoreError::EncodingError(e.to_string()))
        })?;
        self.store.write(key, &json).await?;
        Ok(())
    }
}

fn parse_record(key: &str, json: &str) -> Result<StoredRecord> {
    StoredRecord::from_json(json).map_err(|e| RegistryError::CorruptRecord {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

fn missing_entry(name: &str, expected: &str) -> RegistryError {
    RegistryError::InvalidRequest(format!("claim needs a {} entry {:?}", expected, name))
}

/// Get current time in milliseconds.
fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
