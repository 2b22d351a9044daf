//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::sync::Arc;

use tensions::{Registry, RegistryConfig, TensionRequest, PUBKEY_ENTRY, TEMPLATE_ID_ENTRY};
use tensions_core::{ContentId, CryptoValue, Ed25519PublicKey, Keypair, Pod, PodEntries, PodValue};
use tensions_store::{ChunkConfig, ChunkedStore, MemoryBackend};

/// Chunk sizing small enough that ordinary test records span several chunks
/// and several read windows.
pub fn small_chunks() -> ChunkConfig {
    ChunkConfig::new(1_024, 256).expect("valid test chunk config")
}

/// A test fixture with a signing keypair and a memory backend.
pub struct TestFixture {
    pub keypair: Keypair,
    pub backend: Arc<MemoryBackend>,
}

impl TestFixture {
    /// Create a new test fixture with a random keypair.
    pub fn new() -> Self {
        Self {
            keypair: Keypair::generate(),
            backend: Arc::new(MemoryBackend::new()),
        }
    }

    /// Create with a deterministic keypair from seed.
    pub fn with_seed(seed: [u8; 32]) -> Self {
        Self {
            keypair: Keypair::from_seed(&seed),
            backend: Arc::new(MemoryBackend::new()),
        }
    }

    pub fn public_key(&self) -> Ed25519PublicKey {
        self.keypair.public_key()
    }

    /// A chunked store over the fixture's backend.
    pub fn store(&self) -> ChunkedStore<MemoryBackend> {
        ChunkedStore::new(Arc::clone(&self.backend), small_chunks())
    }

    /// A registry over the fixture's backend, signing with the fixture key.
    pub fn registry(&self) -> Registry<MemoryBackend, Keypair> {
        Registry::new(
            Arc::clone(&self.backend),
            self.keypair.clone(),
            RegistryConfig::with_chunking(small_chunks()),
        )
    }

    /// A claim for `template` signed by `wallet`.
    pub fn make_claim(&self, template: &ContentId, wallet: &Keypair) -> String {
        make_claim(template, wallet)
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// A plausible tension with an image large enough to need chunking.
pub fn sample_tension(force_a: &str, force_b: &str) -> TensionRequest {
    let mut entries = PodEntries::new();
    let fields = [
        ("forceA", force_a),
        ("forceB", force_b),
        ("zupass_title", "Tension"),
        ("zupass_display", "collectable"),
        ("zupass_image_url", "https://example.invalid/card.png"),
    ];
    for (name, value) in fields {
        entries
            .insert(name, PodValue::String(value.to_string()))
            .expect("valid entry name");
    }
    entries
        .insert("tradeoff", PodValue::Int(50))
        .expect("valid entry name");

    TensionRequest {
        force_a: force_a.to_string(),
        force_b: force_b.to_string(),
        base64_image: "iVBORw0KGgo".repeat(200),
        image_file_name: format!("{}-{}.png", force_a, force_b),
        source: None,
        author: Some("testkit".to_string()),
        tradeoff: Some(50),
        details: Some(format!("{} against {}", force_a, force_b)),
        lighthouse: None,
        idea_source: None,
        pod_folder: "tensions".to_string(),
        pod_entries: entries,
    }
}

/// Serialize a claim POD naming `template`, signed by `wallet`.
pub fn make_claim(template: &ContentId, wallet: &Keypair) -> String {
    let mut entries = PodEntries::new();
    entries
        .insert(TEMPLATE_ID_ENTRY, PodValue::String(template.to_hex()))
        .expect("valid entry name");
    entries
        .insert(
            PUBKEY_ENTRY,
            PodValue::Cryptographic(CryptoValue::from(wallet.public_key())),
        )
        .expect("valid entry name");
    Pod::sign(entries, wallet)
        .serialize()
        .expect("claim serializes")
}

/// Distinct deterministic wallets for multi-party tests.
pub fn wallets(count: usize) -> Vec<Keypair> {
    (0..count)
        .map(|i| {
            let mut seed = [0xAAu8; 32];
            seed[0] = i as u8;
            Keypair::from_seed(&seed)
        })
        .collect()
}
