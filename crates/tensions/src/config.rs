//! Registry configuration.

use tensions_core::Keypair;
use tensions_store::ChunkConfig;

use crate::error::{RegistryError, Result};

/// Environment variable holding the hex-encoded Ed25519 signing seed.
pub const SIGNER_KEY_ENV: &str = "SIGNER_KEY";

/// Configuration for the [`Registry`](crate::Registry).
#[derive(Debug, Clone, Copy, Default)]
pub struct RegistryConfig {
    /// Chunk sizing for the underlying store.
    pub chunking: ChunkConfig,
}

impl RegistryConfig {
    pub fn with_chunking(chunking: ChunkConfig) -> Self {
        Self { chunking }
    }

    /// Load the signing keypair from `SIGNER_KEY`.
    pub fn signer_from_env() -> Result<Keypair> {
        Self::signer_from_var(SIGNER_KEY_ENV)
    }

    /// Load the signing keypair from the named environment variable.
    pub fn signer_from_var(name: &str) -> Result<Keypair> {
        let seed = std::env::var(name)
            .map_err(|e| RegistryError::Config(format!("{}: {}", name, e)))?;
        Keypair::from_hex_seed(&seed)
            .map_err(|e| RegistryError::Config(format!("{}: {}", name, e)))
    }
}
