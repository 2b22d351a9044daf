//! # Tensions
//!
//! The record registry for Tensions: content cards ("tensions") signed as
//! content-addressed PODs, stored in chunks on a key-value backend, and
//! claimable as owner-bound copies.
//!
//! ## Overview
//!
//! - **Templates**: an admin submits a [`TensionRequest`]; the registry signs
//!   its entries and stores the record under the POD's content id
//! - **Claims**: a user submits a POD they signed naming a template and their
//!   public key; the registry mints a copy carrying an `owner` entry
//! - **Storage**: records embed base64 images, so they go through
//!   [`ChunkedStore`](store::ChunkedStore) to stay under the backend's
//!   per-command limit
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tensions::{Registry, RegistryConfig};
//! use tensions::store::SqliteBackend;
//!
//! async fn example() {
//!     let signer = RegistryConfig::signer_from_env().unwrap();
//!     let backend = Arc::new(SqliteBackend::open("tensions.db").unwrap());
//!     let registry = Registry::new(backend, signer, RegistryConfig::default());
//!
//!     for (id, template) in registry.list_templates().await.unwrap() {
//!         println!("{}: {} vs {}", id, template.request.force_a, template.request.force_b);
//!     }
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `tensions::core` - PODs, content ids, signing
//! - `tensions::store` - Backends and chunked storage

pub mod config;
pub mod error;
pub mod registry;
pub mod tension;

// Re-export component crates
pub use tensions_core as core;
pub use tensions_store as store;

pub use config::{RegistryConfig, SIGNER_KEY_ENV};
pub use error::{ErrorKind, RegistryError, Result};
pub use registry::{Registry, PUBKEY_ENTRY, TEMPLATE_ID_ENTRY, TRADEOFF_ENTRY};
pub use tension::{
    OwnedRecord, StoredRecord, StoredTension, TensionRequest, OWNER_ENTRY, TIMESTAMP_ENTRY,
};

// Re-export commonly used core types
pub use tensions_core::{ContentId, CryptoValue, Keypair, Pod, PodEntries, PodValue, RecordSigner};
