//! # Tensions Core
//!
//! Pure primitives for Tensions: typed POD entries, canonical encoding,
//! content ids and signing.
//!
//! This crate contains no I/O, no storage, no networking.
//!
//! ## Key Types
//!
//! - [`Pod`] - A signed, content-addressed record
//! - [`PodEntries`] / [`PodValue`] - The typed entries a POD is built from
//! - [`ContentId`] - Content-addressed identifier (Blake3 hash)
//! - [`RecordSigner`] - The signing capability used by the registry
//!
//! ## Canonicalization
//!
//! Content ids are computed over deterministic CBOR. See [`canonical`] module.

pub mod canonical;
pub mod crypto;
pub mod error;
pub mod pod;
pub mod signer;
pub mod types;

pub use canonical::{canonical_entries_bytes, content_id, ID_DOMAIN};
pub use crypto::{Ed25519PublicKey, Ed25519Signature, Keypair};
pub use error::CoreError;
pub use pod::{validate_entry_name, Pod, PodEntries, PodValue};
pub use signer::RecordSigner;
pub use types::{ContentId, CryptoValue};
