//! The signing capability handed to the registry.
//!
//! The registry never touches key material directly; it only sees something
//! that can turn entries into a signed [`Pod`] and check serialized PODs.

use crate::crypto::{Ed25519PublicKey, Keypair};
use crate::pod::{Pod, PodEntries};

/// Produces and validates signed, content-addressed records.
pub trait RecordSigner: Send + Sync {
    /// The public key that signatures from this signer verify against.
    fn public_key(&self) -> Ed25519PublicKey;

    /// Sign a set of entries.
    fn sign(&self, entries: PodEntries) -> Pod;

    /// Check that a serialized POD parses and carries a valid signature.
    ///
    /// The signer of the POD does not have to be `self`.
    fn verify(&self, serialized: &str) -> bool {
        Pod::deserialize(serialized)
            .map(|pod| pod.verify_signature().is_ok())
            .unwrap_or(false)
    }
}

impl RecordSigner for Keypair {
    fn public_key(&self) -> Ed25519PublicKey {
        Keypair::public_key(self)
    }

    fn sign(&self, entries: PodEntries) -> Pod {
        Pod::sign(entries, self)
    }
}
