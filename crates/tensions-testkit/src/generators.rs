//! Proptest generators for property-based testing.

use proptest::prelude::*;

use tensions_core::{CryptoValue, Keypair, PodEntries, PodValue};
use tensions_store::ChunkConfig;

/// Generate a random keypair.
pub fn keypair() -> impl Strategy<Value = Keypair> {
    any::<[u8; 32]>().prop_map(|seed| Keypair::from_seed(&seed))
}

/// Generate a valid entry name.
pub fn entry_name() -> impl Strategy<Value = String> {
    "[A-Za-z_][A-Za-z0-9_]{0,15}".prop_map(String::from)
}

/// Generate an entry value of any type.
pub fn pod_value() -> impl Strategy<Value = PodValue> {
    prop_oneof![
        "\\PC{0,32}".prop_map(PodValue::String),
        any::<i64>().prop_map(PodValue::Int),
        any::<[u8; 32]>().prop_map(|b| PodValue::Cryptographic(CryptoValue::from_bytes(b))),
    ]
}

/// Generate a set of entries.
pub fn pod_entries(max_len: usize) -> impl Strategy<Value = PodEntries> {
    prop::collection::btree_map(entry_name(), pod_value(), 0..=max_len).prop_map(|map| {
        let mut entries = PodEntries::new();
        for (name, value) in map {
            // Names come from `entry_name`, so insert cannot fail.
            let _ = entries.insert(name, value);
        }
        entries
    })
}

/// Generate a non-empty record key.
pub fn record_key() -> impl Strategy<Value = String> {
    "[a-z0-9:_-]{1,24}".prop_map(String::from)
}

/// Generate a value of up to `max_chars` characters, mixing ASCII with
/// multi-byte text so chunk boundaries land inside characters.
pub fn stored_value(max_chars: usize) -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![
            4 => proptest::char::range('a', 'z'),
            1 => Just('é'),
            1 => Just('語'),
            1 => Just('🦀'),
        ],
        0..=max_chars,
    )
    .prop_map(|chars| chars.into_iter().collect())
}

/// Generate a small but valid chunk configuration.
pub fn chunk_config() -> impl Strategy<Value = ChunkConfig> {
    (1usize..=16, 1usize..=4).prop_map(|(chunk, per_window)| {
        ChunkConfig::new(chunk * per_window, chunk).unwrap_or_default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn test_content_id_deterministic(entries in pod_entries(8)) {
            prop_assert_eq!(entries.content_id(), entries.clone().content_id());
        }

        #[test]
        fn test_chunk_config_window(config in chunk_config()) {
            prop_assert!(config.max_chunks_per_read_batch() >= 1);
            prop_assert!(config.chunk_size_bytes() <= config.max_command_bytes());
        }

        #[test]
        fn test_signed_entries_verify(kp in keypair(), entries in pod_entries(6)) {
            let pod = tensions_core::Pod::sign(entries, &kp);
            prop_assert!(pod.verify_signature().is_ok());
        }
    }
}
