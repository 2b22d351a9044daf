//! Chunked storage of large values.
//!
//! The backend rejects single commands above `max_command_bytes`, so values
//! are stored as an ordered list of chunks under their key and reassembled
//! on read. Writes replace the whole list in one atomic batch; reads fetch
//! the list in windows of `max_chunks_per_read_batch` chunks, all from one
//! snapshot, so a concurrent rewrite is seen either entirely or not at all.
//!
//! Keys that hold a plain scalar (written by some other path) are read back
//! as-is. Keys that hold any other backend type are reported as missing by
//! [`ChunkedStore::read`]; [`ChunkedStore::inspect`] keeps them apart.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::ChunkConfig;
use crate::error::{Result, StoreError};
use crate::traits::{Batch, KeyType, KvBackend, ScanCursor};

/// Outcome of looking a key up, before corrupt entries are folded into
/// "not found".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// The fully reassembled value.
    Found(String),
    /// Nothing stored under the key.
    Missing,
    /// The key holds a backend type that is neither a scalar nor a list.
    Corrupt(KeyType),
}

impl Lookup {
    /// Fold into the public read contract: corrupt entries read as missing.
    pub fn into_value(self) -> Option<String> {
        match self {
            Lookup::Found(value) => Some(value),
            Lookup::Missing | Lookup::Corrupt(_) => None,
        }
    }
}

/// Split `value` into segments of at most `chunk_size` bytes.
///
/// Segments never split a UTF-8 character, so a segment may come up short of
/// `chunk_size` when a multi-byte character straddles the boundary. If
/// `chunk_size` is smaller than a single character, that character gets a
/// segment of its own. An empty value yields one empty segment so it stays
/// distinguishable from an absent key.
pub fn split_chunks(value: &str, chunk_size: usize) -> Vec<&str> {
    if value.is_empty() {
        return vec![""];
    }

    let chunk_size = chunk_size.max(1);
    let mut chunks = Vec::with_capacity(value.len() / chunk_size + 1);
    let mut start = 0;

    while start < value.len() {
        let mut end = (start + chunk_size).min(value.len());
        while !value.is_char_boundary(end) {
            end -= 1;
        }
        if end == start {
            end = start + 1;
            while !value.is_char_boundary(end) {
                end += 1;
            }
        }
        chunks.push(&value[start..end]);
        start = end;
    }

    chunks
}

/// Stores values of any size on a [`KvBackend`] with a per-command limit.
///
/// The backend handle is shared; construct it once and pass it in.
pub struct ChunkedStore<B: KvBackend> {
    backend: Arc<B>,
    config: ChunkConfig,
}

impl<B: KvBackend> Clone for ChunkedStore<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            config: self.config,
        }
    }
}

impl<B: KvBackend> ChunkedStore<B> {
    pub fn new(backend: Arc<B>, config: ChunkConfig) -> Self {
        Self { backend, config }
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn config(&self) -> &ChunkConfig {
        &self.config
    }

    /// Replace whatever `key` holds with `value`.
    ///
    /// Submitted as one batch: `DEL key` then one `RPUSH` per chunk. Readers
    /// see either the previous value or the new one in full.
    pub async fn write(&self, key: &str, value: &str) -> Result<()> {
        if key.is_empty() {
            return Err(StoreError::InvalidKey("key must be non-empty".into()));
        }

        let chunks = split_chunks(value, self.config.chunk_size_bytes());
        debug!(
            key,
            bytes = value.len(),
            chunks = chunks.len(),
            "writing chunked value"
        );

        let batch = chunks
            .into_iter()
            .fold(Batch::new().delete(key), |batch, chunk| {
                batch.list_append(key, chunk)
            });

        self.backend.exec_batch(batch).await
    }

    /// Read the value at `key`, or `None` if there is none.
    ///
    /// Keys holding an unexpected backend type are logged and reported as
    /// `None`.
    pub async fn read(&self, key: &str) -> Result<Option<String>> {
        let lookup = self.inspect(key).await?;
        if let Lookup::Corrupt(kind) = &lookup {
            warn!(key, kind = %kind, "unexpected backend type, treating as not found");
        }
        Ok(lookup.into_value())
    }

    /// Like [`read`](Self::read), but keeps corrupt entries distinct.
    pub async fn inspect(&self, key: &str) -> Result<Lookup> {
        let kind = self.backend.key_type(key).await?;
        debug!(key, kind = %kind, "checked backend type");

        match kind {
            KeyType::None => Ok(Lookup::Missing),
            KeyType::String => Ok(match self.backend.get(key).await? {
                Some(value) => Lookup::Found(value),
                None => Lookup::Missing,
            }),
            KeyType::List => Ok(match self.read_chunks(key).await? {
                Some(value) => Lookup::Found(value),
                None => Lookup::Missing,
            }),
            other => Ok(Lookup::Corrupt(other)),
        }
    }

    /// Remove `key`. Returns whether anything was stored there.
    pub async fn delete(&self, key: &str) -> Result<bool> {
        self.backend.delete(key).await
    }

    /// Number of chunks stored under `key` (0 if absent).
    pub async fn chunk_count(&self, key: &str) -> Result<usize> {
        self.backend.list_len(key).await
    }

    /// Enumerate every stored value by scanning the keyspace page by page.
    ///
    /// Not a snapshot: keys written or deleted during the scan may or may
    /// not appear. Keys that vanish between the scan and the read, or that
    /// hold corrupt entries, are skipped.
    pub async fn list(&self) -> Result<Vec<(String, String)>> {
        let page_size = self.config.scan_page_size();
        let mut cursor = ScanCursor::start();
        let mut seen = HashSet::new();
        let mut records = Vec::new();

        loop {
            let (next, keys) = self.backend.scan(&cursor, page_size).await?;

            for key in keys {
                if !seen.insert(key.clone()) {
                    continue;
                }
                if let Some(value) = self.read(&key).await? {
                    records.push((key, value));
                }
            }

            if next.is_terminal() {
                break;
            }
            cursor = next;
        }

        debug!(count = records.len(), "listed stored values");
        Ok(records)
    }

    /// Fetch list chunks window by window from one snapshot and join them.
    ///
    /// `None` if the list vanished after the type check. Every write stores
    /// at least one chunk, so an empty list is never a stored value.
    async fn read_chunks(&self, key: &str) -> Result<Option<String>> {
        let window = self.config.max_chunks_per_read_batch();
        let windows = self.backend.list_windows(key, window).await?;

        if windows.is_empty() {
            debug!(key, "list vanished before read");
            return Ok(None);
        }

        debug!(key, windows = windows.len(), "read chunked value");
        Ok(Some(windows.into_iter().flatten().collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBackend;
    use proptest::prelude::*;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    }

    fn store_with(config: ChunkConfig) -> ChunkedStore<MemoryBackend> {
        ChunkedStore::new(Arc::new(MemoryBackend::new()), config)
    }

    fn small_config() -> ChunkConfig {
        // 2 chunks of 5 bytes per read window.
        ChunkConfig::new(10, 5).unwrap()
    }

    #[test]
    fn test_split_exact_chunk() {
        let value = "a".repeat(5);
        assert_eq!(split_chunks(&value, 5), vec!["aaaaa"]);
    }

    #[test]
    fn test_split_one_over() {
        let value = "a".repeat(6);
        let chunks = split_chunks(&value, 5);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].len(), 1);
    }

    #[test]
    fn test_split_empty_is_one_empty_chunk() {
        assert_eq!(split_chunks("", 5), vec![""]);
    }

    #[test]
    fn test_split_respects_char_boundaries() {
        // 'é' is 2 bytes; a 3-byte chunk must not cut the second one.
        let chunks = split_chunks("éé", 3);
        assert_eq!(chunks, vec!["é", "é"]);

        // A chunk smaller than the character still makes progress.
        let chunks = split_chunks("🦀a", 2);
        assert_eq!(chunks, vec!["🦀", "a"]);
    }

    #[tokio::test]
    async fn test_end_to_end_write_read_delete() {
        init_tracing();
        let store = store_with(ChunkConfig::default());

        store.write("abc", "hello-world").await.unwrap();
        assert_eq!(store.read("abc").await.unwrap().as_deref(), Some("hello-world"));

        assert!(store.delete("abc").await.unwrap());
        assert_eq!(store.read("abc").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_empty_value_is_not_missing() {
        let store = store_with(small_config());

        store.write("empty", "").await.unwrap();
        assert_eq!(store.read("empty").await.unwrap().as_deref(), Some(""));
        assert_eq!(store.read("never-written").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_rejects_empty_key() {
        let store = store_with(small_config());
        assert!(matches!(
            store.write("", "v").await,
            Err(StoreError::InvalidKey(_))
        ));
    }

    #[tokio::test]
    async fn test_chunk_boundary_counts() {
        let store = store_with(small_config());

        store.write("k", "abcde").await.unwrap();
        assert_eq!(store.chunk_count("k").await.unwrap(), 1);

        store.write("k", "abcdef").await.unwrap();
        assert_eq!(store.chunk_count("k").await.unwrap(), 2);
        let tail = store.backend().list_range("k", 1, 1).await.unwrap();
        assert_eq!(tail, vec!["f"]);
    }

    #[tokio::test]
    async fn test_overwrite_leaves_no_orphans() {
        let store = store_with(small_config());

        store.write("k", &"x".repeat(23)).await.unwrap();
        assert_eq!(store.chunk_count("k").await.unwrap(), 5);

        store.write("k", "short").await.unwrap();
        assert_eq!(store.chunk_count("k").await.unwrap(), 1);
        assert_eq!(store.read("k").await.unwrap().as_deref(), Some("short"));
    }

    #[tokio::test]
    async fn test_multi_window_read() {
        let store = store_with(small_config());
        let value = "0123456789abcdefghijXYZ";

        store.write("k", value).await.unwrap();
        assert_eq!(store.chunk_count("k").await.unwrap(), 5);

        let before = store.backend().stats().list_range_calls;
        assert_eq!(store.read("k").await.unwrap().as_deref(), Some(value));
        assert_eq!(store.backend().stats().list_range_calls - before, 3);
    }

    #[tokio::test]
    async fn test_write_is_one_batch() {
        let store = store_with(small_config());
        store.write("k", &"y".repeat(50)).await.unwrap();
        assert_eq!(store.backend().stats().batches, 1);
    }

    #[tokio::test]
    async fn test_scalar_values_read_directly() {
        let store = store_with(small_config());
        store.backend().set("plain", "stored elsewhere").await.unwrap();

        assert_eq!(
            store.read("plain").await.unwrap().as_deref(),
            Some("stored elsewhere")
        );
    }

    #[tokio::test]
    async fn test_corrupt_entry_reads_as_missing() {
        init_tracing();
        let store = store_with(small_config());
        store.backend().hset("h", "field", "value").unwrap();

        assert_eq!(store.read("h").await.unwrap(), None);
        assert_eq!(
            store.inspect("h").await.unwrap(),
            Lookup::Corrupt(KeyType::Other("hash".into()))
        );
    }

    #[tokio::test]
    async fn test_partial_read_is_an_error() {
        let store = store_with(small_config());
        store.write("k", &"z".repeat(25)).await.unwrap();

        store.backend().fail_list_range_after(1);
        let err = store.read("k").await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::PartialRead { chunks_read: 2, .. }
        ));
    }

    #[tokio::test]
    async fn test_unavailable_propagates() {
        let store = store_with(small_config());
        store.write("k", "v").await.unwrap();

        store.backend().set_offline(true);
        assert!(matches!(
            store.read("k").await,
            Err(StoreError::Unavailable(_))
        ));
        assert!(matches!(
            store.write("k", "w").await,
            Err(StoreError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_chunks_fit_under_command_limit() {
        let backend = Arc::new(MemoryBackend::new().with_command_limit(1_000));
        let store = ChunkedStore::new(backend.clone(), ChunkConfig::new(1_000, 100).unwrap());
        let big = "q".repeat(5_000);

        assert!(matches!(
            backend.set("raw", &big).await,
            Err(StoreError::CommandTooLarge { .. })
        ));

        store.write("big", &big).await.unwrap();
        assert_eq!(store.read("big").await.unwrap(), Some(big));
    }

    #[tokio::test]
    async fn test_list_returns_every_value() {
        let store = store_with(small_config().with_scan_page_size(3));
        for i in 0..8 {
            store
                .write(&format!("key-{}", i), &format!("value-{}-{}", i, "v".repeat(i * 4)))
                .await
                .unwrap();
        }
        store.backend().hset("foreign", "f", "v").unwrap();

        let mut listed = store.list().await.unwrap();
        listed.sort();

        assert_eq!(listed.len(), 8);
        for (i, (key, value)) in listed.iter().enumerate() {
            assert_eq!(key, &format!("key-{}", i));
            assert_eq!(value, &format!("value-{}-{}", i, "v".repeat(i * 4)));
        }
    }

    /// Delegates to a memory backend, acting on one key right before each
    /// list read so the action lands between the type check and the chunks.
    struct Interfering {
        inner: MemoryBackend,
        key: String,
        action: Interference,
    }

    enum Interference {
        Delete,
        Rewrite(String),
    }

    impl Interfering {
        fn new(key: &str, action: Interference) -> Self {
            Self {
                inner: MemoryBackend::new(),
                key: key.to_string(),
                action,
            }
        }

        async fn interfere(&self) -> Result<()> {
            match &self.action {
                Interference::Delete => self.inner.delete(&self.key).await.map(|_| ()),
                Interference::Rewrite(value) => {
                    let key = self.key.as_str();
                    let batch = split_chunks(value, 5)
                        .into_iter()
                        .fold(Batch::new().delete(key), |b, chunk| b.list_append(key, chunk));
                    self.inner.exec_batch(batch).await
                }
            }
        }
    }

    #[async_trait::async_trait]
    impl KvBackend for Interfering {
        async fn get(&self, key: &str) -> Result<Option<String>> {
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &str) -> Result<()> {
            self.inner.set(key, value).await
        }

        async fn delete(&self, key: &str) -> Result<bool> {
            self.inner.delete(key).await
        }

        async fn key_type(&self, key: &str) -> Result<KeyType> {
            self.inner.key_type(key).await
        }

        async fn list_range(&self, key: &str, start: usize, stop: usize) -> Result<Vec<String>> {
            self.interfere().await?;
            self.inner.list_range(key, start, stop).await
        }

        async fn list_windows(&self, key: &str, window: usize) -> Result<Vec<Vec<String>>> {
            self.interfere().await?;
            self.inner.list_windows(key, window).await
        }

        async fn list_append(&self, key: &str, value: &str) -> Result<usize> {
            self.inner.list_append(key, value).await
        }

        async fn list_len(&self, key: &str) -> Result<usize> {
            self.inner.list_len(key).await
        }

        async fn scan(&self, cursor: &ScanCursor, count: usize) -> Result<(ScanCursor, Vec<String>)> {
            self.inner.scan(cursor, count).await
        }

        async fn exec_batch(&self, batch: Batch) -> Result<()> {
            self.inner.exec_batch(batch).await
        }
    }

    #[tokio::test]
    async fn test_deleted_after_type_check_reads_missing() {
        let store = ChunkedStore::new(
            Arc::new(Interfering::new("k", Interference::Delete)),
            small_config(),
        );
        store.write("k", "hello").await.unwrap();

        assert_eq!(store.read("k").await.unwrap(), None);
        assert_eq!(store.inspect("k").await.unwrap(), Lookup::Missing);
    }

    #[tokio::test]
    async fn test_rewrite_during_read_is_never_spliced() {
        let old = "AAAAABBBBBCCCCCDDDDDEEEEE";
        let new = "vwxyzvwxyzvwxyzvwxyzvwxyz";
        let store = ChunkedStore::new(
            Arc::new(Interfering::new("k", Interference::Rewrite(new.to_string()))),
            small_config(),
        );
        store.write("k", old).await.unwrap();

        let read = store.read("k").await.unwrap().unwrap();
        assert!(read == old || read == new, "spliced read {:?}", read);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_rewrites_read_whole_values() {
        let store = store_with(small_config());
        let a = "a".repeat(47);
        let b = "b".repeat(23);
        store.write("k", &a).await.unwrap();

        let writer = {
            let store = store.clone();
            let (a, b) = (a.clone(), b.clone());
            tokio::spawn(async move {
                for i in 0..500 {
                    let value = if i % 2 == 0 { &b } else { &a };
                    store.write("k", value).await.unwrap();
                    tokio::task::yield_now().await;
                }
            })
        };

        for _ in 0..500 {
            let read = store.read("k").await.unwrap().unwrap();
            assert!(read == a || read == b, "spliced read {:?}", read);
            tokio::task::yield_now().await;
        }
        writer.await.unwrap();
    }

    proptest! {
        #[test]
        fn prop_roundtrip(value in "\\PC{0,64}", chunk in 1usize..8) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let store = store_with(ChunkConfig::new(16, chunk).unwrap());

            let read = rt.block_on(async {
                store.write("k", &value).await.unwrap();
                store.read("k").await.unwrap()
            });
            prop_assert_eq!(read, Some(value));
        }

        #[test]
        fn prop_chunks_concatenate_and_fit(value in "\\PC{0,64}", chunk in 4usize..16) {
            let chunks = split_chunks(&value, chunk);
            prop_assert_eq!(chunks.concat(), value.clone());
            for c in &chunks {
                prop_assert!(c.len() <= chunk);
            }
        }
    }
}
