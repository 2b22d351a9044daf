//! # Tensions Store
//!
//! Key-value storage for Tensions records. Provides a trait-based interface
//! over a Redis-style backend, plus a chunking layer that stores values
//! larger than the backend's per-command limit.
//!
//! ## Overview
//!
//! Backends implement [`KvBackend`]: scalar get/set, typed lists, cursor
//! scans and atomic batches. [`ChunkedStore`] sits on top and splits each
//! value into an ordered list of chunks, replacing it atomically on write and
//! reassembling it window by window on read.
//!
//! ## Key Types
//!
//! - [`KvBackend`] - The async trait every backend implements
//! - [`ChunkedStore`] - Large-value storage over any backend
//! - [`ChunkConfig`] - Command limit, chunk size and scan page size
//! - [`SqliteBackend`] - SQLite-based persistent backend
//! - [`MemoryBackend`] - In-memory backend with fault injection for tests
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tensions_store::{ChunkConfig, ChunkedStore, SqliteBackend};
//!
//! async fn example() {
//!     let backend = Arc::new(SqliteBackend::open("tensions.db").unwrap());
//!     let store = ChunkedStore::new(backend, ChunkConfig::default());
//!
//!     store.write("abc", "hello-world").await.unwrap();
//!     assert_eq!(store.read("abc").await.unwrap().as_deref(), Some("hello-world"));
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Atomic replace**: a write is one batch (`DEL` + `RPUSH` per chunk)
//! - **Empty values**: stored as a single empty chunk, never as a missing key
//! - **Partial reads**: a failure after the first read window is an error,
//!   never a truncated value
//! - **Corrupt entries**: keys of an unexpected type read as not found

pub mod chunked;
pub mod config;
pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use chunked::{split_chunks, ChunkedStore, Lookup};
pub use config::{
    ChunkConfig, DEFAULT_CHUNK_SIZE_BYTES, DEFAULT_MAX_COMMAND_BYTES, DEFAULT_SCAN_PAGE_SIZE,
};
pub use error::{Result, StoreError};
pub use memory::{CommandStats, MemoryBackend};
pub use sqlite::SqliteBackend;
pub use traits::{Batch, Command, KeyType, KvBackend, ScanCursor};
