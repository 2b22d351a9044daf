//! Chunking configuration.

use crate::error::{Result, StoreError};

/// Largest payload the backend accepts in a single command (~1MB).
pub const DEFAULT_MAX_COMMAND_BYTES: usize = 1_000_000;

/// Target size of each stored chunk (100KB).
pub const DEFAULT_CHUNK_SIZE_BYTES: usize = 100 * 1024;

/// Keys requested per scan page.
pub const DEFAULT_SCAN_PAGE_SIZE: usize = 10;

/// Sizing for [`ChunkedStore`](crate::ChunkedStore).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkConfig {
    max_command_bytes: usize,
    chunk_size_bytes: usize,
    scan_page_size: usize,
}

impl ChunkConfig {
    /// Build a config, checking that chunks fit in a single command.
    pub fn new(max_command_bytes: usize, chunk_size_bytes: usize) -> Result<Self> {
        if chunk_size_bytes == 0 {
            return Err(StoreError::InvalidConfig(
                "chunk size must be non-zero".into(),
            ));
        }
        if chunk_size_bytes > max_command_bytes {
            return Err(StoreError::InvalidConfig(format!(
                "chunk size {} exceeds max command size {}",
                chunk_size_bytes, max_command_bytes
            )));
        }

        Ok(Self {
            max_command_bytes,
            chunk_size_bytes,
            scan_page_size: DEFAULT_SCAN_PAGE_SIZE,
        })
    }

    /// Override the scan page size hint (minimum 1).
    pub fn with_scan_page_size(mut self, scan_page_size: usize) -> Self {
        self.scan_page_size = scan_page_size.max(1);
        self
    }

    pub fn max_command_bytes(&self) -> usize {
        self.max_command_bytes
    }

    pub fn chunk_size_bytes(&self) -> usize {
        self.chunk_size_bytes
    }

    pub fn scan_page_size(&self) -> usize {
        self.scan_page_size
    }

    /// Chunks fetched per `LRANGE` window.
    pub fn max_chunks_per_read_batch(&self) -> usize {
        self.max_command_bytes / self.chunk_size_bytes
    }
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            max_command_bytes: DEFAULT_MAX_COMMAND_BYTES,
            chunk_size_bytes: DEFAULT_CHUNK_SIZE_BYTES,
            scan_page_size: DEFAULT_SCAN_PAGE_SIZE,
        }
    }
}
