//! In-memory implementation of the KvBackend trait.
//!
//! This is primarily for testing. It mirrors the Redis semantics the chunked
//! store relies on, and adds a few hooks tests need: an optional per-command
//! payload limit, fault injection, foreign (hash) entries, and command
//! counters.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::error::{Result, StoreError};
use crate::traits::{Batch, Command, KeyType, KvBackend, ScanCursor};

#[derive(Debug, Clone)]
enum Entry {
    Str(String),
    List(Vec<String>),
    Hash(BTreeMap<String, String>),
}

impl Entry {
    fn key_type(&self) -> KeyType {
        match self {
            Entry::Str(_) => KeyType::String,
            Entry::List(_) => KeyType::List,
            Entry::Hash(_) => KeyType::Other("hash".to_string()),
        }
    }
}

/// Marks a resumable scan cursor, keeping it distinct from the `"0"` start.
const KEY_CURSOR_PREFIX: &str = "k:";

/// Counters of commands issued against a [`MemoryBackend`].
#[derive(Debug, Default)]
struct Counters {
    list_range_calls: AtomicUsize,
    batches: AtomicUsize,
    scans: AtomicUsize,
}

/// Snapshot of [`MemoryBackend`] command counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommandStats {
    /// `LRANGE` calls attempted, including injected failures.
    pub list_range_calls: usize,
    /// Batches successfully applied.
    pub batches: usize,
    /// `SCAN` pages served.
    pub scans: usize,
}

/// In-memory backend.
///
/// All data is lost when the backend is dropped. Thread-safe via RwLock.
pub struct MemoryBackend {
    entries: RwLock<BTreeMap<String, Entry>>,
    command_limit: Option<usize>,
    offline: AtomicBool,
    fail_list_range_after: AtomicUsize,
    counters: Counters,
}

impl MemoryBackend {
    /// Create a new empty backend with no command size limit.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            command_limit: None,
            offline: AtomicBool::new(false),
            fail_list_range_after: AtomicUsize::new(usize::MAX),
            counters: Counters::default(),
        }
    }

    /// Reject any single command whose payload exceeds `limit` bytes.
    pub fn with_command_limit(mut self, limit: usize) -> Self {
        self.command_limit = Some(limit);
        self
    }

    /// Make every command fail with `Unavailable` until switched back.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Let `n` more `LRANGE` calls succeed, then fail the rest with
    /// `Unavailable`.
    pub fn fail_list_range_after(&self, n: usize) {
        let already = self.counters.list_range_calls.load(Ordering::SeqCst);
        self.fail_list_range_after
            .store(already.saturating_add(n), Ordering::SeqCst);
    }

    /// Store a hash under `key`, the way unrelated application state would.
    pub fn hset(&self, key: &str, field: &str, value: &str) -> Result<()> {
        let mut entries = self.write()?;
        match entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::Hash(BTreeMap::new()))
        {
            Entry::Hash(map) => {
                map.insert(field.to_string(), value.to_string());
                Ok(())
            }
            _ => Err(StoreError::WrongType {
                key: key.to_string(),
                expected: "hash",
            }),
        }
    }

    pub fn stats(&self) -> CommandStats {
        CommandStats {
            list_range_calls: self.counters.list_range_calls.load(Ordering::SeqCst),
            batches: self.counters.batches.load(Ordering::SeqCst),
            scans: self.counters.scans.load(Ordering::SeqCst),
        }
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory backend is offline".into()));
        }
        Ok(())
    }

    fn check_size(&self, command: &Command) -> Result<()> {
        if let Some(limit) = self.command_limit {
            let size = command.payload_bytes();
            if size > limit {
                return Err(StoreError::CommandTooLarge { size, limit });
            }
        }
        Ok(())
    }

    /// Count one `LRANGE` and apply any injected failure.
    fn range_call(&self, key: &str) -> Result<()> {
        let call = self.counters.list_range_calls.fetch_add(1, Ordering::SeqCst);
        if call >= self.fail_list_range_after.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!(
                "injected LRANGE failure on {:?}",
                key
            )));
        }
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<String, Entry>>> {
        self.check_online()?;
        self.entries
            .read()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<String, Entry>>> {
        self.check_online()?;
        self.entries
            .write()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {}", e)))
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply one command to a map of entries.
fn apply(entries: &mut BTreeMap<String, Option<Entry>>, command: Command) -> Result<()> {
    match command {
        Command::Set { key, value } => {
            entries.insert(key, Some(Entry::Str(value)));
        }
        Command::Delete { key } => {
            entries.insert(key, None);
        }
        Command::ListAppend { key, value } => {
            let slot = entries.entry(key.clone()).or_insert(None);
            match slot {
                None => *slot = Some(Entry::List(vec![value])),
                Some(Entry::List(items)) => items.push(value),
                Some(_) => {
                    return Err(StoreError::WrongType {
                        key,
                        expected: "list",
                    })
                }
            }
        }
    }
    Ok(())
}

/// Apply commands to a staged copy of the touched keys, then commit.
///
/// Nothing is written if any command fails.
fn apply_all(entries: &mut BTreeMap<String, Entry>, commands: Vec<Command>) -> Result<()> {
    let mut staged: BTreeMap<String, Option<Entry>> = BTreeMap::new();
    for command in &commands {
        let key = command.key();
        if !staged.contains_key(key) {
            staged.insert(key.to_string(), entries.get(key).cloned());
        }
    }

    for command in commands {
        apply(&mut staged, command)?;
    }

    for (key, entry) in staged {
        match entry {
            Some(entry) => {
                entries.insert(key, entry);
            }
            None => {
                entries.remove(&key);
            }
        }
    }
    Ok(())
}

#[async_trait]
impl KvBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.read()?;
        match entries.get(key) {
            None => Ok(None),
            Some(Entry::Str(value)) => Ok(Some(value.clone())),
            Some(_) => Err(StoreError::WrongType {
                key: key.to_string(),
                expected: "string",
            }),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.exec_batch(Batch::new().set(key, value)).await
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut entries = self.write()?;
        Ok(entries.remove(key).is_some())
    }

    async fn key_type(&self, key: &str) -> Result<KeyType> {
        let entries = self.read()?;
        Ok(entries.get(key).map(Entry::key_type).unwrap_or(KeyType::None))
    }

    async fn list_range(&self, key: &str, start: usize, stop: usize) -> Result<Vec<String>> {
        self.range_call(key)?;

        let entries = self.read()?;
        match entries.get(key) {
            None => Ok(Vec::new()),
            Some(Entry::List(items)) => {
                if start >= items.len() || stop < start {
                    return Ok(Vec::new());
                }
                let end = stop.min(items.len() - 1);
                Ok(items[start..=end].to_vec())
            }
            Some(_) => Err(StoreError::WrongType {
                key: key.to_string(),
                expected: "list",
            }),
        }
    }

    async fn list_windows(&self, key: &str, window: usize) -> Result<Vec<Vec<String>>> {
        let window = window.max(1);
        let entries = self.read()?;
        let items = match entries.get(key) {
            None => return Ok(Vec::new()),
            Some(Entry::List(items)) => items,
            Some(_) => {
                return Err(StoreError::WrongType {
                    key: key.to_string(),
                    expected: "list",
                })
            }
        };

        // The read guard is held across every window.
        let mut windows = Vec::new();
        let mut start = 0;
        loop {
            if let Err(e) = self.range_call(key) {
                if start == 0 {
                    return Err(e);
                }
                return Err(StoreError::PartialRead {
                    key: key.to_string(),
                    chunks_read: start,
                    source: Box::new(e),
                });
            }

            let page: Vec<String> = items.iter().skip(start).take(window).cloned().collect();
            let fetched = page.len();
            if fetched == 0 {
                break;
            }
            windows.push(page);
            if fetched < window {
                break;
            }
            start += window;
        }

        Ok(windows)
    }

    async fn list_append(&self, key: &str, value: &str) -> Result<usize> {
        self.exec_batch(Batch::new().list_append(key, value)).await?;
        self.list_len(key).await
    }

    async fn list_len(&self, key: &str) -> Result<usize> {
        let entries = self.read()?;
        match entries.get(key) {
            None => Ok(0),
            Some(Entry::List(items)) => Ok(items.len()),
            Some(_) => Err(StoreError::WrongType {
                key: key.to_string(),
                expected: "list",
            }),
        }
    }

    async fn scan(&self, cursor: &ScanCursor, count: usize) -> Result<(ScanCursor, Vec<String>)> {
        // Cursors name the last key returned, so deleting keys mid-scan
        // never shifts unseen keys out of view.
        let lower = if cursor.is_terminal() {
            Bound::Unbounded
        } else {
            let last = cursor.as_str().strip_prefix(KEY_CURSOR_PREFIX).ok_or_else(|| {
                StoreError::InvalidData(format!("bad scan cursor {:?}", cursor.as_str()))
            })?;
            Bound::Excluded(last.to_string())
        };
        let count = count.max(1);

        let entries = self.read()?;
        self.counters.scans.fetch_add(1, Ordering::SeqCst);

        let mut range = entries.range((lower, Bound::Unbounded)).map(|(key, _)| key);
        let keys: Vec<String> = range.by_ref().take(count).cloned().collect();
        let cursor = match keys.last() {
            Some(last) if range.next().is_some() => {
                ScanCursor::new(format!("{}{}", KEY_CURSOR_PREFIX, last))
            }
            _ => ScanCursor::terminal(),
        };

        Ok((cursor, keys))
    }

    async fn exec_batch(&self, batch: Batch) -> Result<()> {
        for command in batch.commands() {
            self.check_size(command)?;
        }

        let mut entries = self.write()?;
        apply_all(&mut entries, batch.into_commands())?;
        self.counters.batches.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
