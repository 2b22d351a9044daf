//! KvBackend trait: the abstract interface to a Redis-like key-value store.
//!
//! The chunked store only needs a small command surface: scalar get/set,
//! delete, type checks, list append/range/length, cursor scans and atomic
//! batches. Implementations include SQLite and in-memory (for tests).

use std::fmt;

use async_trait::async_trait;

use crate::error::Result;

/// What a key currently holds, as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyType {
    /// Key is absent.
    None,
    /// A single scalar string.
    String,
    /// An ordered list of strings.
    List,
    /// Any other backend type (hash, set, ...), by the backend's name for it.
    Other(String),
}

impl KeyType {
    /// Parse a Redis-style `TYPE` reply.
    pub fn from_reply(reply: &str) -> Self {
        match reply {
            "none" => KeyType::None,
            "string" => KeyType::String,
            "list" => KeyType::List,
            other => KeyType::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            KeyType::None => "none",
            KeyType::String => "string",
            KeyType::List => "list",
            KeyType::Other(name) => name,
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A write command that can be part of an atomic [`Batch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `SET key value`
    Set { key: String, value: String },
    /// `DEL key`
    Delete { key: String },
    /// `RPUSH key value`
    ListAppend { key: String, value: String },
}

impl Command {
    pub fn key(&self) -> &str {
        match self {
            Command::Set { key, .. } | Command::Delete { key } | Command::ListAppend { key, .. } => {
                key
            }
        }
    }

    /// Bytes this command puts on the wire, used against per-command limits.
    pub fn payload_bytes(&self) -> usize {
        match self {
            Command::Set { key, value } | Command::ListAppend { key, value } => {
                key.len() + value.len()
            }
            Command::Delete { key } => key.len(),
        }
    }
}

/// An ordered sequence of commands applied as one indivisible unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    commands: Vec<Command>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.commands.push(Command::Set {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    pub fn delete(mut self, key: impl Into<String>) -> Self {
        self.commands.push(Command::Delete { key: key.into() });
        self
    }

    pub fn list_append(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.commands.push(Command::ListAppend {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn into_commands(self) -> Vec<Command> {
        self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Opaque scan position. `"0"` both starts a scan and marks it complete.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScanCursor(String);

impl ScanCursor {
    const SENTINEL: &'static str = "0";

    /// The cursor that begins a scan.
    pub fn start() -> Self {
        Self(Self::SENTINEL.to_string())
    }

    /// The cursor a backend returns once the scan is complete.
    pub fn terminal() -> Self {
        Self::start()
    }

    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn is_terminal(&self) -> bool {
        self.0 == Self::SENTINEL
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScanCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Async interface to a key-value backend.
///
/// Transport failures are reported as [`StoreError::Unavailable`] (or
/// [`StoreError::Database`] for SQLite). Implementations never retry.
///
/// [`StoreError::Unavailable`]: crate::StoreError::Unavailable
/// [`StoreError::Database`]: crate::StoreError::Database
#[async_trait]
pub trait KvBackend: Send + Sync {
    /// `GET`: the scalar value at `key`, or `None` if absent.
    ///
    /// Fails with `WrongType` if the key holds a list.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// `SET`: replace whatever `key` holds with a scalar.
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// `DEL`: remove `key`. Returns whether it existed.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// `TYPE`: what `key` currently holds.
    async fn key_type(&self, key: &str) -> Result<KeyType>;

    /// `LRANGE`: list elements with `start <= index <= stop`, in order.
    ///
    /// Returns an empty vec for an absent key or a range past the end.
    async fn list_range(&self, key: &str, start: usize, stop: usize) -> Result<Vec<String>>;

    /// Read a whole list as consecutive `LRANGE` windows of `window`
    /// elements, all evaluated against one snapshot of the key (a server-side
    /// script on Redis, one transaction on SQLite).
    ///
    /// Windows are issued until one comes back short or empty; every
    /// non-empty window is returned in order. An absent key yields no
    /// windows. A failure after the first window is reported as
    /// [`StoreError::PartialRead`](crate::StoreError::PartialRead).
    async fn list_windows(&self, key: &str, window: usize) -> Result<Vec<Vec<String>>>;

    /// `RPUSH`: append one element, returning the new list length.
    async fn list_append(&self, key: &str, value: &str) -> Result<usize>;

    /// `LLEN`: list length, 0 for an absent key.
    async fn list_len(&self, key: &str) -> Result<usize>;

    /// `SCAN`: one page of keys starting at `cursor`.
    ///
    /// `count` is a hint. The returned cursor is terminal once every key
    /// present for the whole scan has been returned at least once.
    async fn scan(&self, cursor: &ScanCursor, count: usize) -> Result<(ScanCursor, Vec<String>)>;

    /// Apply every command in order as one atomic unit.
    ///
    /// Readers observe either none or all of the batch.
    async fn exec_batch(&self, batch: Batch) -> Result<()>;
}
