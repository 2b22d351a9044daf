//! SQLite implementation of the KvBackend trait.
//!
//! This is the persistent backend. It uses rusqlite with bundled SQLite,
//! wrapped in async via tokio::spawn_blocking. Batches run inside a single
//! SQLite transaction, so they commit or roll back as a whole.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{Batch, Command, KeyType, KvBackend, ScanCursor};

/// SQLite-based backend.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteBackend {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteBackend {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a blocking operation on the connection off the async runtime.
    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::Unavailable(format!("mutex poisoned: {}", e)))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("spawn_blocking failed: {}", e)))?
    }
}

fn kind_of(conn: &Connection, key: &str) -> Result<Option<String>> {
    Ok(conn
        .query_row(
            "SELECT kind FROM kv_keys WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()?)
}

fn require_list(conn: &Connection, key: &str) -> Result<bool> {
    match kind_of(conn, key)?.as_deref() {
        None => Ok(false),
        Some("list") => Ok(true),
        Some(_) => Err(StoreError::WrongType {
            key: key.to_string(),
            expected: "list",
        }),
    }
}

fn delete_key(conn: &Connection, key: &str) -> Result<bool> {
    conn.execute("DELETE FROM kv_list_items WHERE key = ?1", params![key])?;
    let removed = conn.execute("DELETE FROM kv_keys WHERE key = ?1", params![key])?;
    Ok(removed > 0)
}

/// Apply a single write command. Callers wrap this in a transaction.
fn apply_command(conn: &Connection, command: &Command) -> Result<()> {
    match command {
        Command::Set { key, value } => {
            conn.execute("DELETE FROM kv_list_items WHERE key = ?1", params![key])?;
            conn.execute(
                "INSERT INTO kv_keys (key, kind, value) VALUES (?1, 'string', ?2)
                 ON CONFLICT(key) DO UPDATE SET kind = 'string', value = excluded.value",
                params![key, value],
            )?;
        }
        Command::Delete { key } => {
            delete_key(conn, key)?;
        }
        Command::ListAppend { key, value } => {
            if !require_list(conn, key)? {
                conn.execute(
                    "INSERT INTO kv_keys (key, kind, value) VALUES (?1, 'list', NULL)",
                    params![key],
                )?;
            }
            conn.execute(
                "INSERT INTO kv_list_items (key, idx, value)
                 SELECT ?1, COALESCE(MAX(idx) + 1, 0), ?2 FROM kv_list_items WHERE key = ?1",
                params![key, value],
            )?;
        }
    }
    Ok(())
}

fn list_len(conn: &Connection, key: &str) -> Result<usize> {
    let len: i64 = conn.query_row(
        "SELECT COUNT(*) FROM kv_list_items WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )?;
    Ok(len as usize)
}

fn to_sql_int(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

#[async_trait]
impl KvBackend for SqliteBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_string();

        self.run(move |conn| {
            let row: Option<(String, Option<String>)> = conn
                .query_row(
                    "SELECT kind, value FROM kv_keys WHERE key = ?1",
                    params![key],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            match row {
                None => Ok(None),
                Some((kind, value)) if kind == "string" => Ok(Some(value.unwrap_or_default())),
                Some(_) => Err(StoreError::WrongType {
                    key,
                    expected: "string",
                }),
            }
        })
        .await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.exec_batch(Batch::new().set(key, value)).await
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let key = key.to_string();

        self.run(move |conn| {
            let tx = conn.transaction()?;
            let existed = delete_key(&tx, &key)?;
            tx.commit()?;
            Ok(existed)
        })
        .await
    }

    async fn key_type(&self, key: &str) -> Result<KeyType> {
        let key = key.to_string();

        self.run(move |conn| {
            Ok(match kind_of(conn, &key)? {
                None => KeyType::None,
                Some(kind) => KeyType::from_reply(&kind),
            })
        })
        .await
    }

    async fn list_range(&self, key: &str, start: usize, stop: usize) -> Result<Vec<String>> {
        if stop < start {
            return Ok(Vec::new());
        }
        let key = key.to_string();
        let limit = to_sql_int((stop - start).saturating_add(1));
        let offset = to_sql_int(start);

        self.run(move |conn| {
            if !require_list(conn, &key)? {
                return Ok(Vec::new());
            }

            let mut stmt = conn.prepare(
                "SELECT value FROM kv_list_items WHERE key = ?1
                 ORDER BY idx LIMIT ?2 OFFSET ?3",
            )?;
            let items = stmt
                .query_map(params![key, limit, offset], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<String>>>()?;
            Ok(items)
        })
        .await
    }

    async fn list_windows(&self, key: &str, window: usize) -> Result<Vec<Vec<String>>> {
        let key = key.to_string();
        let window = window.max(1);

        self.run(move |conn| {
            let tx = conn.transaction()?;
            if !require_list(&tx, &key)? {
                return Ok(Vec::new());
            }

            let mut windows = Vec::new();
            {
                let mut stmt = tx.prepare(
                    "SELECT value FROM kv_list_items WHERE key = ?1
                     ORDER BY idx LIMIT ?2 OFFSET ?3",
                )?;
                let mut start = 0;
                loop {
                    let page = stmt
                        .query_map(params![key, to_sql_int(window), to_sql_int(start)], |row| {
                            row.get(0)
                        })
                        .and_then(|rows| rows.collect::<rusqlite::Result<Vec<String>>>());
                    let page = match page {
                        Ok(page) => page,
                        Err(e) if start == 0 => return Err(e.into()),
                        Err(e) => {
                            return Err(StoreError::PartialRead {
                                key: key.clone(),
                                chunks_read: start,
                                source: Box::new(e.into()),
                            })
                        }
                    };

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
            }

            tx.commit()?;
            Ok(windows)
        })
        .await
    }

    async fn list_append(&self, key: &str, value: &str) -> Result<usize> {
        let command = Command::ListAppend {
            key: key.to_string(),
            value: value.to_string(),
        };

        self.run(move |conn| {
            let tx = conn.transaction()?;
            apply_command(&tx, &command)?;
            let len = list_len(&tx, command.key())?;
            tx.commit()?;
            Ok(len)
        })
        .await
    }

    async fn list_len(&self, key: &str) -> Result<usize> {
        let key = key.to_string();

        self.run(move |conn| {
            require_list(conn, &key)?;
            list_len(conn, &key)
        })
        .await
    }

    async fn scan(&self, cursor: &ScanCursor, count: usize) -> Result<(ScanCursor, Vec<String>)> {
        let after: i64 = cursor
            .as_str()
            .parse()
            .map_err(|_| StoreError::InvalidData(format!("bad scan cursor {:?}", cursor.as_str())))?;
        let count = count.max(1);

        self.run(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT rowid, key FROM kv_keys WHERE rowid > ?1 ORDER BY rowid LIMIT ?2",
            )?;
            let rows = stmt
                .query_map(params![after, to_sql_int(count)], |row| {
                    Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            let next = match rows.last() {
                Some((rowid, _)) if rows.len() == count => ScanCursor::new(rowid.to_string()),
                _ => ScanCursor::terminal(),
            };
            let keys = rows.into_iter().map(|(_, key)| key).collect();
            Ok((next, keys))
        })
        .await
    }

    async fn exec_batch(&self, batch: Batch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        self.run(move |conn| {
            let tx = conn.transaction()?;
            for command in batch.commands() {
                apply_command(&tx, command)?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }
}
