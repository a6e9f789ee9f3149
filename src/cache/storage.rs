//! Cache storage trait and its backends.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use crate::config::{CacheBackend, CacheConfig, Config};

use super::traits::Cacheable;

/// A single cached value.
#[derive(Debug, Clone)]
pub struct CachedEntry<T> {
  /// The cached value
  pub value: T,
  /// When the value was cached
  pub cached_at: DateTime<Utc>,
}

/// Trait for cache storage backends.
pub trait CacheStorage: Send + Sync {
  /// Get a cached value by key.
  fn get_entry<T: Cacheable>(&self, key: &str) -> Result<Option<CachedEntry<T>>>;

  /// Store a value, replacing any previous value and tags for the key.
  fn store_entry<T: Cacheable>(&self, key: &str, value: &T, tags: &[String]) -> Result<()>;

  /// Remove every value stored with `tag`. Returns the number removed.
  fn invalidate_tag(&self, tag: &str) -> Result<usize>;

  /// Remove everything.
  fn clear(&self) -> Result<()>;
}

/// Storage implementation that doesn't cache anything.
/// Used when caching is disabled - all operations are no-ops.
pub struct NoopStorage;

impl CacheStorage for NoopStorage {
  fn get_entry<T: Cacheable>(&self, _key: &str) -> Result<Option<CachedEntry<T>>> {
    Ok(None) // Always miss
  }

  fn store_entry<T: Cacheable>(&self, _key: &str, _value: &T, _tags: &[String]) -> Result<()> {
    Ok(()) // Discard
  }

  fn invalidate_tag(&self, _tag: &str) -> Result<usize> {
    Ok(0)
  }

  fn clear(&self) -> Result<()> {
    Ok(())
  }
}

struct MemoryEntry {
  data: Vec<u8>,
  cached_at: DateTime<Utc>,
  tags: Vec<String>,
}

/// In-process storage. Values are kept serialized so every backend
/// hands out independent copies.
#[derive(Default)]
pub struct MemoryStorage {
  entries: Mutex<HashMap<(&'static str, String), MemoryEntry>>,
}

impl MemoryStorage {
  pub fn new() -> Self {
    Self::default()
  }
}

impl CacheStorage for MemoryStorage {
  fn get_entry<T: Cacheable>(&self, key: &str) -> Result<Option<CachedEntry<T>>> {
    let entries = self
      .entries
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    match entries.get(&(T::entity_type(), key.to_string())) {
      Some(entry) => {
        let value: T = serde_json::from_slice(&entry.data)
          .map_err(|e| eyre!("Failed to deserialize cached {}: {}", T::entity_type(), e))?;
        Ok(Some(CachedEntry {
          value,
          cached_at: entry.cached_at,
        }))
      }
      None => Ok(None),
    }
  }

  fn store_entry<T: Cacheable>(&self, key: &str, value: &T, tags: &[String]) -> Result<()> {
    let data = serde_json::to_vec(value).map_err(|e| eyre!("Failed to serialize entity: {}", e))?;
    let mut entries = self
      .entries
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    entries.insert(
      (T::entity_type(), key.to_string()),
      MemoryEntry {
        data,
        cached_at: Utc::now(),
        tags: tags.to_vec(),
      },
    );

    Ok(())
  }

  fn invalidate_tag(&self, tag: &str) -> Result<usize> {
    let mut entries = self
      .entries
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let before = entries.len();
    entries.retain(|_, entry| !entry.tags.iter().any(|t| t == tag));
    Ok(before - entries.len())
  }

  fn clear(&self) -> Result<()> {
    self
      .entries
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?
      .clear();
    Ok(())
  }
}

/// SQLite-based cache storage implementation.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open (or create) the cache database at `path`.
  pub fn open(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::with_connection(conn)
  }

  /// Open a private in-memory database.
  #[cfg(test)]
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory cache database: {}", e))?;

    Self::with_connection(conn)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;

    Ok(storage)
  }

  /// Run database migrations for cache tables.
  fn run_migrations(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(())
  }
}

/// Schema for cache tables.
const CACHE_SCHEMA: &str = r#"
-- Cached values (serialized JSON)
CREATE TABLE IF NOT EXISTS cache_entries (
    entity_type TEXT NOT NULL,
    cache_key TEXT NOT NULL,
    data BLOB NOT NULL,
    cached_at TEXT NOT NULL,
    PRIMARY KEY (entity_type, cache_key)
);

-- Tag index for invalidation
CREATE TABLE IF NOT EXISTS cache_tags (
    tag TEXT NOT NULL,
    entity_type TEXT NOT NULL,
    cache_key TEXT NOT NULL,
    PRIMARY KEY (tag, entity_type, cache_key)
);

CREATE INDEX IF NOT EXISTS idx_cache_tags_entry ON cache_tags(entity_type, cache_key);
"#;

impl CacheStorage for SqliteStorage {
  fn get_entry<T: Cacheable>(&self, key: &str) -> Result<Option<CachedEntry<T>>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let row: Option<(Vec<u8>, String)> = conn
      .query_row(
        "SELECT data, cached_at FROM cache_entries
         WHERE entity_type = ? AND cache_key = ?",
        params![T::entity_type(), key],
        |row| Ok((row.get(0)?, row.get(1)?)),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read cache entry: {}", e))?;

    match row {
      Some((data, cached_at_str)) => {
        let value: T = serde_json::from_slice(&data)
          .map_err(|e| eyre!("Failed to deserialize cached {}: {}", T::entity_type(), e))?;
        let cached_at = parse_datetime(&cached_at_str)?;
        Ok(Some(CachedEntry { value, cached_at }))
      }
      None => Ok(None),
    }
  }

  fn store_entry<T: Cacheable>(&self, key: &str, value: &T, tags: &[String]) -> Result<()> {
    let mut conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    let entity_type = T::entity_type();
    let data = serde_json::to_vec(value).map_err(|e| eyre!("Failed to serialize entity: {}", e))?;

    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    tx.execute(
      "INSERT OR REPLACE INTO cache_entries (entity_type, cache_key, data, cached_at)
       VALUES (?, ?, ?, ?)",
      params![entity_type, key, data, Utc::now().to_rfc3339()],
    )
    .map_err(|e| eyre!("Failed to store cache entry: {}", e))?;

    tx.execute(
      "DELETE FROM cache_tags WHERE entity_type = ? AND cache_key = ?",
      params![entity_type, key],
    )
    .map_err(|e| eyre!("Failed to delete old cache tags: {}", e))?;

    for tag in tags {
      tx.execute(
        "INSERT OR IGNORE INTO cache_tags (tag, entity_type, cache_key) VALUES (?, ?, ?)",
        params![tag, entity_type, key],
      )
      .map_err(|e| eyre!("Failed to store cache tag: {}", e))?;
    }

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(())
  }

  fn invalidate_tag(&self, tag: &str) -> Result<usize> {
    let mut conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    let removed = tx
      .execute(
        "DELETE FROM cache_entries WHERE EXISTS (
           SELECT 1 FROM cache_tags t
           WHERE t.tag = ?
             AND t.entity_type = cache_entries.entity_type
             AND t.cache_key = cache_entries.cache_key
         )",
        params![tag],
      )
      .map_err(|e| eyre!("Failed to invalidate tag {}: {}", tag, e))?;

    tx.execute(
      "DELETE FROM cache_tags WHERE NOT EXISTS (
         SELECT 1 FROM cache_entries e
         WHERE e.entity_type = cache_tags.entity_type AND e.cache_key = cache_tags.cache_key
       )",
      [],
    )
    .map_err(|e| eyre!("Failed to prune cache tags: {}", e))?;

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(removed)
  }

  fn clear(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute_batch("DELETE FROM cache_tags; DELETE FROM cache_entries;")
      .map_err(|e| eyre!("Failed to clear cache: {}", e))?;

    Ok(())
  }
}

/// Backend selected at runtime from configuration.
pub enum Storage {
  Noop(NoopStorage),
  Memory(MemoryStorage),
  Sqlite(SqliteStorage),
}

impl Storage {
  /// Open the backend selected in the cache configuration.
  pub fn from_config(config: &CacheConfig) -> Result<Self> {
    match config.backend {
      CacheBackend::Memory => Ok(Storage::Memory(MemoryStorage::new())),
      CacheBackend::None => Ok(Storage::Noop(NoopStorage)),
      CacheBackend::Sqlite => {
        let path = match &config.path {
          Some(path) => path.clone(),
          None => Config::data_dir()?.join("cache.db"),
        };
        Ok(Storage::Sqlite(SqliteStorage::open(&path)?))
      }
    }
  }
}

impl CacheStorage for Storage {
  fn get_entry<T: Cacheable>(&self, key: &str) -> Result<Option<CachedEntry<T>>> {
    match self {
      Storage::Noop(s) => s.get_entry(key),
      Storage::Memory(s) => s.get_entry(key),
      Storage::Sqlite(s) => s.get_entry(key),
    }
  }

  fn store_entry<T: Cacheable>(&self, key: &str, value: &T, tags: &[String]) -> Result<()> {
    match self {
      Storage::Noop(s) => s.store_entry(key, value, tags),
      Storage::Memory(s) => s.store_entry(key, value, tags),
      Storage::Sqlite(s) => s.store_entry(key, value, tags),
    }
  }

  fn invalidate_tag(&self, tag: &str) -> Result<usize> {
    match self {
      Storage::Noop(s) => s.invalidate_tag(tag),
      Storage::Memory(s) => s.invalidate_tag(tag),
      Storage::Sqlite(s) => s.invalidate_tag(tag),
    }
  }

  fn clear(&self) -> Result<()> {
    match self {
      Storage::Noop(s) => s.clear(),
      Storage::Memory(s) => s.clear(),
      Storage::Sqlite(s) => s.clear(),
    }
  }
}

/// Parse a stored RFC 3339 timestamp.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}
