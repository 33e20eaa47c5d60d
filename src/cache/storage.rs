//! Cache storage trait and its file, SQLite and no-op implementations.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

use super::traits::{Cacheable, QueryKey};
use crate::config::{CacheBackend, CacheConfig};

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
  /// Get the entry stored under `key`, if any.
  fn get<T: Cacheable, K: QueryKey>(&self, key: &K) -> Result<Option<CachedEntry<T>>>;

  /// Store `value` under `key`, replacing any previous entry.
  fn put<T: Cacheable, K: QueryKey>(&self, key: &K, value: &T) -> Result<()>;

  /// Remove every entry.
  fn clear(&self) -> Result<()>;
}

/// Storage backend selected by configuration.
pub enum Storage {
  File(FileStorage),
  Sqlite(SqliteStorage),
  Noop(NoopStorage),
}

impl Storage {
  /// Open the backend described by `config`.
  pub fn open(config: &CacheConfig) -> Result<Self> {
    let storage = match config.backend {
      CacheBackend::File => Storage::File(FileStorage::new(config.dir()?)),
      CacheBackend::Sqlite => Storage::Sqlite(SqliteStorage::open(&config.dir()?.join("cache.db"))?),
      CacheBackend::None => Storage::Noop(NoopStorage),
    };
    debug!(backend = ?config.backend, "opened cache storage");
    Ok(storage)
  }
}

impl CacheStorage for Storage {
  fn get<T: Cacheable, K: QueryKey>(&self, key: &K) -> Result<Option<CachedEntry<T>>> {
    match self {
      Storage::File(s) => s.get(key),
      Storage::Sqlite(s) => s.get(key),
      Storage::Noop(s) => s.get(key),
    }
  }

  fn put<T: Cacheable, K: QueryKey>(&self, key: &K, value: &T) -> Result<()> {
    match self {
      Storage::File(s) => s.put(key, value),
      Storage::Sqlite(s) => s.put(key, value),
      Storage::Noop(s) => s.put(key, value),
    }
  }

  fn clear(&self) -> Result<()> {
    match self {
      Storage::File(s) => s.clear(),
      Storage::Sqlite(s) => s.clear(),
      Storage::Noop(s) => s.clear(),
    }
  }
}

/// Storage implementation that doesn't cache anything.
/// Used when caching is disabled - all operations are no-ops.
pub struct NoopStorage;

impl CacheStorage for NoopStorage {
  fn get<T: Cacheable, K: QueryKey>(&self, _key: &K) -> Result<Option<CachedEntry<T>>> {
    Ok(None) // Always miss
  }

  fn put<T: Cacheable, K: QueryKey>(&self, _key: &K, _value: &T) -> Result<()> {
    Ok(()) // Discard
  }

  fn clear(&self) -> Result<()> {
    Ok(())
  }
}

// ============================================================================
// File storage
// ============================================================================

/// One JSON file per key. The file's modification time is its `cached_at`.
pub struct FileStorage {
  dir: PathBuf,
}

impl FileStorage {
  pub fn new(dir: PathBuf) -> Self {
    Self { dir }
  }

  fn path_for<K: QueryKey>(&self, key: &K) -> PathBuf {
    self.dir.join(format!("{}.json", key.file_stem()))
  }
}

impl CacheStorage for FileStorage {
  fn get<T: Cacheable, K: QueryKey>(&self, key: &K) -> Result<Option<CachedEntry<T>>> {
    let path = self.path_for(key);

    let metadata = match std::fs::metadata(&path) {
      Ok(m) => m,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
      Err(e) => return Err(eyre!("Failed to stat cache file {}: {}", path.display(), e)),
    };
    let modified = metadata
      .modified()
      .map_err(|e| eyre!("Failed to read mtime of {}: {}", path.display(), e))?;

    let data = std::fs::read(&path)
      .map_err(|e| eyre!("Failed to read cache file {}: {}", path.display(), e))?;

    // An unreadable entry is a miss, the next fetch overwrites it
    let value: T = match serde_json::from_slice(&data) {
      Ok(v) => v,
      Err(e) => {
        warn!(path = %path.display(), error = %e, "discarding corrupt cache file");
        return Ok(None);
      }
    };

    Ok(Some(CachedEntry {
      value,
      cached_at: DateTime::<Utc>::from(modified),
    }))
  }

  fn put<T: Cacheable, K: QueryKey>(&self, key: &K, value: &T) -> Result<()> {
    std::fs::create_dir_all(&self.dir)
      .map_err(|e| eyre!("Failed to create cache directory {}: {}", self.dir.display(), e))?;

    let path = self.path_for(key);
    let data = serde_json::to_vec(value).map_err(|e| eyre!("Failed to serialize entry: {}", e))?;

    write_private(&path, &data)
      .map_err(|e| eyre!("Failed to write cache file {}: {}", path.display(), e))
  }

  fn clear(&self) -> Result<()> {
    let entries = match std::fs::read_dir(&self.dir) {
      Ok(entries) => entries,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
      Err(e) => return Err(eyre!("Failed to list {}: {}", self.dir.display(), e)),
    };

    for entry in entries.filter_map(|e| e.ok()) {
      let path = entry.path();
      if path.extension().is_some_and(|ext| ext == "json") {
        std::fs::remove_file(&path)
          .map_err(|e| eyre!("Failed to remove {}: {}", path.display(), e))?;
      }
    }

    Ok(())
  }
}

/// Write `data` to `path`, owner-readable only on unix.
///
/// New files are created with mode 0600. A file left over with wider
/// permissions is narrowed before it is rewritten.
fn write_private(path: &Path, data: &[u8]) -> std::io::Result<()> {
  use std::io::Write;

  let mut options = std::fs::OpenOptions::new();
  options.write(true).create(true).truncate(true);

  #[cfg(unix)]
  {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    options.mode(0o600);
    if path.exists() {
      std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
  }

  let mut file = options.open(path)?;
  file.write_all(data)?;
  file.sync_all()
}

// ============================================================================
// SQLite storage
// ============================================================================

/// SQLite-based cache storage implementation.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

/// Schema for the cache table.
const CACHE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS entity_cache (
    entity_type TEXT NOT NULL,
    query_hash TEXT NOT NULL,
    description TEXT NOT NULL,
    data BLOB NOT NULL,
    cached_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (entity_type, query_hash)
);
"#;

impl SqliteStorage {
  /// Open (or create) the database at `path`.
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

  /// In-memory database, nothing survives the process.
  #[cfg(test)]
  pub fn open_in_memory() -> Result<Self> {
    let conn =
      Connection::open_in_memory().map_err(|e| eyre!("Failed to open in-memory cache: {}", e))?;
    Self::with_connection(conn)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(Self {
      conn: Mutex::new(conn),
    })
  }
}

impl CacheStorage for SqliteStorage {
  fn get<T: Cacheable, K: QueryKey>(&self, key: &K) -> Result<Option<CachedEntry<T>>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare(
        "SELECT data, cached_at FROM entity_cache
         WHERE entity_type = ? AND query_hash = ?",
      )
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let row: Option<(Vec<u8>, String)> = stmt
      .query_row(params![T::entity_type(), key.cache_hash()], |row| {
        Ok((row.get(0)?, row.get(1)?))
      })
      .ok();

    let Some((data, cached_at_str)) = row else {
      return Ok(None);
    };

    let value: T = match serde_json::from_slice(&data) {
      Ok(v) => v,
      Err(e) => {
        warn!(key = %key.description(), error = %e, "discarding corrupt cache row");
        return Ok(None);
      }
    };

    Ok(Some(CachedEntry {
      value,
      cached_at: parse_datetime(&cached_at_str)?,
    }))
  }

  fn put<T: Cacheable, K: QueryKey>(&self, key: &K, value: &T) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    let data = serde_json::to_vec(value).map_err(|e| eyre!("Failed to serialize entry: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO entity_cache (entity_type, query_hash, description, data, cached_at)
         VALUES (?, ?, ?, ?, datetime('now'))",
        params![T::entity_type(), key.cache_hash(), key.description(), data],
      )
      .map_err(|e| eyre!("Failed to store entry: {}", e))?;

    Ok(())
  }

  fn clear(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute("DELETE FROM entity_cache", [])
      .map_err(|e| eyre!("Failed to clear cache: {}", e))?;

    Ok(())
  }
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  // SQLite stores as "YYYY-MM-DD HH:MM:SS"
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|dt| dt.and_utc())
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}
