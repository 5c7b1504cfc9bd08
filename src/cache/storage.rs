//! Cache storage backends: SQLite for deployments, in-memory for tests
//! and embedders with their own persistence.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Mutex;
use url::Url;

use super::traits::{CacheStorage, CachedResponse};
use crate::http::{Response, ResponseType};

/// Stable fixed-length storage key for a request URL.
fn url_hash(url: &Url) -> String {
  let mut hasher = Sha256::new();
  hasher.update(url.as_str().as_bytes());
  hex::encode(hasher.finalize())
}

/// SQLite-based cache storage implementation.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Create a new SQLite storage at the default location.
  pub fn open() -> Result<Self> {
    let path = Self::default_path()?;

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(&path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::from_connection(conn)
  }

  /// Create an in-memory storage, mainly for tests.
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory cache database: {}", e))?;
    Self::from_connection(conn)
  }

  fn from_connection(conn: Connection) -> Result<Self> {
    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;
    Ok(storage)
  }

  /// Get the default database path.
  fn default_path() -> Result<std::path::PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("precache").join("cache.db"))
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
-- Responses keyed by generation tag and hashed request URL
CREATE TABLE IF NOT EXISTS response_cache (
    tag TEXT NOT NULL,
    url_hash TEXT NOT NULL,
    url TEXT NOT NULL,
    status INTEGER NOT NULL,
    response_type TEXT NOT NULL,
    content_type TEXT,
    body BLOB NOT NULL,
    cached_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (tag, url_hash)
);

CREATE INDEX IF NOT EXISTS idx_response_cache_tag ON response_cache(tag);
"#;

const INSERT_RESPONSE: &str = "INSERT OR REPLACE INTO response_cache \
   (tag, url_hash, url, status, response_type, content_type, body, cached_at) \
   VALUES (?, ?, ?, ?, ?, ?, ?, datetime('now'))";

impl CacheStorage for SqliteStorage {
  fn put(&self, tag: &str, url: &Url, response: &Response) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        INSERT_RESPONSE,
        params![
          tag,
          url_hash(url),
          url.as_str(),
          response.status,
          response.kind.as_str(),
          response.content_type,
          response.body,
        ],
      )
      .map_err(|e| eyre!("Failed to store response for {}: {}", url, e))?;

    Ok(())
  }

  fn put_all(&self, tag: &str, entries: &[(Url, Response)]) -> Result<()> {
    let mut conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    // One transaction so a failing entry leaves no partial generation
    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    for (url, response) in entries {
      tx.execute(
        INSERT_RESPONSE,
        params![
          tag,
          url_hash(url),
          url.as_str(),
          response.status,
          response.kind.as_str(),
          response.content_type,
          response.body,
        ],
      )
      .map_err(|e| eyre!("Failed to store response for {}: {}", url, e))?;
    }

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(())
  }

  fn get(&self, tag: &str, url: &Url) -> Result<Option<CachedResponse>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare(
        "SELECT status, response_type, content_type, body, cached_at \
         FROM response_cache WHERE tag = ? AND url_hash = ?",
      )
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let row: Option<(u16, String, Option<String>, Vec<u8>, String)> = stmt
      .query_row(params![tag, url_hash(url)], |row| {
        Ok((
          row.get(0)?,
          row.get(1)?,
          row.get(2)?,
          row.get(3)?,
          row.get(4)?,
        ))
      })
      .ok();

    match row {
      Some((status, kind_str, content_type, body, cached_at_str)) => {
        let kind = ResponseType::parse(&kind_str)
          .ok_or_else(|| eyre!("Unknown response type '{}' in cache", kind_str))?;
        let cached_at = parse_datetime(&cached_at_str)?;
        Ok(Some(CachedResponse {
          response: Response {
            status,
            kind,
            content_type,
            body,
          },
          cached_at,
        }))
      }
      None => Ok(None),
    }
  }

  fn delete(&self, tag: &str) -> Result<bool> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let deleted = conn
      .execute("DELETE FROM response_cache WHERE tag = ?", params![tag])
      .map_err(|e| eyre!("Failed to delete generation {}: {}", tag, e))?;

    Ok(deleted > 0)
  }

  fn tags(&self) -> Result<Vec<String>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare("SELECT DISTINCT tag FROM response_cache ORDER BY tag")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let tags = stmt
      .query_map([], |row| row.get(0))
      .map_err(|e| eyre!("Failed to query tags: {}", e))?
      .filter_map(|r| r.ok())
      .collect();

    Ok(tags)
  }
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  // SQLite stores as "YYYY-MM-DD HH:MM:SS"
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|dt| dt.and_utc())
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}

/// In-memory cache storage, a plain map behind a mutex.
#[derive(Default)]
pub struct MemoryStorage {
  generations: Mutex<HashMap<String, HashMap<String, CachedResponse>>>,
}

impl MemoryStorage {
  pub fn new() -> Self {
    Self::default()
  }
}

impl CacheStorage for MemoryStorage {
  fn put(&self, tag: &str, url: &Url, response: &Response) -> Result<()> {
    let mut generations = self
      .generations
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    generations.entry(tag.to_string()).or_default().insert(
      url.as_str().to_string(),
      CachedResponse {
        response: response.clone(),
        cached_at: Utc::now(),
      },
    );

    Ok(())
  }

  fn put_all(&self, tag: &str, entries: &[(Url, Response)]) -> Result<()> {
    let mut generations = self
      .generations
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let generation = generations.entry(tag.to_string()).or_default();
    for (url, response) in entries {
      generation.insert(
        url.as_str().to_string(),
        CachedResponse {
          response: response.clone(),
          cached_at: Utc::now(),
        },
      );
    }

    Ok(())
  }

  fn get(&self, tag: &str, url: &Url) -> Result<Option<CachedResponse>> {
    let generations = self
      .generations
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    Ok(
      generations
        .get(tag)
        .and_then(|generation| generation.get(url.as_str()))
        .cloned(),
    )
  }

  fn delete(&self, tag: &str) -> Result<bool> {
    let mut generations = self
      .generations
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    Ok(generations.remove(tag).is_some())
  }

  fn tags(&self) -> Result<Vec<String>> {
    let generations = self
      .generations
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut tags: Vec<String> = generations.keys().cloned().collect();
    tags.sort();
    Ok(tags)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn asset(url: &str) -> (Url, Response) {
    (
      Url::parse(url).unwrap(),
      Response {
        status: 200,
        kind: ResponseType::Basic,
        content_type: Some("text/html".to_string()),
        body: url.as_bytes().to_vec(),
      },
    )
  }

  #[test]
  fn sqlite_put_get_round_trip() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    let (url, response) = asset("https://roleta-iap.example/index.html");

    storage.put("v1", &url, &response).unwrap();

    let cached = storage.get("v1", &url).unwrap().unwrap();
    assert_eq!(cached.response, response);

    // Other generations don't see it
    assert!(storage.get("v2", &url).unwrap().is_none());
  }

  #[test]
  fn sqlite_bulk_populate_and_enumerate() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    let entries = vec![
      asset("https://roleta-iap.example/"),
      asset("https://roleta-iap.example/index.html"),
      asset("https://cdn.example/lib.min.js"),
    ];

    storage.put_all("v1", &entries).unwrap();

    for (url, response) in &entries {
      let cached = storage.get("v1", url).unwrap().unwrap();
      assert_eq!(&cached.response, response);
    }
    assert_eq!(storage.tags().unwrap(), vec!["v1".to_string()]);
  }

  #[test]
  fn sqlite_delete_removes_generation() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    let (url, response) = asset("https://roleta-iap.example/index.html");

    storage.put("v1", &url, &response).unwrap();
    storage.put("v2", &url, &response).unwrap();

    assert!(storage.delete("v1").unwrap());
    assert!(!storage.delete("v1").unwrap());

    assert!(storage.get("v1", &url).unwrap().is_none());
    assert_eq!(storage.tags().unwrap(), vec!["v2".to_string()]);
  }

  #[test]
  fn sqlite_put_is_idempotent() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    let (url, response) = asset("https://roleta-iap.example/index.html");

    storage.put("v1", &url, &response).unwrap();
    storage.put("v1", &url, &response).unwrap();

    assert_eq!(storage.tags().unwrap(), vec!["v1".to_string()]);
    let cached = storage.get("v1", &url).unwrap().unwrap();
    assert_eq!(cached.response, response);
  }

  #[test]
  fn memory_storage_behaves_like_sqlite() {
    let storage = MemoryStorage::new();
    let entries = vec![
      asset("https://roleta-iap.example/"),
      asset("https://roleta-iap.example/index.html"),
    ];

    storage.put_all("v1", &entries).unwrap();
    let (url, response) = &entries[1];
    assert_eq!(
      storage.get("v1", url).unwrap().unwrap().response,
      *response
    );

    assert!(storage.delete("v1").unwrap());
    assert!(storage.tags().unwrap().is_empty());
  }
}
