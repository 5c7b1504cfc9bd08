//! Core trait and types for the generation-tagged response store.

use chrono::{DateTime, Utc};
use color_eyre::Result;
use url::Url;

use crate::http::Response;

/// A response retrieved from the store, with its write timestamp.
#[derive(Debug, Clone)]
pub struct CachedResponse {
  /// The stored response
  pub response: Response,
  /// When the response was written
  pub cached_at: DateTime<Utc>,
}

/// Trait for cache storage backends.
///
/// The store is an opaque URL -> response map namespaced by generation tag.
/// Writes are idempotent (same key, equivalent value), so racing writes
/// from install and fetch-time caching need no coordination beyond the
/// backend's own locking.
pub trait CacheStorage: Send + Sync {
  /// Store a single response under the given generation tag.
  fn put(&self, tag: &str, url: &Url, response: &Response) -> Result<()>;

  /// Atomically store a batch of responses (install-time bulk populate).
  ///
  /// All-or-nothing: on error, nothing from the batch is visible.
  fn put_all(&self, tag: &str, entries: &[(Url, Response)]) -> Result<()>;

  /// Look up a response for a request URL within a generation.
  fn get(&self, tag: &str, url: &Url) -> Result<Option<CachedResponse>>;

  /// Delete a whole generation. Returns whether it existed.
  fn delete(&self, tag: &str) -> Result<bool>;

  /// Enumerate the generation tags currently present.
  fn tags(&self) -> Result<Vec<String>>;
}
