//! Cache manager that orchestrates install-time pre-population,
//! activate-time cleanup, and fetch-time request routing.

use color_eyre::{eyre::eyre, Result};
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

use super::traits::CacheStorage;
use crate::config::RoutingPolicy;
use crate::fetch::Fetch;
use crate::http::{Destination, Request, RequestMode, Response};
use crate::manifest::Manifest;

/// Outcome of install-time pre-population.
#[derive(Debug, Clone, Copy)]
pub struct InstallReport {
  /// Number of manifest entries now present in the generation store
  pub cached: usize,
  /// Whether the bulk add failed (the generation stays unpopulated)
  pub failed: bool,
}

/// Owns the three lifecycle responsibilities of the worker.
///
/// - install: populate the current generation from the manifest
/// - activate: delete every generation but the current one
/// - fetch: route requests with network-first / cache-first strategies
pub struct CacheManager<S, F> {
  storage: Arc<S>,
  fetcher: Arc<F>,
  tag: String,
  manifest: Manifest,
  policy: RoutingPolicy,
}

impl<S: CacheStorage + 'static, F: Fetch> CacheManager<S, F> {
  pub fn new(
    storage: S,
    fetcher: F,
    tag: impl Into<String>,
    manifest: Manifest,
    policy: RoutingPolicy,
  ) -> Self {
    Self {
      storage: Arc::new(storage),
      fetcher: Arc::new(fetcher),
      tag: tag.into(),
      manifest,
      policy,
    }
  }

  /// The current generation tag.
  pub fn tag(&self) -> &str {
    &self.tag
  }

  /// Pre-populate the current generation with every manifest entry.
  ///
  /// The bulk add is all-or-nothing: if any entry fails to fetch or comes
  /// back non-ok, nothing is written. The failure is logged rather than
  /// surfaced; installation still resolves.
  pub async fn install(&self) -> InstallReport {
    info!(
      tag = %self.tag,
      entries = self.manifest.len(),
      "installing cache generation"
    );

    match self.populate().await {
      Ok(cached) => {
        info!(tag = %self.tag, cached, "cache generation populated");
        InstallReport {
          cached,
          failed: false,
        }
      }
      Err(err) => {
        warn!(tag = %self.tag, error = %err, "failed to pre-cache manifest");
        InstallReport {
          cached: 0,
          failed: true,
        }
      }
    }
  }

  async fn populate(&self) -> Result<usize> {
    let mut batch = Vec::with_capacity(self.manifest.len());
    for url in self.manifest.entries() {
      let request = Request::get(url.clone());
      let response = self.fetcher.fetch(&request).await?;
      if !(200..300).contains(&response.status) {
        return Err(eyre!("{} responded with status {}", url, response.status));
      }
      batch.push((url.clone(), response));
    }
    self.storage.put_all(&self.tag, &batch)?;
    Ok(batch.len())
  }

  /// Delete every stored generation whose tag is not the current one.
  ///
  /// Idempotent: running it again is a no-op once only the current
  /// generation remains.
  pub fn activate(&self) -> Result<()> {
    for tag in self.storage.tags()? {
      if tag != self.tag {
        info!(stale = %tag, "deleting stale cache generation");
        self.storage.delete(&tag)?;
      }
    }
    Ok(())
  }

  /// Route an intercepted request according to the configured policy.
  pub async fn handle_fetch(&self, request: &Request) -> Result<Response> {
    match self.policy {
      RoutingPolicy::SplitByType => {
        if is_document(request) {
          self.network_first(request).await
        } else {
          self.cache_first(request, true).await
        }
      }
      RoutingPolicy::CacheFirstOnly => self.cache_first(request, false).await,
    }
  }

  /// Network-first: prefer live data, fall back to the cache on failure.
  ///
  /// If the cache misses too, the original network error is surfaced.
  async fn network_first(&self, request: &Request) -> Result<Response> {
    match self.fetcher.fetch(request).await {
      Ok(response) => Ok(response),
      Err(err) => {
        debug!(url = %request.url, error = %err, "network failed, trying cache");
        match self.storage.get(&self.tag, &request.url)? {
          Some(cached) => Ok(cached.response),
          None => Err(err),
        }
      }
    }
  }

  /// Cache-first: serve from the store when present, otherwise fetch live.
  ///
  /// A cacheable response gets written back without blocking the caller.
  /// With `gate_on_manifest` the write only happens for manifest members,
  /// which keeps arbitrary cross-origin or dynamic requests from growing
  /// the store.
  async fn cache_first(&self, request: &Request, gate_on_manifest: bool) -> Result<Response> {
    if let Some(cached) = self.storage.get(&self.tag, &request.url)? {
      return Ok(cached.response);
    }

    let response = self.fetcher.fetch(request).await?;

    if response.is_cacheable() && (!gate_on_manifest || self.manifest.contains(&request.url)) {
      self.spawn_cache_write(request.url.clone(), response.clone());
    }

    Ok(response)
  }

  /// Detached write-back. Completion is not awaited by the response path,
  /// but failures are logged, never silently dropped.
  fn spawn_cache_write(&self, url: Url, response: Response) {
    let storage = Arc::clone(&self.storage);
    let tag = self.tag.clone();
    tokio::spawn(async move {
      if let Err(err) = storage.put(&tag, &url, &response) {
        warn!(url = %url, error = %err, "background cache write failed");
      }
    });
  }
}

#[cfg(test)]
impl<S: CacheStorage + 'static, F: Fetch> CacheManager<S, F> {
  pub(crate) fn storage(&self) -> &S {
    &self.storage
  }

  pub(crate) fn fetcher(&self) -> &F {
    &self.fetcher
  }
}

/// A request is a document when it is a page navigation, targets the
/// top-level document, or points at index.html. Everything else is an
/// asset.
fn is_document(request: &Request) -> bool {
  request.mode == RequestMode::Navigate
    || request.destination == Destination::Document
    || request.url.as_str().contains("index.html")
}
