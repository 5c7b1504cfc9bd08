//! The fixed list of URLs guaranteed to be pre-cached.

use color_eyre::{eyre::eyre, Result};
use url::Url;

/// Ordered list of absolute asset URLs for the current generation.
///
/// Entries are resolved against the worker scope at construction so that
/// relative paths like `./index.html` and absolute CDN URLs share one
/// representation. Membership checks at fetch time compare absolute URLs.
#[derive(Debug, Clone)]
pub struct Manifest {
  entries: Vec<Url>,
}

impl Manifest {
  /// Resolve raw manifest entries against the worker scope.
  ///
  /// Order is preserved; an entry that resolves to a URL already present
  /// is kept once.
  pub fn resolve(scope: &Url, raw: &[String]) -> Result<Self> {
    let mut entries: Vec<Url> = Vec::with_capacity(raw.len());
    for entry in raw {
      let url = scope
        .join(entry)
        .map_err(|e| eyre!("Invalid manifest entry '{}': {}", entry, e))?;
      if !entries.contains(&url) {
        entries.push(url);
      }
    }
    Ok(Self { entries })
  }

  /// All entries, in manifest order.
  pub fn entries(&self) -> &[Url] {
    &self.entries
  }

  /// Whether a request URL is pinned by the manifest.
  ///
  /// This gates fetch-time cache writes. Install-time population does not
  /// consult it: install writes the whole manifest by definition.
  pub fn contains(&self, url: &Url) -> bool {
    self.entries.iter().any(|e| e == url)
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}
