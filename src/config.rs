use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

/// Request routing policy applied by the fetch handler.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum RoutingPolicy {
  /// Network-first for documents, cache-first with a manifest membership
  /// gate for everything else
  #[default]
  SplitByType,
  /// Unconditional cache-first for every request, no membership gate
  CacheFirstOnly,
}

/// Deployment configuration for the worker.
///
/// Hard-coded per deployment: there is no runtime configuration surface
/// beyond this file.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  /// Version tag selecting which cache generation is live.
  /// Bump it on every code update so stale generations get evicted.
  pub generation_tag: String,
  /// Base URL the worker serves under; manifest entries resolve against it
  pub scope: Url,
  /// Raw manifest entries (relative paths or absolute URLs)
  pub manifest: Vec<String>,
  #[serde(default)]
  pub policy: RoutingPolicy,
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./precache.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/precache/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/precache/config.yaml"
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("precache.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("precache").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }
}
