//! Generation-tagged response cache.
//!
//! This module provides the worker's cache mechanism:
//! - Stores request-URL -> response pairs namespaced by generation tag
//! - Install populates the current generation atomically from the manifest
//! - Activation deletes every generation except the current one
//! - Fetch routing applies network-first / cache-first strategies

mod manager;
mod storage;
mod traits;

pub use manager::{CacheManager, InstallReport};
pub use storage::{MemoryStorage, SqliteStorage};
pub use traits::{CacheStorage, CachedResponse};
