//! Static-asset caching worker with generation-tagged cache stores.
//!
//! On install the worker pre-caches a fixed asset manifest into the store
//! for the current generation tag. On activation it deletes every stale
//! generation. Intercepted requests are routed by resource type: documents
//! go network-first (live fetch, cache fallback for offline use), assets go
//! cache-first (stored copy wins, misses are fetched and written back when
//! the URL belongs to the manifest).
//!
//! The hosting runtime drives a [`Worker`] by sending [`HostEvent`]s and
//! receives [`HostSignal`]s back; storage and network are trait seams
//! ([`CacheStorage`], [`Fetch`]) with SQLite and reqwest implementations.

pub mod cache;
pub mod config;
pub mod events;
pub mod fetch;
pub mod http;
pub mod manifest;
pub mod worker;

pub use cache::{CacheManager, CacheStorage, CachedResponse, InstallReport, MemoryStorage, SqliteStorage};
pub use config::{Config, RoutingPolicy};
pub use events::{HostEvent, HostSignal};
pub use fetch::{Fetch, HttpFetcher};
pub use http::{Destination, Request, RequestMode, Response, ResponseType};
pub use manifest::Manifest;
pub use worker::Worker;
