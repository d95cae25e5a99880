//! Offline cache controller.
//!
//! This module keeps the client minimally usable without a network. Every
//! request goes through `OfflineController::handle_fetch`, which picks a
//! strategy from the request class:
//!
//! - navigations: network first, then the cached copy, then the offline page
//! - static assets (script, style, image, font): cache first
//! - everything else: network first, then any cached copy
//!
//! Responses live in a single named cache region (`CacheStore`) whose name
//! carries a version; bumping the version starts a fresh region and orphans
//! the old one until `prune_regions` sweeps it.

pub mod controller;
pub mod entry;
pub mod fetcher;
pub mod request;
pub mod store;

pub use controller::{ControllerConfig, OfflineController, OfflineError, Strategy, WorkerState};
pub use entry::CachedData;
pub use fetcher::{FetchError, Fetcher, HttpFetcher};
pub use request::{Destination, Request, RequestMode, Response};
pub use store::{list_regions, prune_regions, CacheError, CacheStore, DiskCacheStore, MemoryCacheStore};
