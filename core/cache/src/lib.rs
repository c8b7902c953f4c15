//! Cache manager for the interception layer.
//!
//! This module provides:
//! - Generation-scoped response storage keyed by GET request identity
//! - Resource routing to network-first or cache-first strategies
//! - Install-time priming of the static manifest and activation cleanup
//!   of stale generations

pub mod config;
pub mod storage;
pub mod strategy;

pub use config::{CacheConfig, DEFAULT_CACHE_NAME, DEFAULT_OFFLINE_URL};
pub use storage::{CacheStorage, CachedResponse};
pub use strategy::{image_placeholder, CacheManager, FetchDisposition, InstallReport, Route};
