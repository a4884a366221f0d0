//! Exrates FX Engine
//!
//! Cache-backed exchange rate lookups shared by every instance of the
//! service.
//!
//! # Features
//!
//! - Read-through rate repository with fire-and-forget cache write-back
//! - Redis or in-process key-value store behind one trait
//! - Token-owned distributed lock serializing cache writes and refreshes
//! - Background refresher keeping latest rates warm for every base currency
//! - Retrying HTTP client for a Frankfurter-compatible rate API
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use exrates_fx::{CachedRateRepository, HttpRateProvider, MemoryStore, ProviderConfig,
//!     RateRepository, StoreRateCache, WriteBehind};
//! use exrates_common::Currency;
//!
//! let store = Arc::new(MemoryStore::new());
//! let cache = Arc::new(StoreRateCache::new(store));
//! let (writer, _worker) = WriteBehind::spawn(cache.clone());
//! let provider = Arc::new(HttpRateProvider::new(ProviderConfig::default())?);
//! let repo = CachedRateRepository::new(provider, cache, writer);
//!
//! let latest = repo.latest_rates(&Currency::usd(), &Currency::inr()).await?;
//! ```

pub mod cache;
pub mod client;
pub mod error;
pub mod lock;
pub mod provider;
pub mod redis_store;
pub mod refresher;
pub mod repository;
pub mod store;
pub mod write_behind;

pub use cache::{RateCache, RateCacheConfig, StoreRateCache};
pub use client::{HttpRateProvider, ProviderConfig};
pub use error::{CacheError, FxError, FxResult, LockError, StoreError};
pub use lock::{DistributedLock, LockSettings};
pub use provider::RateProvider;
#[cfg(any(test, feature = "test-utils"))]
pub use provider::{MockRateProvider, ProviderCall};
pub use redis_store::RedisStore;
pub use refresher::{RateRefresher, RefreshOutcome, RefreshReport, RefresherConfig};
pub use repository::{CachedRateRepository, RateRepository};
pub use store::{KeyValueStore, MemoryStore, DEFAULT_EVICTION_INTERVAL};
pub use write_behind::{CacheWrite, WriteBehind};
