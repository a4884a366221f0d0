//! Rate cache over the shared key-value store.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use exrates_common::{format_date, Currency, RateMap, RateSnapshot};
use serde::de::DeserializeOwned;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::{CacheError, CacheResult};
use crate::lock::{DistributedLock, LockSettings};
use crate::store::KeyValueStore;

/// Name of the lock every cache write goes through.
pub const CACHE_WRITE_LOCK_KEY: &str = "cache_write_lock";

/// Cache key for the latest rates of a base currency.
pub fn latest_key(base: &Currency) -> String {
    format!("latest:{}", base.code())
}

/// Cache key for one day of historical rates of a base currency.
pub fn historical_key(date: NaiveDate, base: &Currency) -> String {
    format!("historical:{}:{}", format_date(date), base.code())
}

/// Read and write access to cached rate snapshots.
///
/// Reads never fail: any problem is reported as a miss. Writes return an
/// error the caller is expected to log and otherwise ignore.
#[async_trait]
pub trait RateCache: Send + Sync {
    /// Cached latest rates for `base`.
    async fn latest_rates(&self, base: &Currency) -> Option<RateSnapshot>;

    /// Store the latest rates for `base`.
    async fn set_latest_rates(&self, base: &Currency, snapshot: &RateSnapshot) -> CacheResult<()>;

    /// Cached rates for `base` on `date`.
    async fn historical_rates(&self, date: NaiveDate, base: &Currency) -> Option<RateMap>;

    /// Store the rates for `base` on `date`.
    async fn set_historical_rates(
        &self,
        date: NaiveDate,
        base: &Currency,
        rates: &RateMap,
    ) -> CacheResult<()>;
}

/// Configuration for the rate cache.
#[derive(Debug, Clone)]
pub struct RateCacheConfig {
    /// TTL of latest entries.
    pub latest_ttl: Duration,
    /// TTL of historical entries.
    pub historical_ttl: Duration,
    /// Upper bound on a single read.
    pub read_timeout: Duration,
    /// Upper bound on a single write, lock excluded.
    pub write_timeout: Duration,
    /// Key of the shared write lock.
    pub write_lock_key: String,
    /// Timing of the shared write lock.
    pub write_lock: LockSettings,
}

impl Default for RateCacheConfig {
    fn default() -> Self {
        Self {
            latest_ttl: Duration::from_secs(60 * 60),
            historical_ttl: Duration::from_secs(30 * 24 * 60 * 60),
            read_timeout: Duration::from_secs(5),
            write_timeout: Duration::from_secs(10),
            write_lock_key: CACHE_WRITE_LOCK_KEY.to_string(),
            write_lock: LockSettings {
                ttl: Duration::from_secs(30),
                max_wait: Duration::from_secs(10),
                retry_interval: Duration::from_millis(100),
            },
        }
    }
}

/// [`RateCache`] storing JSON values in a [`KeyValueStore`].
pub struct StoreRateCache {
    store: Arc<dyn KeyValueStore>,
    config: RateCacheConfig,
}

impl StoreRateCache {
    /// Create a cache with default configuration.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_config(store, RateCacheConfig::default())
    }

    /// Create a cache with custom configuration.
    pub fn with_config(store: Arc<dyn KeyValueStore>, config: RateCacheConfig) -> Self {
        Self { store, config }
    }

    /// Current configuration.
    pub fn config(&self) -> &RateCacheConfig {
        &self.config
    }

    async fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match timeout(self.config.read_timeout, self.store.get(key)).await {
            Ok(Ok(Some(raw))) => raw,
            Ok(Ok(None)) => {
                debug!(key = %key, "Cache miss");
                return None;
            }
            Ok(Err(e)) => {
                warn!(key = %key, error = %e, "Cache read failed, treating as miss");
                return None;
            }
            Err(_) => {
                warn!(key = %key, timeout = ?self.config.read_timeout, "Cache read timed out, treating as miss");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => {
                debug!(key = %key, "Cache hit");
                Some(value)
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Cached value could not be decoded, treating as miss");
                None
            }
        }
    }

    async fn write(&self, key: &str, value: String, ttl: Duration) -> CacheResult<()> {
        let lock = DistributedLock::with_settings(
            self.store.clone(),
            self.config.write_lock_key.clone(),
            &self.config.write_lock,
        )
        .with_release_timeout(self.config.write_timeout);

        let write = timeout(self.config.write_timeout, self.store.set(key, &value, ttl));
        match lock.run_exclusive(self.config.write_lock.max_wait, write).await? {
            Ok(result) => result?,
            Err(_) => {
                return Err(CacheError::Timeout {
                    key: key.to_string(),
                    after: self.config.write_timeout,
                })
            }
        }

        info!(key = %key, ttl_secs = ttl.as_secs(), "Cache entry written");
        Ok(())
    }
}

#[async_trait]
impl RateCache for StoreRateCache {
    async fn latest_rates(&self, base: &Currency) -> Option<RateSnapshot> {
        self.read(&latest_key(base)).await
    }

    async fn set_latest_rates(&self, base: &Currency, snapshot: &RateSnapshot) -> CacheResult<()> {
        let value = serde_json::to_string(snapshot)?;
        self.write(&latest_key(base), value, self.config.latest_ttl)
            .await
    }

    async fn historical_rates(&self, date: NaiveDate, base: &Currency) -> Option<RateMap> {
        self.read(&historical_key(date, base)).await
    }

    async fn set_historical_rates(
        &self,
        date: NaiveDate,
        base: &Currency,
        rates: &RateMap,
    ) -> CacheResult<()> {
        let value = serde_json::to_string(rates)?;
        self.write(&historical_key(date, base), value, self.config.historical_ttl)
            .await
    }
}
