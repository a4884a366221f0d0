//! Shared key-value store abstraction.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::error::StoreResult;

/// Key-value store shared by every instance of the service.
///
/// The conditional operations must be atomic at the storage layer; the
/// distributed lock relies on that.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Get a value, `None` when absent or expired.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Write a value, replacing any existing one and re-arming its TTL.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()>;

    /// Write a value only if the key is absent. Returns whether it was written.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<bool>;

    /// Delete the key only if it currently holds `expected`.
    async fn delete_if_equals(&self, key: &str, expected: &str) -> StoreResult<bool>;

    /// Check the store is reachable.
    async fn ping(&self) -> StoreResult<()>;
}

#[derive(Debug, Clone)]
struct StoredValue {
    value: String,
    expires_at: Instant,
}

impl StoredValue {
    fn new(value: &str, ttl: Duration) -> Self {
        Self {
            value: value.to_string(),
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// How often the in-process store sweeps expired entries.
pub const DEFAULT_EVICTION_INTERVAL: Duration = Duration::from_secs(60);

/// In-process store with per-entry expiry.
///
/// Only coordinates tasks inside one process; multi-instance deployments use
/// [`crate::redis_store::RedisStore`].
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, StoredValue>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| !e.is_expired()).count()
    }

    /// Whether the store holds no live entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop expired entries, returning how many were removed.
    pub fn evict_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired());
        before.saturating_sub(self.entries.len())
    }

    /// Sweep expired entries on every interval until `shutdown` turns true or
    /// its sender is dropped.
    pub async fn run_eviction_loop(&self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let evicted = self.evict_expired();
                    if evicted > 0 {
                        debug!(evicted, "Evicted expired entries");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Store eviction loop stopping");
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired() {
                return Ok(Some(entry.value.clone()));
            }
            drop(entry);
            debug!(key = %key, "Evicting expired entry");
            self.entries.remove_if(key, |_, e| e.is_expired());
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        self.entries.insert(key.to_string(), StoredValue::new(value, ttl));
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<bool> {
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired() {
                    occupied.insert(StoredValue::new(value, ttl));
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(StoredValue::new(value, ttl));
                Ok(true)
            }
        }
    }

    async fn delete_if_equals(&self, key: &str, expected: &str) -> StoreResult<bool> {
        let removed = self
            .entries
            .remove_if(key, |_, e| !e.is_expired() && e.value == expected);
        Ok(removed.is_some())
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
