//! Distributed mutual exclusion on top of the shared key-value store.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{LockError, LockResult};
use crate::store::KeyValueStore;

/// Timing for one named lock.
#[derive(Debug, Clone)]
pub struct LockSettings {
    /// How long the key lives if never released.
    pub ttl: Duration,
    /// How long `acquire` keeps retrying.
    pub max_wait: Duration,
    /// Pause between acquisition attempts.
    pub retry_interval: Duration,
}

/// Upper bound on the compare-and-delete issued by a release.
pub const DEFAULT_RELEASE_TIMEOUT: Duration = Duration::from_secs(5);

impl Default for LockSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(30),
            max_wait: Duration::from_secs(10),
            retry_interval: Duration::from_millis(100),
        }
    }
}

/// A TTL-bounded lock identified by a key and owned through a random token.
///
/// Each instance carries its own token; only that instance can release the
/// key it wrote. A holder that crashes loses the lock when the TTL runs out.
pub struct DistributedLock {
    store: Arc<dyn KeyValueStore>,
    key: String,
    token: String,
    ttl: Duration,
    retry_interval: Duration,
    release_timeout: Duration,
}

impl DistributedLock {
    /// Create a new lock handle. Nothing is written until [`acquire`](Self::acquire).
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>, ttl: Duration) -> Self {
        Self {
            store,
            key: key.into(),
            token: Uuid::new_v4().to_string(),
            ttl,
            retry_interval: LockSettings::default().retry_interval,
            release_timeout: DEFAULT_RELEASE_TIMEOUT,
        }
    }

    /// Create a lock handle from settings.
    pub fn with_settings(
        store: Arc<dyn KeyValueStore>,
        key: impl Into<String>,
        settings: &LockSettings,
    ) -> Self {
        Self::new(store, key, settings.ttl).with_retry_interval(settings.retry_interval)
    }

    /// Override the pause between acquisition attempts.
    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    /// Override the upper bound on a release.
    pub fn with_release_timeout(mut self, limit: Duration) -> Self {
        self.release_timeout = limit;
        self
    }

    /// The lock key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// This instance's holder token.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Try to take the lock, retrying until `max_wait` has elapsed.
    ///
    /// Store calls share the same deadline, so a store that never answers
    /// also ends in [`LockError::Timeout`].
    pub async fn acquire(&self, max_wait: Duration) -> LockResult<()> {
        let started = Instant::now();
        let deadline = started + max_wait;

        loop {
            let attempt = self.store.set_if_absent(&self.key, &self.token, self.ttl);
            let acquired = match timeout_at(deadline, attempt).await {
                Ok(result) => result?,
                Err(_) => {
                    warn!(key = %self.key, "Lock store did not answer before the deadline");
                    return Err(LockError::Timeout {
                        key: self.key.clone(),
                        waited: started.elapsed(),
                    });
                }
            };

            if acquired {
                debug!(key = %self.key, waited_ms = started.elapsed().as_millis() as u64, "Lock acquired");
                return Ok(());
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(LockError::Timeout {
                    key: self.key.clone(),
                    waited: now - started,
                });
            }

            tokio::time::sleep(self.retry_interval.min(deadline - now)).await;
        }
    }

    /// Release the lock if this instance still owns it.
    ///
    /// Returns `Ok(false)` when the key had expired or belonged to another
    /// holder; that case is logged, not treated as an error.
    pub async fn release(&self) -> LockResult<bool> {
        let released = timeout(
            self.release_timeout,
            self.store.delete_if_equals(&self.key, &self.token),
        )
        .await
        .map_err(|_| LockError::ReleaseTimeout {
            key: self.key.clone(),
            after: self.release_timeout,
        })??;
        if released {
            debug!(key = %self.key, "Lock released");
        } else {
            warn!(key = %self.key, "Lock not released: it was owned by someone else or expired");
        }
        Ok(released)
    }

    /// Acquire, run `work`, then release regardless of what `work` produced.
    ///
    /// If the calling task is cancelled mid-work the release is skipped and the
    /// TTL frees the key.
    pub async fn run_exclusive<F, T>(&self, max_wait: Duration, work: F) -> LockResult<T>
    where
        F: Future<Output = T>,
    {
        self.acquire(max_wait).await?;
        let output = work.await;
        if let Err(e) = self.release().await {
            warn!(key = %self.key, error = %e, "Error releasing lock");
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreResult;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Store whose calls never complete.
    struct StalledStore;

    #[async_trait]
    impl KeyValueStore for StalledStore {
        async fn get(&self, _key: &str) -> StoreResult<Option<String>> {
            std::future::pending().await
        }
        async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> StoreResult<()> {
            std::future::pending().await
        }
        async fn set_if_absent(&self, _key: &str, _value: &str, _ttl: Duration) -> StoreResult<bool> {
            std::future::pending().await
        }
        async fn delete_if_equals(&self, _key: &str, _expected: &str) -> StoreResult<bool> {
            std::future::pending().await
        }
        async fn ping(&self) -> StoreResult<()> {
            std::future::pending().await
        }
    }

    fn lock_on(store: &Arc<MemoryStore>, ttl: Duration) -> DistributedLock {
        DistributedLock::new(store.clone(), "test_lock", ttl)
            .with_retry_interval(Duration::from_millis(10))
    }

    #[tokio::test]
    async fn test_acquire_and_release() {
        let store = Arc::new(MemoryStore::new());
        let lock = lock_on(&store, Duration::from_secs(5));

        lock.acquire(Duration::from_millis(100)).await.unwrap();
        assert_eq!(store.get("test_lock").await.unwrap().as_deref(), Some(lock.token()));

        assert!(lock.release().await.unwrap());
        assert!(store.get("test_lock").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_second_holder_times_out() {
        let store = Arc::new(MemoryStore::new());
        let first = lock_on(&store, Duration::from_secs(5));
        let second = lock_on(&store, Duration::from_secs(5));

        first.acquire(Duration::from_millis(100)).await.unwrap();

        let result = second.acquire(Duration::from_millis(50)).await;
        assert!(matches!(result, Err(LockError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_reacquire_after_release() {
        let store = Arc::new(MemoryStore::new());
        let first = lock_on(&store, Duration::from_secs(5));
        let third = lock_on(&store, Duration::from_secs(5));

        first.acquire(Duration::from_millis(100)).await.unwrap();
        first.release().await.unwrap();

        let started = std::time::Instant::now();
        tokio_test::assert_ok!(third.acquire(Duration::from_secs(2)).await);
        assert!(started.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_reacquire_after_ttl_expiry() {
        let store = Arc::new(MemoryStore::new());
        let crashed = lock_on(&store, Duration::from_millis(50));
        let next = lock_on(&store, Duration::from_secs(5));

        crashed.acquire(Duration::from_millis(100)).await.unwrap();

        let started = std::time::Instant::now();
        next.acquire(Duration::from_secs(5)).await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_release_not_owner_is_noop() {
        let store = Arc::new(MemoryStore::new());
        let stale = lock_on(&store, Duration::from_millis(30));
        let current = lock_on(&store, Duration::from_secs(5));

        stale.acquire(Duration::from_millis(100)).await.unwrap();
        current.acquire(Duration::from_secs(1)).await.unwrap();

        assert!(!stale.release().await.unwrap());
        assert_eq!(store.get("test_lock").await.unwrap().as_deref(), Some(current.token()));
    }

    #[tokio::test]
    async fn test_run_exclusive_releases_after_work() {
        let store = Arc::new(MemoryStore::new());
        let lock = lock_on(&store, Duration::from_secs(5));

        let value = lock
            .run_exclusive(Duration::from_millis(100), async { 42 })
            .await
            .unwrap();

        assert_eq!(value, 42);
        assert!(store.get("test_lock").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_run_exclusive_serializes_holders() {
        let store = Arc::new(MemoryStore::new());
        let active = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let lock = lock_on(&store, Duration::from_secs(5));
            let active = active.clone();
            let max_seen = max_seen.clone();
            handles.push(tokio::spawn(async move {
                lock.run_exclusive(Duration::from_secs(5), async {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                })
                .await
            }));
        }

        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stalled_store_bounded() {
        let lock = DistributedLock::new(Arc::new(StalledStore), "test_lock", Duration::from_secs(5))
            .with_release_timeout(Duration::from_millis(50));

        let acquired = tokio::time::timeout(Duration::from_secs(2), lock.acquire(Duration::from_millis(50)))
            .await
            .expect("acquire should give up at its deadline");
        assert!(matches!(acquired, Err(LockError::Timeout { .. })));

        let released = tokio::time::timeout(Duration::from_secs(2), lock.release())
            .await
            .expect("release should give up after its timeout");
        assert!(matches!(released, Err(LockError::ReleaseTimeout { .. })));
    }
}
