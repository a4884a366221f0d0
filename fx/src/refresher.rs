//! Periodic refresh of the latest-rate cache.

use std::sync::Arc;
use std::time::Duration;

use exrates_common::Currency;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::cache::RateCache;
use crate::error::LockError;
use crate::lock::{DistributedLock, LockSettings};
use crate::provider::RateProvider;
use crate::store::KeyValueStore;

/// Name of the lock serializing refresh cycles across instances.
pub const REFRESH_LOCK_KEY: &str = "exchange_rate_cache_refresh_lock";

/// Configuration for the background refresher.
#[derive(Debug, Clone)]
pub struct RefresherConfig {
    /// Time between refresh cycles.
    pub interval: Duration,
    /// Key of the refresh lock.
    pub lock_key: String,
    /// Timing of the refresh lock.
    pub lock: LockSettings,
    /// Base currencies to refresh.
    pub bases: Vec<Currency>,
}

impl Default for RefresherConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30 * 60),
            lock_key: REFRESH_LOCK_KEY.to_string(),
            lock: LockSettings {
                ttl: Duration::from_secs(2 * 60),
                max_wait: Duration::from_secs(15),
                retry_interval: Duration::from_millis(100),
            },
            bases: Currency::supported(),
        }
    }
}

/// Per-cycle result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RefreshReport {
    /// Bases written to the cache.
    pub refreshed: Vec<Currency>,
    /// Bases whose fetch or write failed.
    pub failed: Vec<Currency>,
}

/// What a refresh cycle did.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// Another holder had the refresh lock.
    Skipped,
    Completed(RefreshReport),
}

/// Keeps the latest-rate cache warm for every base currency.
pub struct RateRefresher {
    provider: Arc<dyn RateProvider>,
    cache: Arc<dyn RateCache>,
    store: Arc<dyn KeyValueStore>,
    config: RefresherConfig,
}

impl RateRefresher {
    /// Create a new refresher.
    pub fn new(
        provider: Arc<dyn RateProvider>,
        cache: Arc<dyn RateCache>,
        store: Arc<dyn KeyValueStore>,
        config: RefresherConfig,
    ) -> Self {
        Self {
            provider,
            cache,
            store,
            config,
        }
    }

    /// Refresh once immediately and then on every interval until `shutdown`
    /// turns true or its sender is dropped.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(interval = ?self.config.interval, "Background refresh worker started");

        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    debug!("Background refresh triggered");
                    self.refresh_once().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Background refresh worker stopping");
    }

    /// Run a single refresh cycle under the refresh lock.
    pub async fn refresh_once(&self) -> RefreshOutcome {
        let lock = DistributedLock::with_settings(
            self.store.clone(),
            self.config.lock_key.clone(),
            &self.config.lock,
        );

        match lock.run_exclusive(self.config.lock.max_wait, self.refresh_all()).await {
            Ok(report) => {
                info!(
                    refreshed = report.refreshed.len(),
                    failed = report.failed.len(),
                    "Cache refresh cycle finished"
                );
                RefreshOutcome::Completed(report)
            }
            Err(LockError::Timeout { .. }) => {
                info!("Could not acquire refresh lock, skipping this cycle");
                RefreshOutcome::Skipped
            }
            Err(e) => {
                error!(error = %e, "Error acquiring refresh lock, skipping this cycle");
                RefreshOutcome::Skipped
            }
        }
    }

    async fn refresh_all(&self) -> RefreshReport {
        let mut report = RefreshReport::default();

        for base in &self.config.bases {
            let targets: Vec<Currency> = self
                .config
                .bases
                .iter()
                .filter(|c| *c != base)
                .cloned()
                .collect();
            if targets.is_empty() {
                continue;
            }

            let snapshot = match self.provider.fetch_latest(base, &targets).await {
                Ok(snapshot) => snapshot.with_identity(base),
                Err(e) => {
                    warn!(
                        provider = self.provider.name(),
                        base = %base,
                        error = %e,
                        "Failed to refresh latest rates"
                    );
                    report.failed.push(base.clone());
                    continue;
                }
            };

            match self.cache.set_latest_rates(base, &snapshot).await {
                Ok(()) => {
                    debug!(base = %base, "Cache refreshed");
                    report.refreshed.push(base.clone());
                }
                Err(e) => {
                    warn!(base = %base, error = %e, "Failed to write refreshed rates");
                    report.failed.push(base.clone());
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::StoreRateCache;
    use crate::provider::MockRateProvider;
    use crate::store::MemoryStore;
    use exrates_common::RateMap;

    struct Setup {
        provider: Arc<MockRateProvider>,
        cache: Arc<dyn RateCache>,
        store: Arc<MemoryStore>,
    }

    fn setup() -> Setup {
        let provider = Arc::new(MockRateProvider::new());
        for base in Currency::supported() {
            let rates: RateMap = base.counterparts().into_iter().map(|c| (c, 2.0)).collect();
            provider.set_latest(base, rates);
        }
        let store = Arc::new(MemoryStore::new());
        let cache: Arc<dyn RateCache> = Arc::new(StoreRateCache::new(store.clone()));
        Setup {
            provider,
            cache,
            store,
        }
    }

    fn fast_config() -> RefresherConfig {
        RefresherConfig {
            interval: Duration::from_millis(50),
            lock: LockSettings {
                ttl: Duration::from_secs(5),
                max_wait: Duration::from_millis(50),
                retry_interval: Duration::from_millis(10),
            },
            ..Default::default()
        }
    }

    fn refresher(s: &Setup) -> RateRefresher {
        RateRefresher::new(s.provider.clone(), s.cache.clone(), s.store.clone(), fast_config())
    }

    #[tokio::test]
    async fn test_refresh_all_bases() {
        let s = setup();

        let outcome = refresher(&s).refresh_once().await;

        let RefreshOutcome::Completed(report) = outcome else {
            panic!("expected a completed cycle");
        };
        assert_eq!(report.refreshed.len(), Currency::supported().len());
        assert!(report.failed.is_empty());

        for base in Currency::supported() {
            let cached = s.cache.latest_rates(&base).await.unwrap();
            assert_eq!(cached.rate(&base), Some(1.0));
            assert_eq!(cached.rates.len(), Currency::supported().len());
        }
        assert!(s.store.get(REFRESH_LOCK_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failing_base_does_not_abort_cycle() {
        let s = setup();
        s.provider.fail_for(Currency::gbp());

        let outcome = refresher(&s).refresh_once().await;

        let RefreshOutcome::Completed(report) = outcome else {
            panic!("expected a completed cycle");
        };
        assert_eq!(report.failed, vec![Currency::gbp()]);
        assert_eq!(report.refreshed.len(), Currency::supported().len() - 1);
        assert!(s.cache.latest_rates(&Currency::gbp()).await.is_none());
        assert!(s.cache.latest_rates(&Currency::jpy()).await.is_some());
        assert!(s.store.get(REFRESH_LOCK_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_skips_when_lock_held() {
        let s = setup();
        let other = DistributedLock::new(s.store.clone(), REFRESH_LOCK_KEY, Duration::from_secs(5));
        other.acquire(Duration::from_millis(50)).await.unwrap();

        let outcome = refresher(&s).refresh_once().await;

        assert_eq!(outcome, RefreshOutcome::Skipped);
        assert_eq!(s.provider.call_count(), 0);
        assert_eq!(s.store.get(REFRESH_LOCK_KEY).await.unwrap().as_deref(), Some(other.token()));
    }

    #[tokio::test]
    async fn test_run_refreshes_immediately_and_stops() {
        let s = setup();
        let refresher = Arc::new(refresher(&s));
        let (tx, rx) = watch::channel(false);

        let worker = {
            let refresher = refresher.clone();
            tokio::spawn(async move { refresher.run(rx).await })
        };

        // first tick fires immediately, then every 50ms
        let bases = Currency::supported().len();
        tokio::time::timeout(Duration::from_secs(2), async {
            while s.provider.call_count() < bases * 2 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), worker).await.unwrap().unwrap();

        assert!(s.cache.latest_rates(&Currency::usd()).await.is_some());
        assert!(s.store.get(REFRESH_LOCK_KEY).await.unwrap().is_none());
    }
}
