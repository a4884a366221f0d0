//! Cache-backed rate repository.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use exrates_common::{days_inclusive, parse_date, with_identity, Currency, DailyRates, RateMap, RateSnapshot};
use tracing::{debug, info, instrument, warn};

use crate::cache::RateCache;
use crate::error::FxResult;
use crate::provider::RateProvider;
use crate::write_behind::{CacheWrite, WriteBehind};

/// Rate lookups for the service layer.
///
/// A requested target missing from the data is an omitted map entry, never
/// an error. Errors only come from the upstream provider.
#[async_trait]
pub trait RateRepository: Send + Sync {
    /// Latest rate of `target` plus the base identity rate, with its timestamp.
    async fn latest_rates(&self, base: &Currency, target: &Currency) -> FxResult<RateSnapshot>;

    /// Daily rates of `target` over `[start, end]`.
    async fn historical_rates(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        base: &Currency,
        target: &Currency,
    ) -> FxResult<DailyRates>;
}

/// Repository that reads through the rate cache and falls back to the provider.
///
/// Upstream fetches always cover every supported currency so the cached entry
/// serves any later target for the same base. Write-backs go through
/// [`WriteBehind`] and are never awaited.
pub struct CachedRateRepository {
    provider: Arc<dyn RateProvider>,
    cache: Arc<dyn RateCache>,
    writer: WriteBehind,
}

impl CachedRateRepository {
    /// Create a new repository.
    pub fn new(provider: Arc<dyn RateProvider>, cache: Arc<dyn RateCache>, writer: WriteBehind) -> Self {
        Self {
            provider,
            cache,
            writer,
        }
    }
}

#[async_trait]
impl RateRepository for CachedRateRepository {
    #[instrument(skip(self), fields(base = %base, target = %target))]
    async fn latest_rates(&self, base: &Currency, target: &Currency) -> FxResult<RateSnapshot> {
        if let Some(cached) = self.cache.latest_rates(base).await {
            debug!("Using cached latest rates");
            let mut rates = RateMap::new();
            if let Some(rate) = cached.rate(target) {
                rates.insert(target.clone(), rate);
            }
            return Ok(RateSnapshot::new(rates, cached.timestamp).with_identity(base));
        }

        let fetched = self
            .provider
            .fetch_latest(base, &base.counterparts())
            .await?
            .with_identity(base);
        debug!(provider = self.provider.name(), "Fetched latest rates from provider");

        self.writer.submit(CacheWrite::Latest {
            base: base.clone(),
            snapshot: fetched.clone(),
        });

        let mut rates = RateMap::new();
        match fetched.rate(target) {
            Some(rate) => {
                rates.insert(target.clone(), rate);
            }
            None => warn!("Provider did not return the requested target rate"),
        }

        Ok(RateSnapshot::new(rates, fetched.timestamp).with_identity(base))
    }

    #[instrument(skip(self), fields(base = %base, target = %target, start = %start, end = %end))]
    async fn historical_rates(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        base: &Currency,
        target: &Currency,
    ) -> FxResult<DailyRates> {
        let mut from_cache = DailyRates::new();
        let mut all_cached = true;

        for day in days_inclusive(start, end) {
            match self.cache.historical_rates(day, base).await {
                Some(rates) => {
                    if let Some(&rate) = rates.get(target) {
                        from_cache.insert(day, rate);
                    }
                }
                None => {
                    debug!(day = %day, "Historical cache miss, fetching whole range");
                    all_cached = false;
                    break;
                }
            }
        }

        if all_cached {
            debug!(days = from_cache.len(), "Using cached historical rates");
            return Ok(from_cache);
        }

        let series = self
            .provider
            .fetch_time_series(start, end, base, &base.counterparts())
            .await?;

        let mut result = DailyRates::new();
        for (raw_date, rates) in series.rates {
            let day = match parse_date(&raw_date) {
                Ok(day) => day,
                Err(e) => {
                    warn!(date = %raw_date, error = %e, "Skipping malformed date from provider");
                    continue;
                }
            };

            let rates = with_identity(rates, base);
            if let Some(&rate) = rates.get(target) {
                result.insert(day, rate);
            }

            self.writer.submit(CacheWrite::Historical {
                date: day,
                base: base.clone(),
                rates,
            });
        }

        info!(
            provider = self.provider.name(),
            days = result.len(),
            "Fetched historical rates from provider"
        );
        Ok(result)
    }
}
