//! Upstream rate provider trait and a scriptable mock.

use async_trait::async_trait;
use chrono::NaiveDate;
use exrates_common::{Currency, RateSnapshot, TimeSeriesRates};

use crate::error::FxResult;

/// Source of truth for exchange rates.
#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Get the provider name.
    fn name(&self) -> &str;

    /// Latest rates for `base` against each of `targets`.
    ///
    /// The base-to-itself rate is not expected in the result.
    async fn fetch_latest(&self, base: &Currency, targets: &[Currency]) -> FxResult<RateSnapshot>;

    /// Daily rates for `base` against `targets` over `[start, end]`.
    async fn fetch_time_series(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        base: &Currency,
        targets: &[Currency],
    ) -> FxResult<TimeSeriesRates>;
}

#[cfg(any(test, feature = "test-utils"))]
pub use mock::{MockRateProvider, ProviderCall};

#[cfg(any(test, feature = "test-utils"))]
mod mock {
    use super::*;
    use crate::error::FxError;
    use chrono::Utc;
    use exrates_common::RateMap;
    use parking_lot::Mutex;
    use std::collections::{HashMap, HashSet};

    /// A recorded call to [`MockRateProvider`].
    #[derive(Debug, Clone, PartialEq)]
    pub enum ProviderCall {
        Latest {
            base: Currency,
            targets: Vec<Currency>,
        },
        TimeSeries {
            start: NaiveDate,
            end: NaiveDate,
            base: Currency,
            targets: Vec<Currency>,
        },
    }

    #[derive(Default)]
    struct MockState {
        latest: HashMap<Currency, RateSnapshot>,
        series: HashMap<Currency, TimeSeriesRates>,
        failing: HashSet<Currency>,
        calls: Vec<ProviderCall>,
    }

    /// Mock rate provider for testing.
    ///
    /// Answers from canned data and records every call.
    #[derive(Default)]
    pub struct MockRateProvider {
        state: Mutex<MockState>,
    }

    impl MockRateProvider {
        /// Create a new mock provider with no data.
        pub fn new() -> Self {
            Self::default()
        }

        /// Canned latest rates for `base`, stamped now.
        pub fn set_latest(&self, base: Currency, rates: RateMap) {
            self.set_snapshot(base, RateSnapshot::new(rates, Utc::now()));
        }

        /// Canned latest snapshot for `base`.
        pub fn set_snapshot(&self, base: Currency, snapshot: RateSnapshot) {
            self.state.lock().latest.insert(base, snapshot);
        }

        /// Canned range response for `base`.
        pub fn set_series(&self, base: Currency, series: TimeSeriesRates) {
            self.state.lock().series.insert(base, series);
        }

        /// Make every call for `base` fail.
        pub fn fail_for(&self, base: Currency) {
            self.state.lock().failing.insert(base);
        }

        /// All calls received so far.
        pub fn calls(&self) -> Vec<ProviderCall> {
            self.state.lock().calls.clone()
        }

        /// Number of calls received so far.
        pub fn call_count(&self) -> usize {
            self.state.lock().calls.len()
        }

        fn check_failing(state: &MockState, base: &Currency) -> FxResult<()> {
            if state.failing.contains(base) {
                return Err(FxError::Provider(format!("mock failure for {base}")));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl RateProvider for MockRateProvider {
        fn name(&self) -> &str {
            "mock"
        }

        async fn fetch_latest(&self, base: &Currency, targets: &[Currency]) -> FxResult<RateSnapshot> {
            let mut state = self.state.lock();
            state.calls.push(ProviderCall::Latest {
                base: base.clone(),
                targets: targets.to_vec(),
            });
            Self::check_failing(&state, base)?;

            state
                .latest
                .get(base)
                .cloned()
                .ok_or_else(|| FxError::Provider(format!("no latest rates for {base}")))
        }

        async fn fetch_time_series(
            &self,
            start: NaiveDate,
            end: NaiveDate,
            base: &Currency,
            targets: &[Currency],
        ) -> FxResult<TimeSeriesRates> {
            let mut state = self.state.lock();
            state.calls.push(ProviderCall::TimeSeries {
                start,
                end,
                base: base.clone(),
                targets: targets.to_vec(),
            });
            Self::check_failing(&state, base)?;

            state
                .series
                .get(base)
                .cloned()
                .ok_or_else(|| FxError::Provider(format!("no time series for {base}")))
        }
    }
}
