//! Rate snapshots and the request/response shapes built from them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::Currency;

/// Target currency to rate, relative to some base currency.
pub type RateMap = BTreeMap<Currency, f64>;

/// One rate per calendar day for a single base/target pair.
pub type DailyRates = BTreeMap<NaiveDate, f64>;

/// Insert the base-to-itself identity rate.
pub fn with_identity(mut rates: RateMap, base: &Currency) -> RateMap {
    rates.insert(base.clone(), 1.0);
    rates
}

/// Latest rates for one base currency as fetched at `timestamp`.
///
/// This is also the serialized form of a cached latest entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateSnapshot {
    /// Target currency to rate.
    pub rates: RateMap,
    /// When the provider published these rates.
    pub timestamp: DateTime<Utc>,
}

impl RateSnapshot {
    /// Create a new snapshot.
    pub fn new(rates: RateMap, timestamp: DateTime<Utc>) -> Self {
        Self { rates, timestamp }
    }

    /// Look up the rate for a target currency.
    pub fn rate(&self, target: &Currency) -> Option<f64> {
        self.rates.get(target).copied()
    }

    /// Same snapshot with the identity rate for `base` injected.
    pub fn with_identity(self, base: &Currency) -> Self {
        Self {
            rates: with_identity(self.rates, base),
            timestamp: self.timestamp,
        }
    }
}

/// Date-range response from the upstream provider.
///
/// Dates are kept as the provider's raw strings; callers parse them and
/// decide what to do with malformed ones.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesRates {
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub base: String,
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    pub end_date: String,
    #[serde(default)]
    pub rates: BTreeMap<String, RateMap>,
}

/// Response body for the latest-rates endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatestRates {
    pub base: Currency,
    pub rates: RateMap,
    /// Unix seconds.
    pub timestamp: i64,
}

/// Response body for the historical-rates endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalRates {
    pub base: Currency,
    pub target: Currency,
    pub amount: f64,
    pub rates: DailyRates,
}

/// A conversion to perform. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionRequest {
    pub from: Currency,
    pub to: Currency,
    pub amount: f64,
    /// Convert at this day's rate instead of the latest one.
    pub date: Option<NaiveDate>,
}

impl ConversionRequest {
    /// Create a conversion at the latest rate.
    pub fn new(from: Currency, to: Currency, amount: f64) -> Self {
        Self {
            from,
            to,
            amount,
            date: None,
        }
    }

    /// Convert at a historical rate instead.
    pub fn on_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }
}

/// Outcome of a conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionResult {
    pub from: Currency,
    pub to: Currency,
    #[serde(rename = "amount")]
    pub original_amount: f64,
    pub converted_amount: f64,
    pub rate: f64,
    #[serde(rename = "onDate", skip_serializing_if = "Option::is_none", default)]
    pub date: Option<NaiveDate>,
}
