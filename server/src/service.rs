//! Rate service: request validation on top of the rate repository.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use exrates_common::error::Result;
use exrates_common::{
    parse_date, today, ConversionRequest, ConversionResult, Currency, ExchangeError,
    HistoricalRates, LatestRates,
};
use exrates_fx::RateRepository;
use tracing::{debug, instrument, warn};

/// Validates requests and derives single rates and conversions.
pub struct RateService {
    repo: Arc<dyn RateRepository>,
    history_days_limit: u32,
}

impl RateService {
    /// Create a new service.
    pub fn new(repo: Arc<dyn RateRepository>, history_days_limit: u32) -> Self {
        Self {
            repo,
            history_days_limit,
        }
    }

    /// Currencies the service accepts.
    pub fn supported_currencies(&self) -> Vec<Currency> {
        Currency::supported()
    }

    /// Reject currencies outside the supported set.
    pub fn validate_currency(&self, currency: &Currency) -> Result<()> {
        if !currency.is_supported() {
            return Err(ExchangeError::UnsupportedCurrency(currency.clone()));
        }
        Ok(())
    }

    /// Check a date lies within the allowed history window.
    pub fn validate_date(&self, date: NaiveDate) -> Result<NaiveDate> {
        let today = today();
        let oldest = today - Duration::days(i64::from(self.history_days_limit));

        if date < oldest {
            return Err(ExchangeError::DateTooOld {
                limit_days: self.history_days_limit,
            });
        }
        if date > today {
            return Err(ExchangeError::DateInFuture);
        }
        Ok(date)
    }

    /// Parse a `YYYY-MM-DD` date and check its window.
    pub fn parse_and_validate_date(&self, raw: &str) -> Result<NaiveDate> {
        self.validate_date(parse_date(raw)?)
    }

    /// Latest rate of one pair. Identity pairs never touch the repository.
    #[instrument(skip(self), fields(base = %base, target = %target))]
    pub async fn latest_rate(&self, base: &Currency, target: &Currency) -> Result<(f64, DateTime<Utc>)> {
        if base == target {
            return Ok((1.0, Utc::now()));
        }

        let snapshot = self.repo.latest_rates(base, target).await?;
        match snapshot.rate(target) {
            Some(rate) => Ok((rate, snapshot.timestamp)),
            None => {
                warn!("Rate not found in repository result");
                Err(ExchangeError::RateNotFound {
                    base: base.clone(),
                    target: target.clone(),
                })
            }
        }
    }

    /// Latest rate of `target` plus the base identity rate.
    pub async fn latest_rates(&self, base: &Currency, target: &Currency) -> Result<LatestRates> {
        self.validate_currency(base)?;
        self.validate_currency(target)?;

        let snapshot = self.repo.latest_rates(base, target).await?.with_identity(base);

        Ok(LatestRates {
            base: base.clone(),
            rates: snapshot.rates,
            timestamp: snapshot.timestamp.timestamp(),
        })
    }

    /// Rate of one pair on one day. Identity pairs never touch the repository.
    #[instrument(skip(self), fields(base = %base, target = %target, date = %date))]
    pub async fn historical_rate(&self, date: NaiveDate, base: &Currency, target: &Currency) -> Result<f64> {
        if base == target {
            return Ok(1.0);
        }

        let rates = self.repo.historical_rates(date, date, base, target).await?;
        rates.get(&date).copied().ok_or_else(|| {
            warn!("Historical rate not found in repository result");
            ExchangeError::RateNotFound {
                base: base.clone(),
                target: target.clone(),
            }
        })
    }

    /// Daily rates of `target` over `[start, end]`, both `YYYY-MM-DD`.
    pub async fn historical_rates(
        &self,
        start: &str,
        end: &str,
        base: &Currency,
        target: &Currency,
    ) -> Result<HistoricalRates> {
        self.validate_currency(base)?;
        self.validate_currency(target)?;

        let start = self.parse_and_validate_date(start)?;
        let end = self.parse_and_validate_date(end)?;
        if start > end {
            return Err(ExchangeError::InvertedDateRange);
        }

        let rates = self.repo.historical_rates(start, end, base, target).await?;
        debug!(days = rates.len(), "Historical rates resolved");

        Ok(HistoricalRates {
            base: base.clone(),
            target: target.clone(),
            amount: 1.0,
            rates,
        })
    }

    /// Convert an amount at the latest rate, or at a historical one when the
    /// request carries a date.
    #[instrument(skip(self, request), fields(from = %request.from, to = %request.to))]
    pub async fn convert(&self, request: ConversionRequest) -> Result<ConversionResult> {
        if !request.amount.is_finite() || request.amount <= 0.0 {
            return Err(ExchangeError::InvalidAmount);
        }
        self.validate_currency(&request.from)?;
        self.validate_currency(&request.to)?;
        if request.from == request.to {
            return Err(ExchangeError::SameCurrency);
        }

        let rate = match request.date {
            Some(date) => {
                self.validate_date(date)?;
                self.historical_rate(date, &request.from, &request.to).await?
            }
            None => self.latest_rate(&request.from, &request.to).await?.0,
        };

        Ok(ConversionResult {
            converted_amount: request.amount * rate,
            rate,
            original_amount: request.amount,
            date: request.date,
            from: request.from,
            to: request.to,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestApp;
    use exrates_common::{format_date, RateMap, TimeSeriesRates};
    use std::collections::BTreeMap;

    fn inr_rates() -> RateMap {
        let mut rates = RateMap::new();
        rates.insert(Currency::inr(), 82.5);
        rates.insert(Currency::eur(), 0.9);
        rates
    }

    fn series_for(day: NaiveDate, rate: f64) -> TimeSeriesRates {
        let mut day_rates = RateMap::new();
        day_rates.insert(Currency::inr(), rate);
        let mut rates = BTreeMap::new();
        rates.insert(format_date(day), day_rates);
        TimeSeriesRates {
            amount: 1.0,
            base: "USD".into(),
            rates,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_identity_rate_needs_no_upstream() {
        let app = TestApp::new();

        for currency in Currency::supported() {
            let before = Utc::now();
            let (rate, ts) = app.service.latest_rate(&currency, &currency).await.unwrap();
            assert_eq!(rate, 1.0);
            assert!(ts >= before);
            assert_eq!(app.service.historical_rate(today(), &currency, &currency).await.unwrap(), 1.0);
        }
        assert_eq!(app.provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_latest_rate_not_found() {
        let app = TestApp::new();
        let mut rates = RateMap::new();
        rates.insert(Currency::eur(), 0.9);
        app.provider.set_latest(Currency::usd(), rates);

        let result = app.service.latest_rate(&Currency::usd(), &Currency::inr()).await;

        assert!(matches!(result, Err(ExchangeError::RateNotFound { .. })));
    }

    #[tokio::test]
    async fn test_latest_rates() {
        let app = TestApp::new();
        app.provider.set_latest(Currency::usd(), inr_rates());

        let latest = app.service.latest_rates(&Currency::usd(), &Currency::inr()).await.unwrap();

        assert_eq!(latest.base, Currency::usd());
        assert_eq!(latest.rates.len(), 2);
        assert_eq!(latest.rates[&Currency::inr()], 82.5);
        assert_eq!(latest.rates[&Currency::usd()], 1.0);
    }

    #[tokio::test]
    async fn test_latest_rates_rejects_unsupported() {
        let app = TestApp::new();

        let result = app.service.latest_rates(&Currency::new("XYZ"), &Currency::inr()).await;

        assert_eq!(result, Err(ExchangeError::UnsupportedCurrency(Currency::new("XYZ"))));
        assert_eq!(app.provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_upstream_error_surfaces() {
        let app = TestApp::new();
        app.provider.fail_for(Currency::usd());

        let result = app.service.latest_rates(&Currency::usd(), &Currency::inr()).await;

        assert!(matches!(result, Err(ExchangeError::Upstream(_))));
    }

    #[tokio::test]
    async fn test_date_window() {
        let app = TestApp::new();
        let service = &app.service;

        assert!(service.validate_date(today()).is_ok());
        assert!(service.validate_date(today() - Duration::days(90)).is_ok());
        assert_eq!(
            service.validate_date(today() - Duration::days(91)),
            Err(ExchangeError::DateTooOld { limit_days: 90 })
        );
        assert_eq!(
            service.validate_date(today() + Duration::days(1)),
            Err(ExchangeError::DateInFuture)
        );
        assert!(matches!(
            service.parse_and_validate_date("2024/01/01"),
            Err(ExchangeError::InvalidDate(_))
        ));
    }

    #[tokio::test]
    async fn test_historical_rates() {
        let app = TestApp::new();
        let day = today() - Duration::days(3);
        app.provider.set_series(Currency::usd(), series_for(day, 83.1));

        let historical = tokio_test::assert_ok!(
            app.service
                .historical_rates(&format_date(day), &format_date(day), &Currency::usd(), &Currency::inr())
                .await
        );

        assert_eq!(historical.amount, 1.0);
        assert_eq!(historical.target, Currency::inr());
        assert_eq!(historical.rates[&day], 83.1);
    }

    #[tokio::test]
    async fn test_historical_rates_inverted_range() {
        let app = TestApp::new();
        let start = format_date(today() - Duration::days(1));
        let end = format_date(today() - Duration::days(2));

        let result = app
            .service
            .historical_rates(&start, &end, &Currency::usd(), &Currency::inr())
            .await;

        assert_eq!(result, Err(ExchangeError::InvertedDateRange));
    }

    #[tokio::test]
    async fn test_convert_latest() {
        let app = TestApp::new();
        app.provider.set_latest(Currency::usd(), inr_rates());

        let request = ConversionRequest::new(Currency::usd(), Currency::inr(), 100.0);
        let result = app.service.convert(request).await.unwrap();

        assert_eq!(result.rate, 82.5);
        assert_eq!(result.converted_amount, 8250.0);
        assert_eq!(result.original_amount, 100.0);
        assert!(result.date.is_none());
    }

    #[tokio::test]
    async fn test_convert_on_date() {
        let app = TestApp::new();
        let day = today() - Duration::days(5);
        app.provider.set_series(Currency::usd(), series_for(day, 80.0));

        let request = ConversionRequest::new(Currency::usd(), Currency::inr(), 100.0).on_date(day);
        let result = app.service.convert(request).await.unwrap();

        assert_eq!(result.converted_amount, 8000.0);
        assert_eq!(result.date, Some(day));
    }

    #[tokio::test]
    async fn test_convert_validation() {
        let app = TestApp::new();

        let same = ConversionRequest::new(Currency::usd(), Currency::usd(), 10.0);
        assert_eq!(app.service.convert(same).await, Err(ExchangeError::SameCurrency));

        let negative = ConversionRequest::new(Currency::usd(), Currency::inr(), -1.0);
        assert_eq!(app.service.convert(negative).await, Err(ExchangeError::InvalidAmount));

        let too_old = ConversionRequest::new(Currency::usd(), Currency::inr(), 1.0)
            .on_date(today() - Duration::days(400));
        assert!(matches!(
            app.service.convert(too_old).await,
            Err(ExchangeError::DateTooOld { .. })
        ));

        assert_eq!(app.provider.call_count(), 0);
    }
}
