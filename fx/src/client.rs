//! HTTP client for a Frankfurter-compatible rate API.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use exrates_common::{start_of_day, Currency, RateMap, RateSnapshot, TimeSeriesRates, DATE_FORMAT};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{FxError, FxResult};
use crate::provider::RateProvider;

/// Connection settings for the upstream API.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Root URL, e.g. `https://api.frankfurter.app/`.
    pub base_url: String,
    /// chrono format used for dates in range URLs.
    pub date_format: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Attempts made before giving up on transport errors.
    pub max_retries: u32,
    /// Delay before the second attempt; doubles on each further attempt.
    pub retry_base_delay: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.frankfurter.app/".to_string(),
            date_format: DATE_FORMAT.to_string(),
            timeout: Duration::from_secs(30),
            max_retries: 5,
            retry_base_delay: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Deserialize)]
struct LatestResponse {
    date: NaiveDate,
    #[serde(default)]
    rates: RateMap,
}

/// [`RateProvider`] talking to the upstream HTTP API.
#[derive(Debug, Clone)]
pub struct HttpRateProvider {
    client: reqwest::Client,
    config: ProviderConfig,
}

impl HttpRateProvider {
    /// Build the client.
    pub fn new(mut config: ProviderConfig) -> FxResult<Self> {
        if !config.base_url.ends_with('/') {
            config.base_url.push('/');
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| FxError::Transport(format_reqwest_error(&e)))?;

        Ok(Self { client, config })
    }

    fn params(base: &Currency, targets: &[Currency]) -> Vec<(&'static str, String)> {
        let mut params = vec![("from", base.code().to_string())];
        let symbols: Vec<&str> = targets.iter().map(Currency::code).filter(|c| !c.is_empty()).collect();
        if !symbols.is_empty() {
            params.push(("to", symbols.join(",")));
        }
        params
    }

    /// GET `url` and decode the JSON body, retrying transport failures.
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&'static str, String)],
    ) -> FxResult<T> {
        let attempts = self.config.max_retries.max(1);
        let mut last_error = String::new();

        for attempt in 0..attempts {
            match self.client.get(url).query(params).send().await {
                Ok(response) => {
                    let status = response.status();
                    if !status.is_success() {
                        let body = response.text().await.unwrap_or_default();
                        warn!(url = %url, status = status.as_u16(), "Rate provider returned error status");
                        return Err(FxError::UpstreamStatus {
                            status: status.as_u16(),
                            body,
                        });
                    }
                    return response
                        .json::<T>()
                        .await
                        .map_err(|e| FxError::Decode(format_reqwest_error(&e)));
                }
                Err(e) => {
                    last_error = format_reqwest_error(&e);
                    warn!(
                        url = %url,
                        attempt = attempt + 1,
                        max_attempts = attempts,
                        error = %last_error,
                        "Rate provider request failed"
                    );
                    if attempt + 1 < attempts {
                        let delay = self.config.retry_base_delay.saturating_mul(1u32 << attempt.min(16));
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Err(FxError::RetriesExhausted {
            attempts,
            last_error,
        })
    }
}

#[async_trait]
impl RateProvider for HttpRateProvider {
    fn name(&self) -> &str {
        "frankfurter"
    }

    async fn fetch_latest(&self, base: &Currency, targets: &[Currency]) -> FxResult<RateSnapshot> {
        debug!(base = %base, targets = ?targets, "Fetching latest rates from provider");
        let url = format!("{}latest", self.config.base_url);
        let response: LatestResponse = self.get_json(&url, &Self::params(base, targets)).await?;

        info!(base = %base, date = %response.date, count = response.rates.len(), "Fetched latest rates");
        Ok(RateSnapshot::new(response.rates, start_of_day(response.date)))
    }

    async fn fetch_time_series(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        base: &Currency,
        targets: &[Currency],
    ) -> FxResult<TimeSeriesRates> {
        debug!(base = %base, start = %start, end = %end, "Fetching time series from provider");
        let url = format!(
            "{}{}..{}",
            self.config.base_url,
            start.format(&self.config.date_format),
            end.format(&self.config.date_format)
        );
        let series: TimeSeriesRates = self.get_json(&url, &Self::params(base, targets)).await?;

        info!(base = %base, days = series.rates.len(), "Fetched time series");
        Ok(series)
    }
}

/// Flatten a reqwest error and its sources into one line.
pub fn format_reqwest_error(e: &reqwest::Error) -> String {
    let mut message = e.to_string();
    let mut source = std::error::Error::source(e);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
