//! Error types surfaced by the rate service.

use crate::Currency;
use thiserror::Error;

/// Errors a caller of the rate service can observe.
///
/// Cache and lock failures never appear here; they are absorbed below the
/// service and only slow a request down.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExchangeError {
    /// Currency is not in the supported set.
    #[error("currency not supported: {0}")]
    UnsupportedCurrency(Currency),

    /// Date string is not `YYYY-MM-DD`.
    #[error("invalid date format, expected YYYY-MM-DD: {0}")]
    InvalidDate(String),

    /// Date is older than the allowed history window.
    #[error("requested date is older than {limit_days} days")]
    DateTooOld { limit_days: u32 },

    /// Date lies in the future.
    #[error("historical date can not be in future")]
    DateInFuture,

    /// Start date is after end date.
    #[error("startDate must not be after endDate")]
    InvertedDateRange,

    /// Conversion amount is zero or negative.
    #[error("amount must be a positive number")]
    InvalidAmount,

    /// Conversion between a currency and itself.
    #[error("from and to currencies cannot be the same for conversion")]
    SameCurrency,

    /// Malformed or missing request parameter.
    #[error("{0}")]
    InvalidRequest(String),

    /// The provider answered but did not include the requested rate.
    #[error("exchange rate not found for {base} -> {target}")]
    RateNotFound { base: Currency, target: Currency },

    /// Upstream provider failed.
    #[error("upstream rate provider error: {0}")]
    Upstream(String),
}

impl ExchangeError {
    /// Whether this error was caused by the request itself.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ExchangeError::UnsupportedCurrency(_)
                | ExchangeError::InvalidDate(_)
                | ExchangeError::DateTooOld { .. }
                | ExchangeError::DateInFuture
                | ExchangeError::InvertedDateRange
                | ExchangeError::InvalidAmount
                | ExchangeError::SameCurrency
                | ExchangeError::InvalidRequest(_)
        )
    }

    /// Stable machine-readable code.
    pub fn error_code(&self) -> &'static str {
        match self {
            ExchangeError::UnsupportedCurrency(_) => "UNSUPPORTED_CURRENCY",
            ExchangeError::InvalidDate(_) => "INVALID_DATE",
            ExchangeError::DateTooOld { .. } => "DATE_TOO_OLD",
            ExchangeError::DateInFuture => "DATE_IN_FUTURE",
            ExchangeError::InvertedDateRange => "INVERTED_DATE_RANGE",
            ExchangeError::InvalidAmount => "INVALID_AMOUNT",
            ExchangeError::SameCurrency => "SAME_CURRENCY",
            ExchangeError::InvalidRequest(_) => "INVALID_REQUEST",
            ExchangeError::RateNotFound { .. } => "RATE_NOT_FOUND",
            ExchangeError::Upstream(_) => "UPSTREAM_ERROR",
        }
    }
}

/// Result type alias for service operations.
pub type Result<T> = std::result::Result<T, ExchangeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors() {
        assert!(ExchangeError::InvalidAmount.is_client_error());
        assert!(ExchangeError::UnsupportedCurrency(Currency::new("FOO")).is_client_error());
        assert!(!ExchangeError::Upstream("boom".into()).is_client_error());
        assert!(!ExchangeError::RateNotFound {
            base: Currency::usd(),
            target: Currency::inr(),
        }
        .is_client_error());
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            ExchangeError::DateTooOld { limit_days: 90 }.to_string(),
            "requested date is older than 90 days"
        );
        assert_eq!(
            ExchangeError::UnsupportedCurrency(Currency::new("foo")).to_string(),
            "currency not supported: FOO"
        );
    }
}
