//! Currency codes and the supported currency set.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Currency codes the service quotes and caches.
pub const SUPPORTED_CURRENCIES: [&str; 5] = ["USD", "INR", "EUR", "JPY", "GBP"];

/// ISO 4217 currency code.
///
/// Any code can be represented; whether the service handles it is decided by
/// [`Currency::is_supported`]. Codes are normalized on construction, including
/// when deserialized.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Currency(String);

impl From<String> for Currency {
    fn from(code: String) -> Self {
        Currency::new(code)
    }
}

impl From<Currency> for String {
    fn from(currency: Currency) -> Self {
        currency.0
    }
}

impl Currency {
    /// Create a new currency from code.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into().trim().to_uppercase())
    }

    /// Get the currency code.
    pub fn code(&self) -> &str {
        &self.0
    }

    /// Whether the code belongs to the supported set.
    pub fn is_supported(&self) -> bool {
        SUPPORTED_CURRENCIES.contains(&self.0.as_str())
    }

    /// All supported currencies, in declaration order.
    pub fn supported() -> Vec<Currency> {
        SUPPORTED_CURRENCIES.iter().map(|c| Currency::new(*c)).collect()
    }

    /// Every supported currency except `self`.
    ///
    /// Upstream fetches always fan out to this set so one call fills the
    /// cache for every target of a base.
    pub fn counterparts(&self) -> Vec<Currency> {
        Self::supported().into_iter().filter(|c| c != self).collect()
    }

    pub fn usd() -> Self {
        Self::new("USD")
    }

    pub fn inr() -> Self {
        Self::new("INR")
    }

    pub fn eur() -> Self {
        Self::new("EUR")
    }

    pub fn gbp() -> Self {
        Self::new("GBP")
    }

    pub fn jpy() -> Self {
        Self::new("JPY")
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Currency {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
