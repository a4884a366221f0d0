//! Exrates Common Types
//!
//! This crate contains the value types shared across the exrates service,
//! including currencies, rate snapshots, request/response shapes and the
//! service-facing error taxonomy.

pub mod currency;
pub mod rates;
pub mod error;
pub mod time;

pub use currency::*;
pub use rates::*;
pub use error::ExchangeError;
pub use time::*;
