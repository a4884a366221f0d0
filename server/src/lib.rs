//! Exrates Server
//!
//! HTTP front end of the exchange rate service: configuration, the rate
//! service validating requests, and the axum router exposing it.

pub mod config;
pub mod error;
pub mod routes;
pub mod service;
pub mod state;

#[cfg(test)]
mod testing;

pub use config::{CacheBackend, ServiceConfig};
pub use error::ApiError;
pub use routes::router;
pub use service::RateService;
pub use state::AppState;
