//! Shared application state.

use std::sync::Arc;

use exrates_fx::KeyValueStore;

use crate::service::RateService;

/// State handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<RateService>,
    /// Store pinged by the health check.
    pub store: Arc<dyn KeyValueStore>,
}

impl AppState {
    pub fn new(service: Arc<RateService>, store: Arc<dyn KeyValueStore>) -> Self {
        Self { service, store }
    }
}
