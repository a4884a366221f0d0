//! In-memory wiring for tests.

use std::sync::Arc;

use exrates_fx::{
    CachedRateRepository, MemoryStore, MockRateProvider, RateCache, StoreRateCache, WriteBehind,
};

use crate::service::RateService;
use crate::state::AppState;

pub(crate) struct TestApp {
    pub provider: Arc<MockRateProvider>,
    pub store: Arc<MemoryStore>,
    pub service: Arc<RateService>,
}

impl TestApp {
    /// Full stack over a mock provider and an in-process store. Needs a
    /// running tokio runtime for the cache writer.
    pub fn new() -> Self {
        let provider = Arc::new(MockRateProvider::new());
        let store = Arc::new(MemoryStore::new());
        let cache: Arc<dyn RateCache> = Arc::new(StoreRateCache::new(store.clone()));
        let (writer, _worker) = WriteBehind::spawn(cache.clone());
        let repo = Arc::new(CachedRateRepository::new(provider.clone(), cache, writer));
        let service = Arc::new(RateService::new(repo, 90));

        Self {
            provider,
            store,
            service,
        }
    }

    pub fn state(&self) -> AppState {
        AppState::new(self.service.clone(), self.store.clone())
    }
}
