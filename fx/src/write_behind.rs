//! Fire-and-forget cache writes.
//!
//! Request handlers hand cache writes to a background worker so that the
//! response never waits on the shared store. A job survives the request that
//! submitted it; its outcome is only logged.

use std::sync::Arc;

use chrono::NaiveDate;
use exrates_common::{Currency, RateMap, RateSnapshot};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::RateCache;

/// A pending cache write.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheWrite {
    Latest {
        base: Currency,
        snapshot: RateSnapshot,
    },
    Historical {
        date: NaiveDate,
        base: Currency,
        rates: RateMap,
    },
}

impl CacheWrite {
    fn describe(&self) -> String {
        match self {
            CacheWrite::Latest { base, .. } => format!("latest:{base}"),
            CacheWrite::Historical { date, base, .. } => format!("historical:{date}:{base}"),
        }
    }
}

/// Handle for submitting cache writes to the background worker.
///
/// Cloning is cheap; the worker stops once every handle is dropped and the
/// queue has drained.
#[derive(Clone)]
pub struct WriteBehind {
    tx: mpsc::UnboundedSender<CacheWrite>,
}

impl WriteBehind {
    /// Spawn the worker on the current runtime.
    pub fn spawn(cache: Arc<dyn RateCache>) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(Self::worker(cache, rx));
        (Self { tx }, handle)
    }

    /// Queue a write. Never blocks and never fails the caller.
    pub fn submit(&self, write: CacheWrite) {
        if let Err(mpsc::error::SendError(write)) = self.tx.send(write) {
            warn!(entry = %write.describe(), "Cache writer stopped, dropping write");
        }
    }

    async fn worker(cache: Arc<dyn RateCache>, mut rx: mpsc::UnboundedReceiver<CacheWrite>) {
        debug!("Cache write worker started");

        while let Some(write) = rx.recv().await {
            let entry = write.describe();
            let result = match &write {
                CacheWrite::Latest { base, snapshot } => cache.set_latest_rates(base, snapshot).await,
                CacheWrite::Historical { date, base, rates } => {
                    cache.set_historical_rates(*date, base, rates).await
                }
            };

            match result {
                Ok(()) => debug!(entry = %entry, "Background cache write completed"),
                Err(e) => warn!(entry = %entry, error = %e, "Background cache write failed"),
            }
        }

        info!("Cache write worker stopped");
    }
}
