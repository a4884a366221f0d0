//! Error types for the rate engine.

use std::time::Duration;

use exrates_common::ExchangeError;
use thiserror::Error;

/// Errors from the upstream provider and the repository built on it.
#[derive(Debug, Error)]
pub enum FxError {
    /// Request could not be sent or the connection failed.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Provider answered with a non-success status.
    #[error("Rate provider returned HTTP {status}: {body}")]
    UpstreamStatus { status: u16, body: String },

    /// Provider body could not be decoded.
    #[error("Invalid provider response: {0}")]
    Decode(String),

    /// Every retry attempt failed at the transport level.
    #[error("Rate provider unreachable after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    /// Provider-specific failure.
    #[error("Rate provider error: {0}")]
    Provider(String),
}

/// Result type for FX operations.
pub type FxResult<T> = Result<T, FxError>;

impl From<FxError> for ExchangeError {
    fn from(e: FxError) -> Self {
        ExchangeError::Upstream(e.to_string())
    }
}

/// Errors from the shared key-value store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from the distributed lock.
#[derive(Debug, Error)]
pub enum LockError {
    /// Lock was held by someone else for the whole wait.
    #[error("Timed out after {waited:?} acquiring lock {key}")]
    Timeout { key: String, waited: Duration },

    #[error("Releasing lock {key} did not finish within {after:?}")]
    ReleaseTimeout { key: String, after: Duration },

    #[error("Lock store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type for lock operations.
pub type LockResult<T> = Result<T, LockError>;

/// Errors from cache writes. Callers log these; they never reach a client.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache write lock unavailable: {0}")]
    Lock(#[from] LockError),

    #[error("Cache store error: {0}")]
    Store(#[from] StoreError),

    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Cache operation on {key} timed out after {after:?}")]
    Timeout { key: String, after: Duration },
}

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;
