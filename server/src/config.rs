//! Server configuration.

use std::str::FromStr;
use std::time::Duration;

use exrates_fx::{ProviderConfig, RateCacheConfig, RefresherConfig};

/// Which store backs the cache and the locks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackend {
    /// Shared Redis instance; required when running more than one instance.
    Redis,
    /// In-process store.
    Memory,
}

impl FromStr for CacheBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(CacheBackend::Redis),
            "memory" => Ok(CacheBackend::Memory),
            other => Err(format!("unknown cache backend: {other}")),
        }
    }
}

/// Main server configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Listen address.
    pub listen_addr: String,
    /// Listen port.
    pub listen_port: u16,
    /// Upstream rate API.
    pub provider: ProviderConfig,
    /// Rate cache.
    pub cache: RateCacheConfig,
    /// Background refresher.
    pub refresher: RefresherConfig,
    /// Oldest historical date accepted, in days before today.
    pub history_days_limit: u32,
    /// Store backend.
    pub cache_backend: CacheBackend,
    /// Redis connection URL.
    pub redis_url: String,
    /// Log level.
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0".to_string(),
            listen_port: 8080,
            provider: ProviderConfig::default(),
            cache: RateCacheConfig::default(),
            refresher: RefresherConfig::default(),
            history_days_limit: 90,
            cache_backend: CacheBackend::Redis,
            redis_url: "redis://127.0.0.1:6379/0".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl ServiceConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from any key lookup. Unset or unparsable values keep
    /// their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let parsed = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

        if let Some(addr) = lookup("SERVER_ADDR") {
            config.listen_addr = addr;
        }

        if let Some(port) = lookup("SERVER_PORT").and_then(|p| p.trim().parse().ok()) {
            config.listen_port = port;
        }

        if let Some(url) = lookup("EXTERNAL_API_URL") {
            config.provider.base_url = url;
        }

        if let Some(format) = lookup("DATE_FORMAT") {
            config.provider.date_format = format;
        }

        if let Some(secs) = parsed("UPSTREAM_TIMEOUT_SECS") {
            config.provider.timeout = Duration::from_secs(secs);
        }

        if let Some(retries) = lookup("UPSTREAM_MAX_RETRIES").and_then(|v| v.trim().parse().ok()) {
            config.provider.max_retries = retries;
        }

        if let Some(secs) = parsed("LATEST_RATE_CACHE_TTL_SECS") {
            config.cache.latest_ttl = Duration::from_secs(secs);
        }

        if let Some(secs) = parsed("HISTORICAL_CACHE_TTL_SECS") {
            config.cache.historical_ttl = Duration::from_secs(secs);
        }

        if let Some(secs) = parsed("REFRESH_INTERVAL_SECS") {
            config.refresher.interval = Duration::from_secs(secs);
        }

        if let Some(days) = lookup("HISTORY_DAYS_LIMIT").and_then(|v| v.trim().parse().ok()) {
            config.history_days_limit = days;
        }

        if let Some(backend) = lookup("CACHE_BACKEND").and_then(|v| v.parse().ok()) {
            config.cache_backend = backend;
        }

        if let Some(url) = lookup("REDIS_URL") {
            config.redis_url = url;
        } else if let Some(addr) = lookup("REDIS_ADDR") {
            let db = lookup("REDIS_DB")
                .and_then(|v| v.trim().parse::<u32>().ok())
                .unwrap_or(0);
            config.redis_url = match lookup("REDIS_PASSWORD").filter(|p| !p.is_empty()) {
                Some(password) => format!("redis://:{password}@{addr}/{db}"),
                None => format!("redis://{addr}/{db}"),
            };
        }

        if let Some(level) = lookup("LOG_LEVEL") {
            config.log_level = level;
        }

        config
    }

    /// `addr:port` to bind.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.listen_addr, self.listen_port)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.listen_port == 0 {
            return Err("Listen port cannot be 0".to_string());
        }

        if self.provider.base_url.trim().is_empty() {
            return Err("External API URL cannot be empty".to_string());
        }

        if self.cache.latest_ttl.is_zero() || self.cache.historical_ttl.is_zero() {
            return Err("Cache TTLs must be positive".to_string());
        }

        if self.refresher.interval.is_zero() {
            return Err("Refresh interval must be positive".to_string());
        }

        if self.history_days_limit == 0 {
            return Err("History days limit must be positive".to_string());
        }

        if self.cache_backend == CacheBackend::Redis && self.redis_url.is_empty() {
            return Err("Redis URL cannot be empty".to_string());
        }

        Ok(())
    }
}
