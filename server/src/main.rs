//! Exrates Server Binary
//!
//! Serves exchange rates over HTTP and keeps the shared rate cache warm.

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use exrates_fx::{
    CachedRateRepository, HttpRateProvider, KeyValueStore, MemoryStore, RateCache, RateProvider,
    RateRefresher, RedisStore, StoreRateCache, WriteBehind, DEFAULT_EVICTION_INTERVAL,
};
use exrates_server::{router, AppState, CacheBackend, RateService, ServiceConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServiceConfig::from_env();

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting exchange rate service");

    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return Err(anyhow::anyhow!("Configuration error: {}", e));
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let store: Arc<dyn KeyValueStore> = match config.cache_backend {
        CacheBackend::Redis => Arc::new(
            RedisStore::connect(&config.redis_url)
                .await
                .context("failed to connect to Redis")?,
        ),
        CacheBackend::Memory => {
            info!("Using in-process cache; locks only coordinate this instance");
            let memory = Arc::new(MemoryStore::new());
            let sweeper = memory.clone();
            let sweep_shutdown = shutdown_rx.clone();
            tokio::spawn(async move {
                sweeper
                    .run_eviction_loop(DEFAULT_EVICTION_INTERVAL, sweep_shutdown)
                    .await
            });
            memory
        }
    };

    let cache: Arc<dyn RateCache> = Arc::new(StoreRateCache::with_config(
        store.clone(),
        config.cache.clone(),
    ));
    let provider: Arc<dyn RateProvider> = Arc::new(
        HttpRateProvider::new(config.provider.clone()).context("failed to build rate provider")?,
    );

    let (writer, writer_handle) = WriteBehind::spawn(cache.clone());
    let repository = Arc::new(CachedRateRepository::new(provider.clone(), cache.clone(), writer));
    let service = Arc::new(RateService::new(repository, config.history_days_limit));

    // Background refresh
    let refresher = RateRefresher::new(provider, cache, store.clone(), config.refresher.clone());
    let refresher_handle = tokio::spawn(async move { refresher.run(shutdown_rx).await });

    let app = router(AppState::new(service, store));
    let listener = tokio::net::TcpListener::bind(config.bind_addr())
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr()))?;

    info!(listen_addr = %config.bind_addr(), "Server running");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Shutting down background tasks");
    let _ = shutdown_tx.send(true);
    if let Err(e) = refresher_handle.await {
        error!(error = %e, "Refresher task failed");
    }

    // The router held the last repository, so the writer drains and exits.
    if let Err(e) = writer_handle.await {
        error!(error = %e, "Cache writer task failed");
    }

    info!("Server exited gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
