//! FerroCache - in-memory key-value cache server
//!
//! Serves the line protocol over TCP, expires keys in the background and
//! persists snapshots to disk.

// Use jemalloc for better multi-threaded performance
#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use ferrocache::config::{Config, StorageConfig};
use ferrocache::health::HealthServer;
use ferrocache::metrics::Metrics;
use ferrocache::server::Server;
use ferrocache::storage::{CacheEngine, ExpirySweeper, SweeperConfig};
use std::sync::Arc;
use tokio::runtime::Builder;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting FerroCache {}", ferrocache::VERSION);

    // Load configuration
    let config = if let Some(config_path) = std::env::args().nth(1) {
        info!("Loading configuration from {}", config_path);
        Config::from_file(&config_path)?
    } else {
        info!("Using default configuration (set FERROCACHE_* env vars to customize)");
        Config::from_env()
    };

    info!("Configuration: {:?}", config);

    // Build tokio runtime with configured worker threads
    let mut runtime_builder = Builder::new_multi_thread();
    if config.server.worker_threads > 0 {
        runtime_builder.worker_threads(config.server.worker_threads);
        info!("Using {} worker threads", config.server.worker_threads);
    } else {
        info!("Using default worker threads (auto-detected)");
    }
    let runtime = runtime_builder.enable_all().build()?;

    runtime.block_on(async_main(config))
}

async fn async_main(config: Config) -> anyhow::Result<()> {
    // Create cancellation token for graceful shutdown
    let cancel_token = CancellationToken::new();

    // Restore the last snapshot before accepting any connection
    let engine = Arc::new(CacheEngine::with_max_keys(config.storage.max_keys()));
    if let Some(max_keys) = config.storage.max_keys() {
        info!("Holding at most {} keys, evicting least recently used", max_keys);
    }
    let snapshot_path = &config.storage.snapshot_path;
    match engine.load(snapshot_path) {
        Ok(Some(keys)) => info!("Restored {} keys from {}", keys, snapshot_path.display()),
        Ok(None) => info!("No snapshot at {}, starting empty", snapshot_path.display()),
        Err(e) => {
            return Err(anyhow::anyhow!(
                "Failed to load snapshot {}: {e}",
                snapshot_path.display()
            ));
        }
    }

    // Initialize metrics
    let metrics = Arc::new(Metrics::new());

    // Start health server in separate thread if enabled
    let health_server = if config.metrics.enabled {
        let health = Arc::new(HealthServer::new(
            Arc::clone(&metrics),
            Arc::clone(&engine),
        ));
        let health_clone = Arc::clone(&health);
        let metrics_config = config.metrics.clone();

        std::thread::Builder::new()
            .name("health".to_string())
            .spawn(move || {
                if let Err(e) = health_clone.run(&metrics_config) {
                    error!("Health server error: {}", e);
                }
            })?;

        Some(health)
    } else {
        None
    };

    // Background expiry
    let sweeper = ExpirySweeper::new(
        Arc::clone(&engine),
        SweeperConfig::with_fallback(config.storage.sweep_fallback()),
    )
    .spawn(cancel_token.clone());

    // Periodic snapshots
    let saver = spawn_periodic_save(&config.storage, Arc::clone(&engine), cancel_token.clone());

    // Create and start main server
    let server = Arc::new(Server::new(
        config.server.clone(),
        config.storage.snapshot_path.clone(),
        Arc::clone(&engine),
        Arc::clone(&metrics),
        cancel_token.clone(),
    ));

    // Mark as ready after initialization
    if let Some(ref health) = health_server {
        health.set_ready(true);
        info!("Server is ready");
    }

    // Setup signal handlers
    let cancel_for_signal = cancel_token.clone();
    let health_for_signal = health_server.clone();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        cancel_for_signal.cancel();
        if let Some(health) = health_for_signal {
            health.set_ready(false);
            health.stop();
        }
    });

    // Run the main server
    if let Err(e) = server.run().await {
        error!("Server error: {}", e);
        cancel_token.cancel();
    }

    if let Err(e) = sweeper.await {
        warn!("Sweeper task failed: {}", e);
    }
    if let Some(saver) = saver
        && let Err(e) = saver.await
    {
        warn!("Periodic save task failed: {}", e);
    }

    if config.storage.save_on_shutdown {
        match engine.save(snapshot_path) {
            Ok(keys) => info!("Saved {} keys on shutdown", keys),
            Err(e) => error!("Failed to save snapshot on shutdown: {}", e),
        }
    }

    info!("FerroCache stopped");
    Ok(())
}

/// Save a snapshot every `save_interval_secs` until cancelled
fn spawn_periodic_save(
    config: &StorageConfig,
    engine: Arc<CacheEngine>,
    cancel: CancellationToken,
) -> Option<JoinHandle<()>> {
    let period = config.save_interval()?;
    let path = config.snapshot_path.clone();
    info!("Saving a snapshot every {:?}", period);

    Some(tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        // The first tick completes immediately
        interval.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    let engine = Arc::clone(&engine);
                    let path = path.clone();
                    match tokio::task::spawn_blocking(move || engine.save(&path)).await {
                        Ok(Ok(_)) => {}
                        Ok(Err(e)) => error!("Periodic save failed: {}", e),
                        Err(e) => error!("Periodic save task panicked: {}", e),
                    }
                }
            }
        }
    }))
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("Received SIGINT, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
                info!("Received SIGINT, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("Received SIGINT, shutting down...");
    }
}
