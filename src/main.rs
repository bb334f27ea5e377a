//! Resilient Cache - inspection server
//!
//! Runs one cache context backed by a file store and exposes it over HTTP.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use resilient_cache::api::{create_router, AppState};
use resilient_cache::cache::CacheService;
use resilient_cache::network::ConnectivityMonitor;
use resilient_cache::storage::FileBackend;
use resilient_cache::{spawn_connectivity_probe, Config};

/// Main entry point for the cache inspection server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Open the file-backed durable store
/// 4. Build the cache service (starts periodic cleanup)
/// 5. Start the connectivity probe when configured
/// 6. Serve the HTTP API until SIGINT/SIGTERM, then destroy the cache
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "resilient_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Resilient Cache");

    let config = Config::from_env();
    info!(
        "Configuration loaded: max_memory_entries={}, default_ttl={:?}, priority_ttl={:?}, version={}, port={}",
        config.cache.max_memory_entries,
        config.cache.default_ttl,
        config.cache.priority_ttl,
        config.cache.version,
        config.server_port
    );

    let backend = FileBackend::open(&config.storage_dir, config.storage_quota_bytes)
        .with_context(|| format!("opening storage at {}", config.storage_dir.display()))?;

    let network = Arc::new(ConnectivityMonitor::default());
    let cache = Arc::new(
        CacheService::builder(config.cache.clone())
            .backend(Arc::new(backend))
            .network(network.clone())
            .build(),
    );

    let probe_handle = config.probe_addr.clone().map(|addr| {
        spawn_connectivity_probe(network.clone(), addr, config.probe_interval)
    });

    let app = create_router(AppState::new(cache.clone(), network));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    if let Some(handle) = probe_handle {
        handle.abort();
        warn!("Connectivity probe aborted");
    }
    cache.destroy().await;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
