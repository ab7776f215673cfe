use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use svgmoji_core::{
    load_config, validate_config, AdmissionQueue, HeadlessRenderer, Orchestrator, RenderBackend,
    WorkerPool,
};

use svgmoji_server::api::create_router;
use svgmoji_server::cleanup::CleanupTask;
use svgmoji_server::state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Seconds between idle-worker eviction sweeps
const EVICTION_SWEEP_SECS: u64 = 30;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("SVGMOJI_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("svgmoji {} starting", VERSION);
    info!(
        "Queue: {} concurrent, {} waiting; pool: {}-{} workers",
        config.queue.max_concurrent,
        config.queue.max_queue_size,
        config.pool.min_workers,
        config.pool.max_workers
    );

    // Create the renderer backend and worker pool
    let backend: Arc<dyn RenderBackend> = Arc::new(HeadlessRenderer::new(config.pool.clone()));
    let pool = WorkerPool::new(config.pool.clone(), backend);
    info!("Worker pool initialized");

    // Create the admission queue
    let queue = AdmissionQueue::new(config.queue.clone());
    info!("Admission queue initialized");

    // Create the conversion orchestrator
    let orchestrator = Orchestrator::new(Arc::clone(&queue), Arc::clone(&pool), config.encoder.clone());
    info!("Orchestrator initialized");

    // Pre-launch the configured minimum of workers
    if config.pool.min_workers > 0 {
        match pool.warm().await {
            Ok(()) => info!("Warmed {} renderer workers", config.pool.min_workers),
            Err(e) => warn!("Pool warm-up failed, workers will launch on demand: {}", e),
        }
    }

    // Spawn the idle-worker eviction loop
    let eviction_pool = Arc::clone(&pool);
    let eviction_handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(EVICTION_SWEEP_SECS));
        ticker.tick().await;
        loop {
            ticker.tick().await;
            eviction_pool.evict_idle().await;
        }
    });

    // Spawn the expired-artifact cleanup task
    let cleanup_dirs = vec![
        config.encoder.output_dir.clone(),
        config.encoder.temp_dir.clone(),
    ];
    let cleanup_handle = CleanupTask::new(config.cleanup.clone(), cleanup_dirs).spawn();
    info!("Cleanup task started");

    // Create app state and router
    let state = Arc::new(AppState::new(
        config.clone(),
        Arc::clone(&queue),
        Arc::clone(&pool),
        orchestrator,
    ));
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // HTTP has drained; stop background tasks, then turn away new work
    // and tear down the workers.
    info!("Server shutting down...");
    cleanup_handle.stop().await;
    eviction_handle.abort();
    queue.shutdown();
    pool.drain().await;
    info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
