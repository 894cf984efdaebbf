//! FileFlow server: asynchronous upload processing.
//!
//! Main entry point that wires the job store, event notifier, worker pool,
//! stale-job sweeper and HTTP API together.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, fmt};

use fileflow_broker::BrokerManager;
use fileflow_core::config::{AppConfig, LogFormat};
use fileflow_core::error::{AppError, ErrorKind};
use fileflow_notify::observers::{LoggingObserver, MetricsObserver, WebhookObserver};
use fileflow_notify::{EventNotifier, ObserverRegistry};
use fileflow_worker::jobs::UploadProcessor;
use fileflow_worker::metadata::JsonFileMetadataStore;
use fileflow_worker::{StaleJobSweeper, UploadProducer, WorkerPool};

#[tokio::main]
async fn main() {
    let env = std::env::var("FILEFLOW_ENV").unwrap_or_else(|_| "development".to_string());

    let config = match AppConfig::load(&env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);
    tracing::info!(env = %env, "Configuration loaded");

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "Server error");
        std::process::exit(1);
    }
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        LogFormat::Pretty => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main server run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting FileFlow v{}", env!("CARGO_PKG_VERSION"));
    let config = Arc::new(config);

    // ── Step 1: Data directories ─────────────────────────────────
    for dir in [&config.upload.upload_dir, &config.upload.records_dir] {
        tokio::fs::create_dir_all(dir).await.map_err(|e| {
            AppError::with_source(ErrorKind::Storage, format!("Failed to create dir '{dir}'"), e)
        })?;
    }

    // ── Step 2: Job store ────────────────────────────────────────
    tracing::info!(provider = %config.broker.provider, "Initializing job store");
    let store = BrokerManager::new(&config.broker).await?;

    // ── Step 3: Event notifier + observers ───────────────────────
    let registry = Arc::new(ObserverRegistry::new());
    let metrics = Arc::new(MetricsObserver::new());
    registry.register(Arc::new(LoggingObserver)).await;
    registry.register(metrics.clone()).await;
    if config.notifier.publish_redis_events {
        let publisher = fileflow_notify::observers::RedisEventPublisher::connect(
            &config.broker.redis.url,
            config.broker.redis.key_prefix.clone(),
        )
        .await?;
        registry.register(Arc::new(publisher)).await;
    }
    for url in &config.notifier.webhook_urls {
        registry.register(Arc::new(WebhookObserver::new(url))).await;
    }
    let (notifier, dispatcher) = EventNotifier::start(
        registry,
        Duration::from_millis(config.notifier.observer_timeout_ms),
    );

    // ── Step 4: Producer ─────────────────────────────────────────
    let producer = UploadProducer::new(
        store.clone(),
        config.broker.queue.clone(),
        config.worker.max_attempts,
        config.upload.clone(),
    );

    // ── Step 5: Worker pool + sweeper ────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let (worker_handle, sweeper_handle) = if config.worker.enabled {
        let metadata = Arc::new(JsonFileMetadataStore::new(&config.upload.records_dir));
        let processor = Arc::new(UploadProcessor::new(&config.upload.upload_dir, metadata));

        let pool = Arc::new(WorkerPool::new(
            store.clone(),
            processor,
            notifier.clone(),
            config.worker.clone(),
            config.broker.queue.clone(),
        ));
        let worker = tokio::spawn(Arc::clone(&pool).run(shutdown_rx.clone()));

        let sweeper =
            StaleJobSweeper::new(store.clone(), notifier.clone(), config.broker.queue.clone())
                .with_retention(
                    config
                        .worker
                        .retention_hours
                        .map(|hours| Duration::from_secs(hours * 3600)),
                )
                .start(Duration::from_secs(config.worker.sweep_interval_seconds.max(1)))
                .await?;

        tracing::info!(worker_id = %pool.worker_id(), "Background worker started");
        (Some(worker), Some(sweeper))
    } else {
        tracing::info!("Background worker disabled");
        (None, None)
    };

    // ── Step 6: HTTP server ──────────────────────────────────────
    let app_state = fileflow_api::AppState::new(Arc::clone(&config), producer, metrics);
    let app = fileflow_api::build_router(app_state);

    let addr = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind {addr}: {e}")))?;

    tracing::info!("FileFlow server listening on {}", addr);

    // ── Step 7: Graceful shutdown ────────────────────────────────
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received, starting graceful shutdown...");
        let _ = shutdown_tx.send(true);
    });

    server
        .await
        .map_err(|e| AppError::internal(format!("Server error: {e}")))?;

    tracing::info!("Waiting for background tasks to complete...");

    if let Some(sweeper) = sweeper_handle {
        if let Err(e) = sweeper.shutdown().await {
            tracing::warn!(error = %e, "Sweeper did not stop cleanly");
        }
    }
    if let Some(handle) = worker_handle {
        // The pool bounds its own drain by `shutdown_timeout_seconds`.
        let grace = Duration::from_secs(config.worker.shutdown_timeout_seconds + 5);
        if tokio::time::timeout(grace, handle).await.is_err() {
            tracing::warn!("Worker pool did not stop in time");
        }
    }

    drop(notifier);
    let _ = tokio::time::timeout(Duration::from_secs(5), dispatcher).await;

    tracing::info!("FileFlow server shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
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
}
