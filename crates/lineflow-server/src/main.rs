//! Lineflow Server - Main entry point

use anyhow::{Context, Result};
use lineflow_common::logging::{init_logging, LogConfig};
use sqlx::postgres::PgPoolOptions;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use lineflow_server::{
    api,
    config::Config,
    features::FeatureState,
    ingest::{Dispatcher, IngestionWorker, PgJobStore, PgRecordStore},
    storage::{config::StorageConfig, Storage},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Environment variables take precedence over these defaults
    let log_config = LogConfig::builder()
        .log_file_prefix("lineflow-server")
        .filter_directives("lineflow_server=debug,tower_http=debug,sqlx=warn")
        .build()
        .merge_env()?;

    // Keep the guard alive so buffered file logs are flushed on exit
    let _log_guard = init_logging(&log_config)?;

    info!("Starting Lineflow Server");

    // Load configuration
    let config = Config::load()?;
    info!(
        "Configuration loaded - server will bind to {}:{}",
        config.server.host, config.server.port
    );

    // Initialize database connection pool
    let db_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(config.database.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(config.database.idle_timeout_secs))
        .connect(&config.database.url)
        .await
        .context("Failed to connect to database")?;

    info!("Database connection pool established");

    // Initialize S3/MinIO storage
    let storage_config = StorageConfig::from_env()?;
    let storage = Storage::new(storage_config).await?;
    info!("Storage client initialized");

    if let Err(e) = storage.ensure_bucket().await {
        warn!("Could not ensure bucket '{}' exists: {:#}", storage.bucket(), e);
    }

    // Run migrations
    sqlx::migrate!("../../migrations")
        .run(&db_pool)
        .await
        .context("Failed to run migrations")?;

    info!("Database migrations completed");

    let jobs = Arc::new(PgJobStore::new(db_pool.clone()));
    let records = Arc::new(PgRecordStore::new(db_pool.clone()));
    let objects = Arc::new(storage);

    let worker = IngestionWorker::new(
        jobs.clone(),
        records,
        objects.clone(),
        config.ingest.worker_config(),
    );
    let dispatcher = Dispatcher::new(worker, config.ingest.poll_interval());

    // Start the ingestion dispatcher if enabled
    let shutdown = CancellationToken::new();
    let dispatcher_handle = if config.ingest.enabled {
        info!("Ingestion is enabled, starting dispatcher");
        Some(dispatcher.spawn(shutdown.clone()))
    } else {
        info!("Ingestion is disabled (INGEST_ENABLED=false)");
        None
    };

    let state = FeatureState {
        jobs,
        objects,
        dispatcher,
    };

    // Build the application router
    let app = api::create_router(state, &config);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    tokio::spawn(cancel_on_signal(shutdown.clone()));

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.clone().cancelled_owned())
        .await?;

    // An in-flight job is finished before the dispatcher loop exits
    if let Some(handle) = dispatcher_handle {
        let timeout = Duration::from_secs(config.server.shutdown_timeout_secs);
        match tokio::time::timeout(timeout, handle).await {
            Ok(Ok(())) => info!("Ingestion dispatcher stopped"),
            Ok(Err(e)) => warn!("Ingestion dispatcher task failed: {}", e),
            Err(_) => warn!("Ingestion dispatcher still busy after {:?}, exiting anyway", timeout),
        }
    }

    info!("Server shut down gracefully");

    Ok(())
}

/// Cancel `shutdown` on Ctrl+C or SIGTERM
async fn cancel_on_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            },
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }

    shutdown.cancel();
}
