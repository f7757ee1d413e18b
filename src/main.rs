//! ChunkHub Server: resumable chunked file uploads.
//!
//! Main entry point that wires the storage, API and worker crates together
//! and starts the server.

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{EnvFilter, fmt};

use chunkhub_api::AppState;
use chunkhub_core::config::AppConfig;
use chunkhub_core::error::AppError;
use chunkhub_worker::CronScheduler;
use chunkhub_worker::jobs::cleanup::ChunkCleanupHandler;

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {e}");
        std::process::exit(1);
    }
}

/// Load configuration from file and environment
///
/// `CHUNKHUB_CONFIG` names an explicit file; otherwise `config/default.toml`
/// is merged with `config/{CHUNKHUB_ENV}.toml`.
fn load_configuration() -> Result<AppConfig, AppError> {
    if let Ok(path) = std::env::var("CHUNKHUB_CONFIG") {
        return AppConfig::load_from(&path);
    }
    let env = std::env::var("CHUNKHUB_ENV").unwrap_or_else(|_| "development".to_string());
    AppConfig::load(&env)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
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
    tracing::info!("Starting ChunkHub v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Storage ──────────────────────────────────────────
    tracing::info!(
        root = %config.storage.upload_root,
        "Initializing upload storage..."
    );
    let state = AppState::new(config.clone()).await?;
    tracing::info!(
        provider = state.provider.provider_type(),
        "Upload storage initialized"
    );

    // ── Step 2: Stale upload sweep ───────────────────────────────
    let mut scheduler = if config.cleanup.enabled {
        if config.cleanup.sweep_on_startup {
            match state.sweeper().sweep().await {
                Ok(report) => tracing::info!(
                    scanned = report.scanned,
                    removed = report.removed,
                    failed = report.failed,
                    "Startup sweep finished"
                ),
                Err(e) => tracing::warn!(error = %e, "Startup sweep failed"),
            }
        }

        let scheduler = CronScheduler::new().await?;
        scheduler
            .register(
                &config.cleanup.schedule,
                Arc::new(ChunkCleanupHandler::new(state.sweeper())),
            )
            .await?;
        scheduler.start().await?;
        Some(scheduler)
    } else {
        tracing::info!("Stale upload sweep disabled");
        None
    };

    // ── Step 3: Build and start HTTP server ──────────────────────
    let app = chunkhub_api::build_router(state);

    let addr = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind {addr}: {e}")))?;

    tracing::info!("ChunkHub server listening on {addr}");

    // ── Step 4: Graceful shutdown ────────────────────────────────
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_signal().await;
            tracing::info!("Shutdown signal received, starting graceful shutdown...");
        })
        .await
        .map_err(|e| AppError::internal(format!("Server error: {e}")))?;

    // ── Step 5: Stop background tasks ────────────────────────────
    if let Some(scheduler) = scheduler.as_mut() {
        let grace = Duration::from_secs(config.server.shutdown_grace_seconds);
        match tokio::time::timeout(grace, scheduler.shutdown()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "Scheduler shutdown failed"),
            Err(_) => tracing::warn!("Scheduler did not stop within the grace period"),
        }
    }

    tracing::info!("ChunkHub server shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
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
