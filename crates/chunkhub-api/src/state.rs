//! Application state shared across all handlers and middleware.

use std::sync::Arc;
use std::time::Instant;

use chunkhub_core::config::AppConfig;
use chunkhub_core::result::AppResult;
use chunkhub_core::traits::storage::StorageProvider;
use chunkhub_storage::{
    ChunkedUploadHandler, FileCatalog, LocalStorageProvider, MergeCoordinator, StaleUploadSweeper,
};

/// Application state containing all shared dependencies.
///
/// Passed to every Axum handler via `State<AppState>`.
/// All fields are `Arc`-wrapped or cheap to clone.
#[derive(Debug, Clone)]
pub struct AppState {
    // ── Configuration ────────────────────────────────────────
    /// Application configuration
    pub config: Arc<AppConfig>,

    // ── Storage ──────────────────────────────────────────────
    /// Provider rooted at the upload directory
    pub provider: Arc<dyn StorageProvider>,
    /// Chunk holding area
    pub uploads: ChunkedUploadHandler,
    /// Final-file assembly
    pub merger: Arc<MergeCoordinator>,
    /// Assembled file catalog
    pub catalog: FileCatalog,

    /// Process start, for uptime reporting
    pub started_at: Instant,
}

impl AppState {
    /// Build the state over a local upload directory, creating the holding
    /// and final-file directories.
    pub async fn new(config: AppConfig) -> AppResult<Self> {
        let provider: Arc<dyn StorageProvider> =
            Arc::new(LocalStorageProvider::new(&config.storage.upload_root).await?);
        Self::with_provider(config, provider).await
    }

    /// Build the state over an arbitrary provider.
    pub async fn with_provider(
        config: AppConfig,
        provider: Arc<dyn StorageProvider>,
    ) -> AppResult<Self> {
        let storage = &config.storage;
        provider.create_dir(&storage.temp_dir_name).await?;
        provider.create_dir(&storage.files_dir_name).await?;

        let uploads = ChunkedUploadHandler::new(provider.clone(), storage.temp_dir_name.clone());
        let merger = Arc::new(MergeCoordinator::new(
            uploads.clone(),
            provider.clone(),
            storage.files_dir_name.clone(),
            storage.max_upload_size_bytes,
        ));
        let catalog = FileCatalog::new(provider.clone(), storage.files_dir_name.clone());

        Ok(Self {
            config: Arc::new(config),
            provider,
            uploads,
            merger,
            catalog,
            started_at: Instant::now(),
        })
    }

    /// Sweeper over this state's holding area.
    pub fn sweeper(&self) -> StaleUploadSweeper {
        StaleUploadSweeper::new(
            self.provider.clone(),
            self.config.storage.temp_dir_name.clone(),
            self.config.cleanup.max_age(),
        )
    }
}
