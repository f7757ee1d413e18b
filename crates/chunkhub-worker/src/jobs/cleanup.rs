//! Stale chunk cleanup job handler.

use async_trait::async_trait;
use serde_json::Value;
use tracing;

use chunkhub_core::error::ErrorKind;
use chunkhub_storage::StaleUploadSweeper;

use crate::executor::{JobExecutionError, JobHandler};

/// Removes holding areas of uploads that were never merged
#[derive(Debug)]
pub struct ChunkCleanupHandler {
    /// Sweeper over the server's holding area
    sweeper: StaleUploadSweeper,
}

impl ChunkCleanupHandler {
    /// Create a new chunk cleanup handler
    pub fn new(sweeper: StaleUploadSweeper) -> Self {
        Self { sweeper }
    }
}

#[async_trait]
impl JobHandler for ChunkCleanupHandler {
    fn job_type(&self) -> &str {
        "chunk_cleanup"
    }

    async fn execute(&self) -> Result<Value, JobExecutionError> {
        tracing::info!("Running chunk cleanup");

        let report = self.sweeper.sweep().await.map_err(|e| match e.kind {
            ErrorKind::Storage => JobExecutionError::Transient(format!("Chunk cleanup failed: {e}")),
            _ => JobExecutionError::Internal(e),
        })?;

        tracing::info!(
            scanned = report.scanned,
            removed = report.removed,
            failed = report.failed,
            "Chunk cleanup finished"
        );

        Ok(serde_json::json!({
            "task": "chunk_cleanup",
            "scanned": report.scanned,
            "stale_uploads_removed": report.removed,
            "failed": report.failed,
        }))
    }
}
