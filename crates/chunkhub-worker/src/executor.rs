//! Job handler contract shared by all scheduled tasks.

use async_trait::async_trait;
use serde_json::Value;

use chunkhub_core::error::AppError;

/// Trait for job handler implementations
#[async_trait]
pub trait JobHandler: Send + Sync + std::fmt::Debug {
    /// Get the job type this handler processes
    fn job_type(&self) -> &str;

    /// Execute the job once, returning a summary of what was done
    async fn execute(&self) -> Result<Value, JobExecutionError>;
}

/// Error from job execution
#[derive(Debug, thiserror::Error)]
pub enum JobExecutionError {
    /// Permanent failure: the next scheduled run will fail the same way
    #[error("Permanent job failure: {0}")]
    Permanent(String),

    /// Transient failure: the next scheduled run may succeed
    #[error("Transient job failure: {0}")]
    Transient(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] AppError),
}
