//! Convenience result type alias for ChunkHub.

use crate::error::AppError;

/// A specialized `Result` type for ChunkHub operations.
pub type AppResult<T> = Result<T, AppError>;
