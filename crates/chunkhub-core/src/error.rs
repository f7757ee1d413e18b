//! Unified application error types for ChunkHub.
//!
//! All crates map their internal errors into [`AppError`] for consistent
//! propagation through the ? operator.

use std::fmt;
use thiserror::Error;

/// Top-level error kind categorization used across the entire application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    /// The requested resource was not found.
    NotFound,
    /// Input validation failed.
    Validation,
    /// The operation is not valid in the current state.
    Conflict,
    /// An internal error occurred.
    Internal,
    /// A storage I/O error occurred on the server side.
    Storage,
    /// The local chunk store could not be read or written.
    Persistence,
    /// A configuration error occurred.
    Configuration,
    /// A serialization/deserialization error occurred.
    Serialization,
    /// A network exchange failed or returned a non-success status. Retryable.
    Transport,
    /// A merge was attempted while some chunks were still missing.
    MissingChunks,
    /// The assembled file does not have the declared size.
    SizeMismatch,
    /// The service is temporarily unavailable.
    ServiceUnavailable,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "NOT_FOUND"),
            Self::Validation => write!(f, "VALIDATION"),
            Self::Conflict => write!(f, "CONFLICT"),
            Self::Internal => write!(f, "INTERNAL"),
            Self::Storage => write!(f, "STORAGE"),
            Self::Persistence => write!(f, "PERSISTENCE"),
            Self::Configuration => write!(f, "CONFIGURATION"),
            Self::Serialization => write!(f, "SERIALIZATION"),
            Self::Transport => write!(f, "TRANSPORT"),
            Self::MissingChunks => write!(f, "MISSING_CHUNKS"),
            Self::SizeMismatch => write!(f, "SIZE_MISMATCH"),
            Self::ServiceUnavailable => write!(f, "SERVICE_UNAVAILABLE"),
        }
    }
}

/// The unified application error used throughout ChunkHub.
///
/// All crate-specific errors are mapped into `AppError` using `From` impls
/// or explicit `.map_err()` calls. Errors that need structured data on the
/// wire (missing chunk indices, expected/actual sizes) carry it in
/// [`AppError::details`].
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct AppError {
    /// The category of error.
    pub kind: ErrorKind,
    /// A human-readable error message.
    pub message: String,
    /// Structured payload attached to the error, if any.
    pub details: Option<serde_json::Value>,
    /// Optional underlying cause.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new application error.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
            source: None,
        }
    }

    /// Create a new application error with an underlying cause.
    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
            source: Some(Box::new(source)),
        }
    }

    /// Attach structured details to this error.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Create a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Create a conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Create a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Storage, message)
    }

    /// Create a local persistence error.
    pub fn persistence(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Persistence, message)
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// Create a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transport, message)
    }

    /// Create a service-unavailable error.
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ServiceUnavailable, message)
    }

    /// Create a missing-chunks error listing the absent indices.
    pub fn missing_chunks(missing: Vec<u32>) -> Self {
        Self::new(
            ErrorKind::MissingChunks,
            format!("{} chunk(s) missing", missing.len()),
        )
        .with_details(serde_json::json!({ "missingChunks": missing }))
    }

    /// Create a size-mismatch error for an assembled file.
    pub fn size_mismatch(expected: u64, actual: u64) -> Self {
        Self::new(
            ErrorKind::SizeMismatch,
            format!("assembled size {actual} does not match declared size {expected}"),
        )
        .with_details(serde_json::json!({ "expected": expected, "actual": actual }))
    }

    /// Whether the failed operation may succeed if attempted again unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::Transport | ErrorKind::ServiceUnavailable
        )
    }

    /// The missing chunk indices carried by a [`ErrorKind::MissingChunks`] error.
    pub fn missing_chunk_indices(&self) -> Option<Vec<u32>> {
        if self.kind != ErrorKind::MissingChunks {
            return None;
        }
        self.details
            .as_ref()?
            .get("missingChunks")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

impl Clone for AppError {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            message: self.message.clone(),
            details: self.details.clone(),
            source: None,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(
            ErrorKind::Serialization,
            format!("JSON serialization error: {err}"),
            err,
        )
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::with_source(ErrorKind::Storage, format!("I/O error: {err}"), err)
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::with_source(
            ErrorKind::Configuration,
            format!("Configuration error: {err}"),
            err,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_chunks_round_trips_indices() {
        let err = AppError::missing_chunks(vec![1, 4]);
        assert_eq!(err.kind, ErrorKind::MissingChunks);
        assert_eq!(err.missing_chunk_indices(), Some(vec![1, 4]));
        assert!(!err.is_retryable());
    }

    #[test]
    fn transport_is_retryable() {
        assert!(AppError::transport("connection reset").is_retryable());
        assert!(!AppError::validation("bad index").is_retryable());
    }

    #[test]
    fn clone_keeps_details_but_drops_source() {
        let io = std::io::Error::other("disk full");
        let err = AppError::with_source(ErrorKind::Persistence, "write failed", io)
            .with_details(serde_json::json!({"path": "x"}));
        let cloned = err.clone();
        assert!(cloned.source.is_none());
        assert_eq!(cloned.details, err.details);
        assert_eq!(cloned.to_string(), "PERSISTENCE: write failed");
    }
}
