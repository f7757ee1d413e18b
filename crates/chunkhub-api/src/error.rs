//! Maps domain `AppError` to HTTP responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use chunkhub_core::error::{AppError, ErrorKind};
use chunkhub_core::protocol::{ErrorBody, MISSING_CHUNKS_MESSAGE, SIZE_MISMATCH_MESSAGE};

/// HTTP-facing wrapper around [`AppError`].
///
/// Handlers return `Result<_, ApiError>` and use `?` on anything producing
/// an `AppError`.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl ApiError {
    /// HTTP status for an error kind.
    pub fn status(kind: ErrorKind) -> StatusCode {
        match kind {
            ErrorKind::Validation | ErrorKind::MissingChunks | ErrorKind::SizeMismatch => {
                StatusCode::BAD_REQUEST
            }
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Transport => StatusCode::BAD_GATEWAY,
            ErrorKind::Internal
            | ErrorKind::Storage
            | ErrorKind::Persistence
            | ErrorKind::Configuration
            | ErrorKind::Serialization => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let status = Self::status(err.kind);

        if status.is_server_error() {
            tracing::error!(kind = %err.kind, error = %err.message, "Request failed");
        }

        let error = match err.kind {
            ErrorKind::MissingChunks => MISSING_CHUNKS_MESSAGE.to_string(),
            ErrorKind::SizeMismatch => SIZE_MISMATCH_MESSAGE.to_string(),
            _ => err.message,
        };

        let details = match err.details {
            Some(serde_json::Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        };

        let body = ErrorBody {
            error,
            code: Some(err.kind.to_string()),
            details,
        };

        (status, Json(body)).into_response()
    }
}
