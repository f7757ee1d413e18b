//! Assembled file catalog handlers: list, download, delete.

use axum::Json;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::Response;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use chunkhub_core::error::AppError;
use chunkhub_core::protocol::{FileListResponse, SuccessResponse};

use crate::error::ApiError;
use crate::state::AppState;

/// Bytes percent-encoded in a download file name.
const FILENAME_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'.')
    .remove(b'-')
    .remove(b'_')
    .remove(b'~');

/// GET /api/upload/files
pub async fn list_files(State(state): State<AppState>) -> Result<Json<FileListResponse>, ApiError> {
    let files = state.catalog.list().await?;
    Ok(Json(FileListResponse { files }))
}

/// GET /api/upload/download/{file_name}
pub async fn download_file(
    State(state): State<AppState>,
    Path(file_name): Path<String>,
) -> Result<Response, ApiError> {
    let download = state.catalog.open(&file_name).await?;
    let content_type = mime_guess::from_path(&download.name).first_or_octet_stream();

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type.as_ref())
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition(&download.name),
        )
        .header(header::CONTENT_LENGTH, download.size)
        .body(Body::from_stream(download.stream))
        .map_err(|e| AppError::internal(format!("Response build failed: {e}")))?;

    Ok(response)
}

/// DELETE /api/upload/files/{file_name}
pub async fn delete_file(
    State(state): State<AppState>,
    Path(file_name): Path<String>,
) -> Result<Json<SuccessResponse>, ApiError> {
    state.catalog.delete(&file_name).await?;
    Ok(Json(SuccessResponse { success: true }))
}

/// `attachment` disposition with an RFC 5987 encoded name.
fn content_disposition(file_name: &str) -> String {
    let encoded = utf8_percent_encode(file_name, FILENAME_ENCODE_SET);
    format!("attachment; filename*=UTF-8''{encoded}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disposition_encodes_non_ascii_names() {
        assert_eq!(
            content_disposition("a b.txt"),
            "attachment; filename*=UTF-8''a%20b.txt"
        );
        assert_eq!(
            content_disposition("文.md"),
            "attachment; filename*=UTF-8''%E6%96%87.md"
        );
    }
}
