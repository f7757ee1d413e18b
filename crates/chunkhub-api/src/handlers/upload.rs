//! Chunk upload, probe and merge handlers.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, Path, State};
use bytes::Bytes;
use tracing::debug;

use chunkhub_core::error::AppError;
use chunkhub_core::protocol::{ChunkAck, MergeRequest, MergeResponse, ProbeResponse, fields};
use chunkhub_core::types::{ChunkKey, FileId};

use crate::error::ApiError;
use crate::state::AppState;

/// Message returned when a chunk upload carries no `chunk` part.
pub const NO_CHUNK_MESSAGE: &str = "没有接收到文件";

/// Multipart fields of one chunk upload.
#[derive(Debug, Default)]
struct ChunkForm {
    chunk: Option<Bytes>,
    hash: Option<String>,
    index: Option<String>,
    file_id: Option<String>,
    file_name: Option<String>,
    total_chunks: Option<String>,
}

impl ChunkForm {
    async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = Self::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::validation(format!("Invalid multipart body: {e}")))?
        {
            let name = field.name().unwrap_or_default().to_string();
            if name == fields::CHUNK {
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::validation(format!("Failed to read chunk: {e}")))?;
                form.chunk = Some(data);
                continue;
            }

            let slot = match name.as_str() {
                fields::HASH => &mut form.hash,
                fields::INDEX => &mut form.index,
                fields::FILE_ID => &mut form.file_id,
                fields::FILE_NAME => &mut form.file_name,
                fields::TOTAL_CHUNKS => &mut form.total_chunks,
                _ => continue,
            };
            let text = field
                .text()
                .await
                .map_err(|e| AppError::validation(format!("Failed to read field {name}: {e}")))?;
            *slot = Some(text);
        }
        Ok(form)
    }
}

fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str, AppError> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::validation(format!("Missing field: {name}")))
}

fn parse_u32(value: &str, name: &str) -> Result<u32, AppError> {
    value
        .trim()
        .parse()
        .map_err(|_| AppError::validation(format!("Field {name} must be a non-negative integer")))
}

/// POST /api/upload/chunk
pub async fn upload_chunk(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ChunkAck>, ApiError> {
    let form = ChunkForm::read(multipart).await?;

    let data = form
        .chunk
        .ok_or_else(|| AppError::validation(NO_CHUNK_MESSAGE))?;
    let file_id = FileId::new(required(&form.file_id, fields::FILE_ID)?)?;
    let index = parse_u32(required(&form.index, fields::INDEX)?, fields::INDEX)?;

    if let Some(total) = form.total_chunks.as_deref().filter(|t| !t.is_empty()) {
        let total = parse_u32(total, fields::TOTAL_CHUNKS)?;
        if index >= total {
            return Err(AppError::validation(format!(
                "Chunk index {index} out of range for {total} chunks"
            ))
            .into());
        }
    }

    let hash = form
        .hash
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| file_id.chunk_key(index).to_string());

    debug!(
        file_id = %file_id,
        file_name = form.file_name.as_deref().unwrap_or_default(),
        index,
        total_chunks = form.total_chunks.as_deref().unwrap_or_default(),
        bytes = data.len(),
        "Received chunk"
    );

    state.uploads.write_chunk(&file_id, index, data).await?;

    Ok(Json(ChunkAck {
        success: true,
        hash,
        index,
    }))
}

/// GET /api/upload/check/{chunk_key}
pub async fn check_chunk(
    State(state): State<AppState>,
    Path(chunk_key): Path<String>,
) -> Result<Json<ProbeResponse>, ApiError> {
    let key: ChunkKey = chunk_key.parse()?;
    let exists = state.uploads.chunk_exists(&key).await?;
    Ok(Json(ProbeResponse { exists }))
}

/// POST /api/upload/merge
pub async fn merge_chunks(
    State(state): State<AppState>,
    payload: Result<Json<MergeRequest>, JsonRejection>,
) -> Result<Json<MergeResponse>, ApiError> {
    let Json(request) =
        payload.map_err(|e| AppError::validation(format!("Invalid merge request: {e}")))?;
    let response = state.merger.merge(&request).await?;
    Ok(Json(response))
}
