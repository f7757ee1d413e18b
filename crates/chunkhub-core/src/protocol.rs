//! HTTP wire protocol shared by the upload server and the upload client.
//!
//! Field names follow the camelCase JSON the protocol has always used.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Error message returned when a merge finds gaps in the chunk set.
pub const MISSING_CHUNKS_MESSAGE: &str = "缺少切片";

/// Error message returned when the assembled file has the wrong length.
pub const SIZE_MISMATCH_MESSAGE: &str = "文件大小不匹配";

/// Multipart field names of `POST /api/upload/chunk`.
pub mod fields {
    /// The chunk bytes.
    pub const CHUNK: &str = "chunk";
    /// The chunk key.
    pub const HASH: &str = "hash";
    /// Zero-based chunk index.
    pub const INDEX: &str = "index";
    /// Owning file id.
    pub const FILE_ID: &str = "fileId";
    /// Target file name.
    pub const FILE_NAME: &str = "fileName";
    /// Number of chunks in the file.
    pub const TOTAL_CHUNKS: &str = "totalChunks";
}

/// Acknowledgement of one stored chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkAck {
    /// Always `true` on a 2xx response.
    pub success: bool,
    /// Echo of the chunk key.
    pub hash: String,
    /// Echo of the chunk index.
    pub index: u32,
}

/// Answer to a chunk existence probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResponse {
    /// Whether the server already holds the chunk.
    pub exists: bool,
}

/// Body of `POST /api/upload/merge`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeRequest {
    /// File whose chunks are merged.
    pub file_id: String,
    /// Name of the assembled file.
    pub file_name: String,
    /// Number of chunks to concatenate.
    pub total_chunks: u32,
    /// Declared total size, checked after assembly.
    pub file_size: u64,
}

/// Successful merge result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeResponse {
    /// Always `true`.
    pub success: bool,
    /// Name of the assembled file.
    pub file_name: String,
    /// Size of the assembled file in bytes.
    pub file_size: u64,
    /// Where the server placed the file.
    pub file_path: String,
}

/// One assembled file on the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredFile {
    /// File name.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// Last modification time of the assembled file.
    pub upload_time: Option<DateTime<Utc>>,
    /// Server-side path.
    pub path: String,
}

/// Body of `GET /api/upload/files`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileListResponse {
    /// All assembled files.
    pub files: Vec<StoredFile>,
}

/// Body of a successful delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessResponse {
    /// Always `true`.
    pub success: bool,
}

/// Error body returned by every failing endpoint.
///
/// `details` is flattened so merge rejections read
/// `{"error": "...", "missingChunks": [1]}` on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable error.
    pub error: String,
    /// Machine-readable error code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Extra fields (missing indices, expected/actual sizes).
    #[serde(flatten)]
    pub details: serde_json::Map<String, serde_json::Value>,
}

/// Reject file names that could escape the server's upload directories.
pub fn validate_file_name(name: &str) -> crate::AppResult<()> {
    if name.is_empty() || name.trim().is_empty() {
        return Err(crate::AppError::validation("fileName must not be empty"));
    }
    if name.contains('/') || name.contains('\\') || name.contains('\0') {
        return Err(crate::AppError::validation(format!(
            "fileName must not contain path separators: {name}"
        )));
    }
    if name == "." || name == ".." || name.contains("..") {
        return Err(crate::AppError::validation(format!(
            "fileName must not contain '..': {name}"
        )));
    }
    Ok(())
}
