//! Lifecycle notifications published by the upload scheduler.

use serde::Serialize;

use chunkhub_core::types::FileId;

/// One lifecycle change of one file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum UploadEvent {
    /// A file was added to the tracked set.
    Added { file_id: FileId },
    /// A Pending file started uploading.
    Started { file_id: FileId },
    /// Another chunk was acknowledged.
    Progress {
        file_id: FileId,
        uploaded_chunks: u32,
        total_chunks: u32,
        progress_percent: f64,
        speed_bytes_per_sec: f64,
        eta_seconds: Option<u64>,
    },
    /// The server assembled the file.
    Success { file_id: FileId, file_path: String },
    /// The file stopped with an error.
    Error { file_id: FileId, message: String },
    Paused { file_id: FileId },
    Resumed { file_id: FileId },
    /// The file was removed and its local data deleted.
    Removed { file_id: FileId },
}

impl UploadEvent {
    /// The file this event is about.
    pub fn file_id(&self) -> &FileId {
        match self {
            Self::Added { file_id }
            | Self::Started { file_id }
            | Self::Progress { file_id, .. }
            | Self::Success { file_id, .. }
            | Self::Error { file_id, .. }
            | Self::Paused { file_id }
            | Self::Resumed { file_id }
            | Self::Removed { file_id } => file_id,
        }
    }
}
