//! Upload state records and the chunk partition plan.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use chunkhub_core::error::{AppError, ErrorKind};
use chunkhub_core::result::AppResult;
use chunkhub_core::types::{ChunkKey, FileId};

/// Lifecycle state of one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    /// Split and persisted, not started.
    Pending,
    /// Chunks are being dispatched.
    Uploading,
    /// Stopped by the user or by a restart; resumable.
    Paused,
    /// Merged on the server; local data purged.
    Success,
    /// Gave up; chunks kept. Pause to make it resumable again.
    Error,
    /// Removed by the user.
    Cancelled,
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Uploading => "uploading",
            Self::Paused => "paused",
            Self::Success => "success",
            Self::Error => "error",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// One file submitted for transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub id: FileId,
    pub name: String,
    pub size: u64,
    pub mime_type: String,
    pub status: UploadStatus,
    pub total_chunks: u32,
    pub uploaded_chunks: u32,
    /// Sum of the sizes of uploaded chunks.
    pub uploaded_bytes: u64,
    pub chunk_size: u64,
    pub speed_bytes_per_sec: f64,
    pub eta_seconds: Option<u64>,
    pub last_error: Option<String>,
    pub source_path: Option<PathBuf>,
    pub added_at: DateTime<Utc>,
}

impl FileRecord {
    /// A fresh Pending record for `source` split into `chunk_size` pieces.
    pub fn new(source: &FileSource, chunk_size: u64) -> Self {
        Self {
            id: source.id(),
            name: source.name.clone(),
            size: source.size,
            mime_type: source.mime_type.clone(),
            status: UploadStatus::Pending,
            total_chunks: chunk_count(source.size, chunk_size),
            uploaded_chunks: 0,
            uploaded_bytes: 0,
            chunk_size,
            speed_bytes_per_sec: 0.0,
            eta_seconds: None,
            last_error: None,
            source_path: Some(source.path.clone()),
            added_at: Utc::now(),
        }
    }

    /// Percentage of chunks uploaded.
    ///
    /// A file without chunks reports 100 once merged and 0 before.
    pub fn progress_percent(&self) -> f64 {
        if self.total_chunks == 0 {
            return if self.status == UploadStatus::Success {
                100.0
            } else {
                0.0
            };
        }
        f64::from(self.uploaded_chunks) / f64::from(self.total_chunks) * 100.0
    }

    /// Whether every chunk has been acknowledged.
    pub fn all_chunks_uploaded(&self) -> bool {
        self.uploaded_chunks >= self.total_chunks
    }
}

/// One chunk of one file. The payload is stored separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkRecord {
    pub file_id: FileId,
    pub index: u32,
    /// Inclusive start offset.
    pub start: u64,
    /// Exclusive end offset.
    pub end: u64,
    pub uploaded: bool,
}

impl ChunkRecord {
    /// Record for `span` of `file_id`, not yet uploaded.
    pub fn new(file_id: FileId, span: ChunkSpan) -> Self {
        Self {
            file_id,
            index: span.index,
            start: span.start,
            end: span.end,
            uploaded: false,
        }
    }

    pub fn key(&self) -> ChunkKey {
        self.file_id.chunk_key(self.index)
    }

    pub fn size(&self) -> u64 {
        self.end - self.start
    }
}

/// Byte range `[start, end)` of chunk `index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSpan {
    pub index: u32,
    pub start: u64,
    pub end: u64,
}

/// Number of chunks a file of `size` bytes splits into.
pub fn chunk_count(size: u64, chunk_size: u64) -> u32 {
    let chunk_size = chunk_size.max(1);
    u32::try_from(size.div_ceil(chunk_size)).unwrap_or(u32::MAX)
}

/// Partition `[0, size)` into ordered, contiguous spans of `chunk_size`
/// bytes. Only the last span may be shorter. An empty file has no spans.
pub fn plan_chunks(size: u64, chunk_size: u64) -> Vec<ChunkSpan> {
    let chunk_size = chunk_size.max(1);
    (0..chunk_count(size, chunk_size))
        .map(|index| {
            let start = u64::from(index) * chunk_size;
            ChunkSpan {
                index,
                start,
                end: (start + chunk_size).min(size),
            }
        })
        .collect()
}

/// A local file offered for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSource {
    pub path: PathBuf,
    pub name: String,
    pub size: u64,
    /// Modification time in milliseconds since the Unix epoch.
    pub last_modified_ms: i64,
    pub mime_type: String,
}

impl FileSource {
    /// Stat a local file.
    pub async fn from_path(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let meta = tokio::fs::metadata(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::not_found(format!("File not found: {}", path.display()))
            } else {
                AppError::with_source(
                    ErrorKind::Validation,
                    format!("Cannot read file: {}", path.display()),
                    e,
                )
            }
        })?;
        if !meta.is_file() {
            return Err(AppError::validation(format!(
                "Not a regular file: {}",
                path.display()
            )));
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| AppError::validation(format!("No file name: {}", path.display())))?;
        let last_modified_ms = meta
            .modified()
            .ok()
            .map(|t| DateTime::<Utc>::from(t).timestamp_millis())
            .unwrap_or_default();

        Ok(Self {
            path: path.to_path_buf(),
            mime_type: mime_guess::from_path(&name)
                .first_or_octet_stream()
                .essence_str()
                .to_string(),
            name,
            size: meta.len(),
            last_modified_ms,
        })
    }

    /// Stable id of this file.
    pub fn id(&self) -> FileId {
        FileId::derive(&self.name, self.size, self.last_modified_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_covers_file_without_gaps() {
        let spans = plan_chunks(2_621_440, 1_048_576);
        assert_eq!(spans.len(), 3);
        assert_eq!(spans[0], ChunkSpan { index: 0, start: 0, end: 1_048_576 });
        assert_eq!(spans[2].start, 2_097_152);
        assert_eq!(spans[2].end, 2_621_440);
        for pair in spans.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
    }

    #[test]
    fn exact_multiple_has_full_last_chunk() {
        let spans = plan_chunks(4096, 1024);
        assert_eq!(spans.len(), 4);
        assert_eq!(spans[3].end - spans[3].start, 1024);
    }

    #[test]
    fn empty_file_has_no_chunks() {
        assert!(plan_chunks(0, 1024).is_empty());
        assert_eq!(chunk_count(0, 1024), 0);
    }

    #[test]
    fn progress_of_empty_file_depends_on_status() {
        let source = FileSource {
            path: PathBuf::from("empty.txt"),
            name: "empty.txt".into(),
            size: 0,
            last_modified_ms: 1,
            mime_type: "text/plain".into(),
        };
        let mut record = FileRecord::new(&source, 1024);
        assert_eq!(record.progress_percent(), 0.0);
        record.status = UploadStatus::Success;
        assert_eq!(record.progress_percent(), 100.0);
    }

    #[tokio::test]
    async fn source_from_path_guesses_mime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"hi!!").unwrap();

        let source = FileSource::from_path(&path).await.unwrap();
        assert_eq!(source.name, "notes.txt");
        assert_eq!(source.size, 4);
        assert_eq!(source.mime_type, "text/plain");
        assert!(source.id().as_str().starts_with("notes.txt-4-"));
    }
}
