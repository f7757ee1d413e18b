//! Catalog of assembled files: listing, download and deletion.

use std::sync::Arc;

use tracing::info;

use chunkhub_core::error::{AppError, ErrorKind};
use chunkhub_core::protocol::{StoredFile, validate_file_name};
use chunkhub_core::result::AppResult;
use chunkhub_core::traits::storage::{ByteStream, StorageProvider};

/// Message returned when an assembled file does not exist.
pub const FILE_NOT_FOUND_MESSAGE: &str = "文件不存在";

/// An assembled file opened for download.
pub struct FileDownload {
    /// File name.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// File contents.
    pub stream: ByteStream,
}

impl std::fmt::Debug for FileDownload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileDownload")
            .field("name", &self.name)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// Read/delete access to the final-file directory.
#[derive(Debug, Clone)]
pub struct FileCatalog {
    provider: Arc<dyn StorageProvider>,
    files_root: String,
}

impl FileCatalog {
    /// Create a catalog over `files_root`.
    pub fn new(provider: Arc<dyn StorageProvider>, files_root: impl Into<String>) -> Self {
        Self {
            provider,
            files_root: files_root.into(),
        }
    }

    /// All assembled files, by name.
    pub async fn list(&self) -> AppResult<Vec<StoredFile>> {
        let entries = self.provider.list(&self.files_root).await?;
        Ok(entries
            .into_iter()
            .filter(|e| !e.is_directory)
            .map(|e| {
                let path = self
                    .provider
                    .local_path(&e.path)
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| e.path.clone());
                StoredFile {
                    name: e.name().to_string(),
                    size: e.size_bytes,
                    upload_time: e.last_modified,
                    path,
                }
            })
            .collect())
    }

    /// Open an assembled file for streaming.
    pub async fn open(&self, file_name: &str) -> AppResult<FileDownload> {
        let path = self.path_of(file_name)?;
        let meta = self.provider.metadata(&path).await.map_err(not_found)?;
        if meta.is_directory {
            return Err(AppError::not_found(FILE_NOT_FOUND_MESSAGE));
        }
        let stream = self.provider.read(&path).await.map_err(not_found)?;
        Ok(FileDownload {
            name: file_name.to_string(),
            size: meta.size_bytes,
            stream,
        })
    }

    /// Delete an assembled file. Absent files are reported as not found.
    pub async fn delete(&self, file_name: &str) -> AppResult<()> {
        let path = self.path_of(file_name)?;
        if !self.provider.exists(&path).await? {
            return Err(AppError::not_found(FILE_NOT_FOUND_MESSAGE));
        }
        self.provider.delete(&path).await?;
        info!(file_name, "Deleted assembled file");
        Ok(())
    }

    fn path_of(&self, file_name: &str) -> AppResult<String> {
        validate_file_name(file_name)?;
        Ok(format!("{}/{}", self.files_root, file_name))
    }
}

fn not_found(e: AppError) -> AppError {
    if e.kind == ErrorKind::NotFound {
        AppError::not_found(FILE_NOT_FOUND_MESSAGE)
    } else {
        e
    }
}
