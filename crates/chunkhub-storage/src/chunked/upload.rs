//! Chunk holding area: receives chunks and answers existence probes.

use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;

use chunkhub_core::result::AppResult;
use chunkhub_core::traits::storage::{ByteStream, StorageProvider};
use chunkhub_core::types::{ChunkKey, FileId};

/// Handles individual chunk writes during a chunked upload.
///
/// Chunks of one file live under `{temp}/{fileId digest}/chunk-{index}`.
#[derive(Debug, Clone)]
pub struct ChunkedUploadHandler {
    /// The storage provider for temporary chunk storage.
    provider: Arc<dyn StorageProvider>,
    /// Directory, relative to the provider root, that holds all upload areas.
    temp_root: String,
}

impl ChunkedUploadHandler {
    /// Create a new chunked upload handler.
    pub fn new(provider: Arc<dyn StorageProvider>, temp_root: impl Into<String>) -> Self {
        Self {
            provider,
            temp_root: temp_root.into(),
        }
    }

    /// Directory holding all per-file upload areas.
    pub fn temp_root(&self) -> &str {
        &self.temp_root
    }

    /// Write a single chunk to the holding area. Re-sending a chunk replaces it.
    pub async fn write_chunk(&self, file_id: &FileId, index: u32, data: Bytes) -> AppResult<u64> {
        let chunk_path = self.chunk_path(file_id, index);
        let size = data.len() as u64;
        self.provider.write(&chunk_path, data).await?;
        debug!(file_id = %file_id, index, bytes = size, "Stored chunk");
        Ok(size)
    }

    /// Open a chunk for streaming.
    pub async fn read_chunk(&self, file_id: &FileId, index: u32) -> AppResult<ByteStream> {
        self.provider.read(&self.chunk_path(file_id, index)).await
    }

    /// Check if a specific chunk exists.
    pub async fn chunk_exists(&self, key: &ChunkKey) -> AppResult<bool> {
        self.provider
            .exists(&self.chunk_path(&key.file_id, key.index))
            .await
    }

    /// Indices in `0..total_chunks` that have not been received, ascending.
    pub async fn missing_chunks(&self, file_id: &FileId, total_chunks: u32) -> AppResult<Vec<u32>> {
        let mut missing = Vec::new();
        for index in 0..total_chunks {
            if !self.provider.exists(&self.chunk_path(file_id, index)).await? {
                missing.push(index);
            }
        }
        Ok(missing)
    }

    /// Delete the whole holding area of a file.
    pub async fn delete_upload(&self, file_id: &FileId) -> AppResult<()> {
        self.provider.delete_dir(&self.upload_dir(file_id)).await
    }

    /// Storage path of a chunk.
    pub fn chunk_path(&self, file_id: &FileId, index: u32) -> String {
        format!("{}/chunk-{index}", self.upload_dir(file_id))
    }

    /// Storage directory of a file's holding area.
    pub fn upload_dir(&self, file_id: &FileId) -> String {
        format!("{}/{}", self.temp_root, file_id.storage_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::LocalStorageProvider;

    async fn handler(dir: &std::path::Path) -> ChunkedUploadHandler {
        let provider = LocalStorageProvider::new(dir).await.unwrap();
        ChunkedUploadHandler::new(Arc::new(provider), "temp")
    }

    #[tokio::test]
    async fn stored_chunks_are_probeable() {
        let dir = tempfile::tempdir().unwrap();
        let handler = handler(dir.path()).await;
        let id = FileId::derive("a.bin", 3, 1);

        assert!(!handler.chunk_exists(&id.chunk_key(0)).await.unwrap());
        handler
            .write_chunk(&id, 0, Bytes::from_static(b"abc"))
            .await
            .unwrap();
        assert!(handler.chunk_exists(&id.chunk_key(0)).await.unwrap());
        assert!(!handler.chunk_exists(&id.chunk_key(1)).await.unwrap());
    }

    #[tokio::test]
    async fn missing_chunks_are_listed_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let handler = handler(dir.path()).await;
        let id = FileId::derive("a.bin", 3, 1);

        handler.write_chunk(&id, 1, Bytes::from_static(b"b")).await.unwrap();
        assert_eq!(handler.missing_chunks(&id, 4).await.unwrap(), vec![0, 2, 3]);

        handler.delete_upload(&id).await.unwrap();
        assert_eq!(handler.missing_chunks(&id, 2).await.unwrap(), vec![0, 1]);
    }

    #[tokio::test]
    async fn chunk_paths_never_contain_the_raw_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let handler = handler(dir.path()).await;
        let id = FileId::derive("../escape", 1, 1);

        let path = handler.chunk_path(&id, 3);
        assert!(path.starts_with("temp/"));
        assert!(path.ends_with("/chunk-3"));
        assert!(!path.contains(".."));
    }
}
