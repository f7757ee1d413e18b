//! In-memory chunk store for tests and ephemeral sessions.

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

use chunkhub_core::error::AppError;
use chunkhub_core::result::AppResult;
use chunkhub_core::types::{ChunkKey, FileId};

use super::ChunkStore;
use crate::model::{ChunkRecord, FileRecord};

/// [`ChunkStore`] that forgets everything when dropped.
#[derive(Debug, Default)]
pub struct MemoryChunkStore {
    files: DashMap<FileId, FileRecord>,
    chunks: DashMap<ChunkKey, (ChunkRecord, Bytes)>,
}

impl MemoryChunkStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChunkStore for MemoryChunkStore {
    async fn put_file(&self, record: &FileRecord) -> AppResult<()> {
        self.files.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn get_file(&self, file_id: &FileId) -> AppResult<Option<FileRecord>> {
        Ok(self.files.get(file_id).map(|r| r.clone()))
    }

    async fn all_files(&self) -> AppResult<Vec<FileRecord>> {
        let mut records: Vec<FileRecord> = self.files.iter().map(|r| r.clone()).collect();
        records.sort_by(|a, b| a.added_at.cmp(&b.added_at).then(a.id.cmp(&b.id)));
        Ok(records)
    }

    async fn put_chunk(&self, record: &ChunkRecord, payload: Bytes) -> AppResult<()> {
        self.chunks.insert(record.key(), (record.clone(), payload));
        Ok(())
    }

    async fn get_chunk(&self, key: &ChunkKey) -> AppResult<Option<ChunkRecord>> {
        Ok(self.chunks.get(key).map(|c| c.0.clone()))
    }

    async fn chunk_payload(&self, key: &ChunkKey) -> AppResult<Option<Bytes>> {
        Ok(self.chunks.get(key).map(|c| c.1.clone()))
    }

    async fn chunks_for_file(&self, file_id: &FileId) -> AppResult<Vec<ChunkRecord>> {
        let mut chunks: Vec<ChunkRecord> = self
            .chunks
            .iter()
            .filter(|c| &c.key().file_id == file_id)
            .map(|c| c.0.clone())
            .collect();
        chunks.sort_by_key(|c| c.index);
        Ok(chunks)
    }

    async fn mark_uploaded(&self, key: &ChunkKey, uploaded: bool) -> AppResult<()> {
        let mut entry = self
            .chunks
            .get_mut(key)
            .ok_or_else(|| AppError::not_found(format!("Chunk not found: {key}")))?;
        entry.0.uploaded = uploaded;
        Ok(())
    }

    async fn delete_chunk(&self, key: &ChunkKey) -> AppResult<()> {
        self.chunks.remove(key);
        Ok(())
    }

    async fn delete_file(&self, file_id: &FileId) -> AppResult<()> {
        self.files.remove(file_id);
        Ok(())
    }

    async fn delete_all_for_file(&self, file_id: &FileId) -> AppResult<()> {
        self.chunks.retain(|key, _| &key.file_id != file_id);
        self.files.remove(file_id);
        Ok(())
    }

    async fn clear_all(&self) -> AppResult<()> {
        self.chunks.clear();
        self.files.clear();
        Ok(())
    }
}
