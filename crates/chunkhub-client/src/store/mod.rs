//! Local persistence of upload state and chunk payloads.
//!
//! The store is the client's durable memory: after a restart the scheduler
//! rebuilds every tracked file from it.

pub mod fs;
pub mod memory;

use async_trait::async_trait;
use bytes::Bytes;

use chunkhub_core::result::AppResult;
use chunkhub_core::types::{ChunkKey, FileId};

use crate::model::{ChunkRecord, FileRecord};

pub use fs::FsChunkStore;
pub use memory::MemoryChunkStore;

/// Keyed storage for [`FileRecord`]s, [`ChunkRecord`]s and chunk payloads.
///
/// Every write is all-or-nothing. Failures surface as
/// [`ErrorKind::Persistence`](chunkhub_core::error::ErrorKind::Persistence).
#[async_trait]
pub trait ChunkStore: Send + Sync + std::fmt::Debug + 'static {
    /// Insert or replace a file record.
    async fn put_file(&self, record: &FileRecord) -> AppResult<()>;

    async fn get_file(&self, file_id: &FileId) -> AppResult<Option<FileRecord>>;

    /// Every persisted file record.
    async fn all_files(&self) -> AppResult<Vec<FileRecord>>;

    /// Insert or replace a chunk record together with its payload.
    async fn put_chunk(&self, record: &ChunkRecord, payload: Bytes) -> AppResult<()>;

    async fn get_chunk(&self, key: &ChunkKey) -> AppResult<Option<ChunkRecord>>;

    async fn chunk_payload(&self, key: &ChunkKey) -> AppResult<Option<Bytes>>;

    /// All chunk records of a file, ascending by index.
    async fn chunks_for_file(&self, file_id: &FileId) -> AppResult<Vec<ChunkRecord>>;

    /// Set the uploaded flag of an existing chunk.
    async fn mark_uploaded(&self, key: &ChunkKey, uploaded: bool) -> AppResult<()>;

    async fn delete_chunk(&self, key: &ChunkKey) -> AppResult<()>;

    /// Delete the file record only; chunks are left in place.
    async fn delete_file(&self, file_id: &FileId) -> AppResult<()>;

    /// Delete the file record and every chunk of the file.
    async fn delete_all_for_file(&self, file_id: &FileId) -> AppResult<()>;

    async fn clear_all(&self) -> AppResult<()>;
}

#[cfg(test)]
pub(crate) mod contract {
    //! Behaviour every store must show, run against each implementation.

    use std::path::PathBuf;

    use super::*;
    use crate::model::{FileSource, UploadStatus, plan_chunks};
    use chunkhub_core::error::ErrorKind;

    pub fn sample(name: &str, size: u64, chunk_size: u64) -> (FileRecord, Vec<ChunkRecord>) {
        let source = FileSource {
            path: PathBuf::from(name),
            name: name.to_string(),
            size,
            last_modified_ms: 42,
            mime_type: "application/octet-stream".into(),
        };
        let record = FileRecord::new(&source, chunk_size);
        let chunks = plan_chunks(size, chunk_size)
            .into_iter()
            .map(|span| ChunkRecord::new(record.id.clone(), span))
            .collect();
        (record, chunks)
    }

    pub async fn round_trips_records(store: &dyn ChunkStore) {
        let (mut record, chunks) = sample("a.bin", 10, 4);
        for chunk in chunks.iter().rev() {
            let payload = Bytes::from(vec![chunk.index as u8; chunk.size() as usize]);
            store.put_chunk(chunk, payload).await.unwrap();
        }
        store.put_file(&record).await.unwrap();

        assert_eq!(store.get_file(&record.id).await.unwrap(), Some(record.clone()));
        let listed = store.chunks_for_file(&record.id).await.unwrap();
        assert_eq!(listed.iter().map(|c| c.index).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(listed[2].size(), 2);

        let payload = store.chunk_payload(&chunks[1].key()).await.unwrap().unwrap();
        assert_eq!(payload, Bytes::from(vec![1u8; 4]));

        record.status = UploadStatus::Paused;
        store.put_file(&record).await.unwrap();
        assert_eq!(store.all_files().await.unwrap(), vec![record]);
    }

    pub async fn marks_uploaded(store: &dyn ChunkStore) {
        let (record, chunks) = sample("b.bin", 8, 4);
        for chunk in &chunks {
            store.put_chunk(chunk, Bytes::from_static(b"xxxx")).await.unwrap();
        }

        store.mark_uploaded(&chunks[0].key(), true).await.unwrap();
        let got = store.get_chunk(&chunks[0].key()).await.unwrap().unwrap();
        assert!(got.uploaded);
        let uploaded = store
            .chunks_for_file(&record.id)
            .await
            .unwrap()
            .iter()
            .filter(|c| c.uploaded)
            .count();
        assert_eq!(uploaded, 1);

        store.mark_uploaded(&chunks[0].key(), false).await.unwrap();
        assert!(!store.get_chunk(&chunks[0].key()).await.unwrap().unwrap().uploaded);

        let missing = record.id.chunk_key(99);
        let err = store.mark_uploaded(&missing, true).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    pub async fn deletes(store: &dyn ChunkStore) {
        let (a, a_chunks) = sample("a.bin", 8, 4);
        let (b, b_chunks) = sample("b.bin", 4, 4);
        for chunk in a_chunks.iter().chain(&b_chunks) {
            store.put_chunk(chunk, Bytes::from_static(b"zz")).await.unwrap();
        }
        store.put_file(&a).await.unwrap();
        store.put_file(&b).await.unwrap();

        store.delete_chunk(&a_chunks[0].key()).await.unwrap();
        assert!(store.get_chunk(&a_chunks[0].key()).await.unwrap().is_none());
        assert!(store.chunk_payload(&a_chunks[0].key()).await.unwrap().is_none());

        store.delete_file(&a.id).await.unwrap();
        assert!(store.get_file(&a.id).await.unwrap().is_none());
        assert_eq!(store.chunks_for_file(&a.id).await.unwrap().len(), 1);

        store.delete_all_for_file(&a.id).await.unwrap();
        assert!(store.chunks_for_file(&a.id).await.unwrap().is_empty());
        assert!(store.get_file(&b.id).await.unwrap().is_some());

        store.clear_all().await.unwrap();
        assert!(store.all_files().await.unwrap().is_empty());
        assert!(store.chunks_for_file(&b.id).await.unwrap().is_empty());
    }
}
