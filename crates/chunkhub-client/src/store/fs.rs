//! Durable chunk store on the local filesystem.
//!
//! Layout, one directory per file named by the file id's digest:
//!
//! ```text
//! {root}/{digest}/file.json
//! {root}/{digest}/chunks/{index}.json
//! {root}/{digest}/chunks/{index}.bin
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::fs;
use tracing::{debug, warn};

use chunkhub_core::error::{AppError, ErrorKind};
use chunkhub_core::result::AppResult;
use chunkhub_core::types::{ChunkKey, FileId};

use super::ChunkStore;
use crate::model::{ChunkRecord, FileRecord};

const FILE_RECORD: &str = "file.json";
const CHUNKS_DIR: &str = "chunks";

/// Filesystem-backed [`ChunkStore`].
#[derive(Debug, Clone)]
pub struct FsChunkStore {
    root: PathBuf,
}

impl FsChunkStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> AppResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .await
            .map_err(|e| persistence(e, "create store root", &root))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn file_dir(&self, file_id: &FileId) -> PathBuf {
        self.root.join(file_id.storage_name())
    }

    fn chunks_dir(&self, file_id: &FileId) -> PathBuf {
        self.file_dir(file_id).join(CHUNKS_DIR)
    }

    fn chunk_record_path(&self, key: &ChunkKey) -> PathBuf {
        self.chunks_dir(&key.file_id).join(format!("{}.json", key.index))
    }

    fn chunk_payload_path(&self, key: &ChunkKey) -> PathBuf {
        self.chunks_dir(&key.file_id).join(format!("{}.bin", key.index))
    }
}

fn persistence(e: std::io::Error, action: &str, path: &Path) -> AppError {
    AppError::with_source(
        ErrorKind::Persistence,
        format!("Failed to {action}: {}", path.display()),
        e,
    )
}

/// Write `data` to a hidden sibling of `path`, then rename it into place.
/// The parent directory must already exist.
async fn write_atomic(path: &Path, data: &[u8]) -> AppResult<()> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let staging = path.with_file_name(format!(".{name}.{}.tmp", uuid::Uuid::new_v4().simple()));

    if let Err(e) = fs::write(&staging, data).await {
        let _ = fs::remove_file(&staging).await;
        return Err(persistence(e, "write", path));
    }
    if let Err(e) = fs::rename(&staging, path).await {
        let _ = fs::remove_file(&staging).await;
        return Err(persistence(e, "commit", path));
    }
    Ok(())
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> AppResult<()> {
    let data = serde_json::to_vec_pretty(value)?;
    write_atomic(path, &data).await
}

async fn read_optional(path: &Path) -> AppResult<Option<Vec<u8>>> {
    match fs::read(path).await {
        Ok(data) => Ok(Some(data)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(persistence(e, "read", path)),
    }
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> AppResult<Option<T>> {
    match read_optional(path).await? {
        Some(data) => serde_json::from_slice(&data).map(Some).map_err(|e| {
            AppError::with_source(
                ErrorKind::Persistence,
                format!("Corrupt record: {}", path.display()),
                e,
            )
        }),
        None => Ok(None),
    }
}

async fn remove_file_if_exists(path: &Path) -> AppResult<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(persistence(e, "delete", path)),
    }
}

async fn remove_dir_if_exists(path: &Path) -> AppResult<()> {
    match fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(persistence(e, "delete", path)),
    }
}

#[async_trait]
impl ChunkStore for FsChunkStore {
    async fn put_file(&self, record: &FileRecord) -> AppResult<()> {
        let dir = self.file_dir(&record.id);
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| persistence(e, "create", &dir))?;
        write_json(&dir.join(FILE_RECORD), record).await
    }

    async fn get_file(&self, file_id: &FileId) -> AppResult<Option<FileRecord>> {
        read_json(&self.file_dir(file_id).join(FILE_RECORD)).await
    }

    async fn all_files(&self) -> AppResult<Vec<FileRecord>> {
        let mut dir = match fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(persistence(e, "list", &self.root)),
        };

        let mut records = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| persistence(e, "list", &self.root))?
        {
            let path = entry.path().join(FILE_RECORD);
            match read_json::<FileRecord>(&path).await {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable file record"),
            }
        }
        records.sort_by(|a, b| a.added_at.cmp(&b.added_at).then(a.id.cmp(&b.id)));
        Ok(records)
    }

    async fn put_chunk(&self, record: &ChunkRecord, payload: Bytes) -> AppResult<()> {
        let dir = self.chunks_dir(&record.file_id);
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| persistence(e, "create", &dir))?;

        let key = record.key();
        // Payload first so a visible record always has its bytes.
        write_atomic(&self.chunk_payload_path(&key), &payload).await?;
        write_json(&self.chunk_record_path(&key), record).await?;
        debug!(chunk = %key, bytes = payload.len(), "Persisted chunk");
        Ok(())
    }

    async fn get_chunk(&self, key: &ChunkKey) -> AppResult<Option<ChunkRecord>> {
        read_json(&self.chunk_record_path(key)).await
    }

    async fn chunk_payload(&self, key: &ChunkKey) -> AppResult<Option<Bytes>> {
        Ok(read_optional(&self.chunk_payload_path(key))
            .await?
            .map(Bytes::from))
    }

    async fn chunks_for_file(&self, file_id: &FileId) -> AppResult<Vec<ChunkRecord>> {
        let chunks_dir = self.chunks_dir(file_id);
        let mut dir = match fs::read_dir(&chunks_dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(persistence(e, "list", &chunks_dir)),
        };

        let mut chunks = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| persistence(e, "list", &chunks_dir))?
        {
            let path = entry.path();
            let is_record = path.extension().is_some_and(|ext| ext == "json")
                && !entry.file_name().to_string_lossy().starts_with('.');
            if !is_record {
                continue;
            }
            if let Some(record) = read_json::<ChunkRecord>(&path).await? {
                chunks.push(record);
            }
        }
        chunks.sort_by_key(|c| c.index);
        Ok(chunks)
    }

    async fn mark_uploaded(&self, key: &ChunkKey, uploaded: bool) -> AppResult<()> {
        let path = self.chunk_record_path(key);
        let mut record: ChunkRecord = read_json(&path)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Chunk not found: {key}")))?;
        if record.uploaded == uploaded {
            return Ok(());
        }
        record.uploaded = uploaded;
        write_json(&path, &record).await
    }

    async fn delete_chunk(&self, key: &ChunkKey) -> AppResult<()> {
        remove_file_if_exists(&self.chunk_record_path(key)).await?;
        remove_file_if_exists(&self.chunk_payload_path(key)).await
    }

    async fn delete_file(&self, file_id: &FileId) -> AppResult<()> {
        remove_file_if_exists(&self.file_dir(file_id).join(FILE_RECORD)).await
    }

    async fn delete_all_for_file(&self, file_id: &FileId) -> AppResult<()> {
        remove_dir_if_exists(&self.file_dir(file_id)).await
    }

    async fn clear_all(&self) -> AppResult<()> {
        let mut dir = match fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(persistence(e, "list", &self.root)),
        };
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| persistence(e, "list", &self.root))?
        {
            remove_dir_if_exists(&entry.path()).await?;
        }
        Ok(())
    }
}
