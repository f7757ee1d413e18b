//! Merge coordinator: verifies a file's chunk set and assembles the final file.

use std::sync::Arc;

use dashmap::DashMap;
use futures::stream::{self, StreamExt, TryStreamExt};
use tokio::sync::Mutex;
use tracing::{info, warn};

use chunkhub_core::error::AppError;
use chunkhub_core::protocol::{MergeRequest, MergeResponse, validate_file_name};
use chunkhub_core::result::AppResult;
use chunkhub_core::traits::storage::{ByteStream, StorageProvider};
use chunkhub_core::types::FileId;

use super::upload::ChunkedUploadHandler;

/// Assembles received chunks into a final file.
///
/// Merges of the same file are serialized; merges of different files run
/// concurrently.
#[derive(Debug)]
pub struct MergeCoordinator {
    /// Handler for reading chunks.
    upload_handler: ChunkedUploadHandler,
    /// Storage provider holding the final files.
    provider: Arc<dyn StorageProvider>,
    /// Directory, relative to the provider root, of assembled files.
    files_root: String,
    /// Largest declared file size accepted.
    max_file_size: u64,
    /// One lock per file currently being merged.
    locks: DashMap<FileId, Arc<Mutex<()>>>,
}

impl MergeCoordinator {
    /// Create a new merge coordinator.
    pub fn new(
        upload_handler: ChunkedUploadHandler,
        provider: Arc<dyn StorageProvider>,
        files_root: impl Into<String>,
        max_file_size: u64,
    ) -> Self {
        Self {
            upload_handler,
            provider,
            files_root: files_root.into(),
            max_file_size,
            locks: DashMap::new(),
        }
    }

    /// Merge all chunks of `request.file_id` into `{files}/{request.file_name}`.
    ///
    /// Fails with [`AppError::missing_chunks`] when any index in
    /// `0..total_chunks` is absent, and with [`AppError::size_mismatch`] when
    /// the assembled length differs from the declared size. In both cases no
    /// final file is left behind and the chunks are kept.
    pub async fn merge(&self, request: &MergeRequest) -> AppResult<MergeResponse> {
        validate_file_name(&request.file_name)?;
        let file_id = FileId::new(request.file_id.clone())?;
        if request.file_size > self.max_file_size {
            return Err(AppError::validation(format!(
                "fileSize {} exceeds the limit of {} bytes",
                request.file_size, self.max_file_size
            )));
        }

        let lock = self.locks.entry(file_id.clone()).or_default().clone();
        let result = {
            let _guard = lock.lock().await;
            self.merge_locked(&file_id, request).await
        };
        drop(lock);
        self.locks
            .remove_if(&file_id, |_, lock| Arc::strong_count(lock) == 1);

        result
    }

    async fn merge_locked(
        &self,
        file_id: &FileId,
        request: &MergeRequest,
    ) -> AppResult<MergeResponse> {
        info!(
            file_id = %file_id,
            file_name = %request.file_name,
            total_chunks = request.total_chunks,
            "Merging chunks"
        );

        let missing = self
            .upload_handler
            .missing_chunks(file_id, request.total_chunks)
            .await?;
        if !missing.is_empty() {
            warn!(file_id = %file_id, missing = ?missing, "Merge rejected: chunks missing");
            return Err(AppError::missing_chunks(missing));
        }

        let final_path = self.final_path(&request.file_name);
        let partial_path = format!(
            "{}/.{}.merge-{}.tmp",
            self.files_root,
            request.file_name,
            uuid::Uuid::new_v4().simple()
        );

        let written = match self
            .provider
            .write_stream(&partial_path, self.chunk_stream(file_id, request.total_chunks))
            .await
        {
            Ok(written) => written,
            Err(e) => {
                let _ = self.provider.delete(&partial_path).await;
                return Err(e);
            }
        };

        if written != request.file_size {
            self.provider.delete(&partial_path).await?;
            warn!(
                file_id = %file_id,
                expected = request.file_size,
                actual = written,
                "Merge rejected: size mismatch"
            );
            return Err(AppError::size_mismatch(request.file_size, written));
        }

        if let Err(e) = self.provider.rename(&partial_path, &final_path).await {
            let _ = self.provider.delete(&partial_path).await;
            return Err(e);
        }

        if let Err(e) = self.upload_handler.delete_upload(file_id).await {
            warn!(file_id = %file_id, error = %e, "Failed to remove holding area after merge");
        }

        info!(file_id = %file_id, bytes = written, path = %final_path, "Merge complete");

        let file_path = self
            .provider
            .local_path(&final_path)
            .map(|p| p.display().to_string())
            .unwrap_or(final_path);

        Ok(MergeResponse {
            success: true,
            file_name: request.file_name.clone(),
            file_size: written,
            file_path,
        })
    }

    /// Concatenation of chunks `0..total_chunks` in index order.
    fn chunk_stream(&self, file_id: &FileId, total_chunks: u32) -> ByteStream {
        let handler = self.upload_handler.clone();
        let file_id = file_id.clone();
        let chunks = stream::iter(0..total_chunks)
            .then(move |index| {
                let handler = handler.clone();
                let file_id = file_id.clone();
                async move { handler.read_chunk(&file_id, index).await }
            })
            .map_err(std::io::Error::other)
            .try_flatten();
        Box::pin(chunks)
    }

    fn final_path(&self, file_name: &str) -> String {
        format!("{}/{}", self.files_root, file_name)
    }
}
