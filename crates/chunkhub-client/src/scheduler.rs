//! Upload scheduler: the per-file state machine and chunk dispatch.
//!
//! Every tracked file is an entry keyed by its [`FileId`]. Status changes go
//! through one transition routine, which checks the allowed source
//! states, persists the record and publishes the new status on the entry's
//! watch channel. Dispatch runs one task per file with a fixed number of
//! slots pulling indices from a shared queue; a semaphore shared by all
//! files caps the total number of transfers in flight.
//!
//! ```text
//! Pending ──start──▶ Uploading ──merge ok──▶ Success
//!                      │   ▲
//!                 pause│   │resume
//!                      ▼   │
//!                     Paused ◀──pause── Error ◀──retries exhausted── Uploading
//! any ──remove──▶ Cancelled
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::future::join_all;
use tokio::sync::{Mutex, Semaphore, broadcast, watch};
use tracing::{debug, info, warn};

use chunkhub_core::config::ClientConfig;
use chunkhub_core::error::{AppError, ErrorKind};
use chunkhub_core::protocol::{MergeRequest, MergeResponse};
use chunkhub_core::result::AppResult;
use chunkhub_core::types::{ChunkKey, FileId};

use crate::events::UploadEvent;
use crate::model::{ChunkRecord, FileRecord, FileSource, UploadStatus};
use crate::splitter::SplitterPool;
use crate::store::ChunkStore;
use crate::transport::{ChunkUpload, Transport};

const EVENT_CAPACITY: usize = 256;
const SPEED_SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

/// Result of offering one file to [`UploadScheduler::add_files`].
#[derive(Debug, Clone)]
pub enum AddOutcome {
    /// Tracked now, either freshly split or restored from the store.
    Added(FileId),
    /// Already tracked; nothing changed.
    Duplicate(FileId),
    /// Not uploadable. Oversized files stay tracked in Error.
    Failed { file_id: FileId, error: AppError },
}

struct SpeedSampler {
    at: Instant,
    bytes: u64,
}

struct EntryState {
    record: FileRecord,
    sampler: SpeedSampler,
}

struct FileEntry {
    id: FileId,
    state: Mutex<EntryState>,
    status: watch::Sender<UploadStatus>,
    /// Held by the dispatch run; runs of one file never overlap.
    run_lock: Mutex<()>,
}

impl FileEntry {
    fn new(record: FileRecord) -> Arc<Self> {
        let (status, _) = watch::channel(record.status);
        Arc::new(Self {
            id: record.id.clone(),
            state: Mutex::new(EntryState {
                sampler: SpeedSampler {
                    at: Instant::now(),
                    bytes: record.uploaded_bytes,
                },
                record,
            }),
            status,
            run_lock: Mutex::new(()),
        })
    }

    fn status(&self) -> UploadStatus {
        *self.status.borrow()
    }

    fn is_uploading(&self) -> bool {
        self.status() == UploadStatus::Uploading
    }

    async fn snapshot(&self) -> FileRecord {
        self.state.lock().await.record.clone()
    }
}

/// Claim on a file id while `add_files` prepares it. Released on drop.
struct Reservation<'a> {
    preparing: &'a DashMap<FileId, ()>,
    file_id: FileId,
}

impl<'a> Reservation<'a> {
    fn acquire(preparing: &'a DashMap<FileId, ()>, file_id: &FileId) -> Option<Self> {
        match preparing.entry(file_id.clone()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(());
                Some(Self {
                    preparing,
                    file_id: file_id.clone(),
                })
            }
        }
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        self.preparing.remove(&self.file_id);
    }
}

/// State of one dispatch pass over a file.
struct Run {
    queue: Mutex<VecDeque<u32>>,
    failure: Mutex<Option<AppError>>,
    sizes: HashMap<u32, u64>,
    file_name: String,
    total_chunks: u32,
}

impl Run {
    async fn failed(&self) -> bool {
        self.failure.lock().await.is_some()
    }

    async fn fail(&self, error: AppError) {
        let mut failure = self.failure.lock().await;
        if failure.is_none() {
            *failure = Some(error);
        }
    }
}

struct Inner {
    config: ClientConfig,
    store: Arc<dyn ChunkStore>,
    transport: Arc<dyn Transport>,
    splitter: Arc<SplitterPool>,
    entries: DashMap<FileId, Arc<FileEntry>>,
    /// Ids being split or loaded by `add_files`, not yet in `entries`.
    preparing: DashMap<FileId, ()>,
    global: Semaphore,
    events: broadcast::Sender<UploadEvent>,
}

/// Orchestrates splitting, persistence, transfer and merge for many files.
///
/// Cheap to clone; clones share the same tracked set.
#[derive(Clone)]
pub struct UploadScheduler {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for UploadScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadScheduler")
            .field("tracked", &self.inner.entries.len())
            .field("store", &self.inner.store)
            .field("transport", &self.inner.transport)
            .finish_non_exhaustive()
    }
}

impl UploadScheduler {
    pub fn new(
        config: ClientConfig,
        store: Arc<dyn ChunkStore>,
        transport: Arc<dyn Transport>,
        splitter: Arc<SplitterPool>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                global: Semaphore::new(config.global_concurrency.max(1)),
                config,
                store,
                transport,
                splitter,
                entries: DashMap::new(),
                preparing: DashMap::new(),
                events,
            }),
        }
    }

    /// Receive lifecycle events from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<UploadEvent> {
        self.inner.events.subscribe()
    }

    /// Snapshots of every tracked file, oldest first.
    pub async fn files(&self) -> Vec<FileRecord> {
        let entries: Vec<Arc<FileEntry>> = self
            .inner
            .entries
            .iter()
            .map(|e| Arc::clone(e.value()))
            .collect();
        let mut records = Vec::with_capacity(entries.len());
        for entry in entries {
            records.push(entry.snapshot().await);
        }
        records.sort_by(|a, b| a.added_at.cmp(&b.added_at).then(a.id.cmp(&b.id)));
        records
    }

    /// Snapshot of one tracked file.
    pub async fn file(&self, file_id: &FileId) -> Option<FileRecord> {
        let entry = self.entry(file_id).ok()?;
        Some(entry.snapshot().await)
    }

    fn entry(&self, file_id: &FileId) -> AppResult<Arc<FileEntry>> {
        self.inner
            .entries
            .get(file_id)
            .map(|e| Arc::clone(e.value()))
            .ok_or_else(|| AppError::not_found(format!("File not tracked: {file_id}")))
    }

    fn emit(&self, event: UploadEvent) {
        // No subscribers is fine.
        let _ = self.inner.events.send(event);
    }

    // ── Adding files ─────────────────────────────────────────

    /// Track `sources`, splitting and persisting each new one.
    ///
    /// With `auto_start` every added file moves to Uploading immediately.
    pub async fn add_files(&self, sources: Vec<FileSource>, auto_start: bool) -> Vec<AddOutcome> {
        let mut outcomes = Vec::with_capacity(sources.len());
        for source in sources {
            outcomes.push(self.add_file(source, auto_start).await);
        }
        outcomes
    }

    async fn add_file(&self, source: FileSource, auto_start: bool) -> AddOutcome {
        let file_id = source.id();
        // Held until the entry is tracked, so a concurrent add of the same
        // file never splits it or touches its stored chunks.
        let Some(_reservation) = Reservation::acquire(&self.inner.preparing, &file_id) else {
            debug!(file_id = %file_id, "File already being added");
            return AddOutcome::Duplicate(file_id);
        };
        if self.inner.entries.contains_key(&file_id) {
            debug!(file_id = %file_id, "File already tracked");
            return AddOutcome::Duplicate(file_id);
        }

        let max = self.inner.config.max_file_size_bytes;
        if source.size > max {
            let error = AppError::validation(format!(
                "{} is {} bytes, larger than the {max} byte limit",
                source.name, source.size
            ));
            let mut record = FileRecord::new(&source, self.inner.config.chunk_size_bytes);
            record.status = UploadStatus::Error;
            record.last_error = Some(error.message.clone());
            if !self.track(record) {
                return AddOutcome::Duplicate(file_id);
            }
            self.emit(UploadEvent::Added {
                file_id: file_id.clone(),
            });
            self.emit(UploadEvent::Error {
                file_id: file_id.clone(),
                message: error.message.clone(),
            });
            return AddOutcome::Failed { file_id, error };
        }

        let record = match self.load_or_split(&source).await {
            Ok(record) => record,
            Err(error) => {
                warn!(file_id = %file_id, error = %error, "Failed to prepare file");
                return AddOutcome::Failed { file_id, error };
            }
        };

        if !self.track(record) {
            return AddOutcome::Duplicate(file_id);
        }
        info!(file_id = %file_id, size = source.size, "File added");
        self.emit(UploadEvent::Added {
            file_id: file_id.clone(),
        });

        if auto_start {
            if let Err(e) = self.start_upload(&file_id).await {
                warn!(file_id = %file_id, error = %e, "Auto-start failed");
            }
        }
        AddOutcome::Added(file_id)
    }

    /// Insert a new entry. `false` when the id is already tracked.
    fn track(&self, record: FileRecord) -> bool {
        match self.inner.entries.entry(record.id.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(FileEntry::new(record));
                true
            }
        }
    }

    /// Reuse the persisted record of this file, or split it into the store.
    async fn load_or_split(&self, source: &FileSource) -> AppResult<FileRecord> {
        let file_id = source.id();
        if let Some(mut record) = self.inner.store.get_file(&file_id).await? {
            debug!(file_id = %file_id, "Reusing persisted upload state");
            self.reconcile(&mut record).await?;
            record.status = UploadStatus::Pending;
            record.last_error = None;
            record.speed_bytes_per_sec = 0.0;
            record.eta_seconds = None;
            record.source_path = Some(source.path.clone());
            self.inner.store.put_file(&record).await?;
            return Ok(record);
        }

        match self.split_into_store(source).await {
            Ok(record) => Ok(record),
            Err(e) => {
                if let Err(cleanup) = self.inner.store.delete_all_for_file(&file_id).await {
                    warn!(file_id = %file_id, error = %cleanup, "Failed to discard partial split");
                }
                Err(e)
            }
        }
    }

    async fn split_into_store(&self, source: &FileSource) -> AppResult<FileRecord> {
        let chunk_size = self.inner.config.chunk_size_bytes;
        let record = FileRecord::new(source, chunk_size);
        let mut chunks = self.inner.splitter.split(source, chunk_size)?;

        let mut received = 0u32;
        while let Some(chunk) = chunks.recv().await {
            let chunk = chunk?;
            let chunk_record = ChunkRecord::new(record.id.clone(), chunk.span);
            self.inner.store.put_chunk(&chunk_record, chunk.payload).await?;
            received += 1;
        }
        if received != record.total_chunks {
            return Err(AppError::internal(format!(
                "Split produced {received} of {} chunks",
                record.total_chunks
            )));
        }

        // The file record goes last: its presence means every chunk is stored.
        self.inner.store.put_file(&record).await?;
        debug!(file_id = %record.id, chunks = received, "File split");
        Ok(record)
    }

    /// Recompute the uploaded counters of `record` from its chunk records.
    async fn reconcile(&self, record: &mut FileRecord) -> AppResult<Vec<ChunkRecord>> {
        let chunks = self.inner.store.chunks_for_file(&record.id).await?;
        let uploaded = chunks.iter().filter(|c| c.uploaded);
        record.uploaded_chunks = u32::try_from(uploaded.clone().count()).unwrap_or(u32::MAX);
        record.uploaded_bytes = uploaded.map(ChunkRecord::size).sum();
        Ok(chunks)
    }

    // ── State transitions ────────────────────────────────────

    /// Move `entry` from one of `from` to `to`.
    ///
    /// The outer error means the transition is not allowed. The inner one
    /// means the new state could not be persisted; the in-memory state has
    /// changed regardless.
    async fn transition(
        &self,
        entry: &FileEntry,
        from: &[UploadStatus],
        to: UploadStatus,
    ) -> AppResult<AppResult<()>> {
        let mut state = entry.state.lock().await;
        let current = state.record.status;
        if !from.contains(&current) {
            return Err(AppError::conflict(format!(
                "Cannot move {} from {current} to {to}",
                entry.id
            )));
        }

        let EntryState { record, sampler } = &mut *state;
        record.status = to;
        match to {
            UploadStatus::Uploading => {
                record.last_error = None;
                *sampler = SpeedSampler {
                    at: Instant::now(),
                    bytes: record.uploaded_bytes,
                };
            }
            UploadStatus::Paused => {
                record.speed_bytes_per_sec = 0.0;
                record.eta_seconds = None;
            }
            _ => {}
        }
        entry.status.send_replace(to);
        debug!(file_id = %entry.id, from = %current, to = %to, "Status changed");

        Ok(self.inner.store.put_file(record).await)
    }

    /// Pending → Uploading.
    pub async fn start_upload(&self, file_id: &FileId) -> AppResult<()> {
        let entry = self.entry(file_id)?;
        let persisted = self
            .transition(&entry, &[UploadStatus::Pending], UploadStatus::Uploading)
            .await?;
        self.emit(UploadEvent::Started {
            file_id: file_id.clone(),
        });
        self.spawn_run(entry);
        persisted
    }

    /// Uploading or Error → Paused. Transfers already in flight finish but
    /// their results are discarded.
    pub async fn pause_upload(&self, file_id: &FileId) -> AppResult<()> {
        let entry = self.entry(file_id)?;
        if entry.snapshot().await.size > self.inner.config.max_file_size_bytes {
            return Err(AppError::conflict(format!(
                "{file_id} exceeds the maximum file size and cannot be resumed"
            )));
        }
        let persisted = self
            .transition(
                &entry,
                &[UploadStatus::Uploading, UploadStatus::Error],
                UploadStatus::Paused,
            )
            .await?;
        info!(file_id = %file_id, "Upload paused");
        self.emit(UploadEvent::Paused {
            file_id: file_id.clone(),
        });
        persisted
    }

    /// Paused → Uploading; dispatch restarts from the persisted chunk state.
    pub async fn resume_upload(&self, file_id: &FileId) -> AppResult<()> {
        let entry = self.entry(file_id)?;
        let persisted = self
            .transition(&entry, &[UploadStatus::Paused], UploadStatus::Uploading)
            .await?;
        info!(file_id = %file_id, "Upload resumed");
        self.emit(UploadEvent::Resumed {
            file_id: file_id.clone(),
        });
        self.spawn_run(entry);
        persisted
    }

    /// Pause every uploading file. Returns how many were paused.
    pub async fn pause_all(&self) -> usize {
        let ids: Vec<FileId> = self
            .inner
            .entries
            .iter()
            .filter(|e| e.value().is_uploading())
            .map(|e| e.key().clone())
            .collect();

        let mut paused = 0;
        for id in ids {
            match self.pause_upload(&id).await {
                Ok(()) => paused += 1,
                Err(e) if e.kind == ErrorKind::Persistence => {
                    paused += 1;
                    warn!(file_id = %id, error = %e, "Paused, but state not persisted");
                }
                Err(e) => debug!(file_id = %id, error = %e, "Not paused"),
            }
        }
        paused
    }

    /// Cancel a file, untrack it and delete its local data.
    pub async fn remove_file(&self, file_id: &FileId) -> AppResult<()> {
        let (_, entry) = self
            .inner
            .entries
            .remove(file_id)
            .ok_or_else(|| AppError::not_found(format!("File not tracked: {file_id}")))?;
        self.cancel(&entry).await;
        info!(file_id = %file_id, "File removed");
        self.inner.store.delete_all_for_file(file_id).await
    }

    /// Cancel every file and wipe the store.
    pub async fn clear_all(&self) -> AppResult<()> {
        let entries: Vec<Arc<FileEntry>> = self
            .inner
            .entries
            .iter()
            .map(|e| Arc::clone(e.value()))
            .collect();
        self.inner.entries.clear();
        for entry in &entries {
            self.cancel(entry).await;
        }
        info!(count = entries.len(), "All files cleared");
        self.inner.store.clear_all().await
    }

    async fn cancel(&self, entry: &FileEntry) {
        {
            let mut state = entry.state.lock().await;
            state.record.status = UploadStatus::Cancelled;
            entry.status.send_replace(UploadStatus::Cancelled);
        }
        self.emit(UploadEvent::Removed {
            file_id: entry.id.clone(),
        });
    }

    /// Track every persisted file not tracked yet, with counters recomputed
    /// from their chunk records.
    ///
    /// Both Uploading and Pending records come back Paused: a restored file
    /// never starts transferring until it is resumed explicitly, even if it
    /// had not been started before the restart.
    pub async fn restore_uploads(&self) -> AppResult<usize> {
        let records = self.inner.store.all_files().await?;
        let mut restored = 0;

        for mut record in records {
            let Some(_reservation) = Reservation::acquire(&self.inner.preparing, &record.id)
            else {
                continue;
            };
            if self.inner.entries.contains_key(&record.id) {
                continue;
            }
            self.reconcile(&mut record).await?;
            if matches!(
                record.status,
                UploadStatus::Pending | UploadStatus::Uploading
            ) {
                record.status = UploadStatus::Paused;
            }
            record.speed_bytes_per_sec = 0.0;
            record.eta_seconds = None;
            if let Err(e) = self.inner.store.put_file(&record).await {
                warn!(file_id = %record.id, error = %e, "Failed to persist restored state");
            }

            let file_id = record.id.clone();
            if self.track(record) {
                restored += 1;
                self.emit(UploadEvent::Added { file_id });
            }
        }

        info!(restored, "Restored persisted uploads");
        Ok(restored)
    }

    /// Wait until `file_id` is not uploading and its dispatch run has ended.
    pub async fn wait_idle(&self, file_id: &FileId) -> AppResult<FileRecord> {
        let entry = self.entry(file_id)?;
        wait_until_stopped(entry.status.subscribe()).await;
        let _run = entry.run_lock.lock().await;
        Ok(entry.snapshot().await)
    }

    /// Pause everything and wait for in-flight transfers to drain.
    pub async fn shutdown(&self) {
        self.pause_all().await;
        let entries: Vec<Arc<FileEntry>> = self
            .inner
            .entries
            .iter()
            .map(|e| Arc::clone(e.value()))
            .collect();
        for entry in entries {
            let _run = entry.run_lock.lock().await;
        }
        debug!("Upload scheduler drained");
    }

    // ── Dispatch ─────────────────────────────────────────────

    fn spawn_run(&self, entry: Arc<FileEntry>) {
        let scheduler = self.clone();
        tokio::spawn(async move {
            let _run = entry.run_lock.lock().await;
            scheduler.run_file(&entry).await;
        });
    }

    async fn run_file(&self, entry: &FileEntry) {
        // One extra pass when the server reports chunks it lost.
        for pass in 0..2 {
            match self.upload_pending_chunks(entry).await {
                Ok(true) => {}
                Ok(false) => return,
                Err(e) => {
                    self.fail(entry, e).await;
                    return;
                }
            }

            let request = {
                let state = entry.state.lock().await;
                if state.record.status != UploadStatus::Uploading {
                    return;
                }
                MergeRequest {
                    file_id: entry.id.to_string(),
                    file_name: state.record.name.clone(),
                    total_chunks: state.record.total_chunks,
                    file_size: state.record.size,
                }
            };

            debug!(file_id = %entry.id, "Requesting merge");
            match self.inner.transport.merge_file(&request).await {
                Ok(response) => {
                    self.complete(entry, response).await;
                    return;
                }
                Err(e) if pass == 0 && e.kind == ErrorKind::MissingChunks => {
                    let missing = e.missing_chunk_indices().unwrap_or_default();
                    warn!(file_id = %entry.id, missing = ?missing, "Server is missing chunks, re-sending");
                    if let Err(e) = self.reset_chunks(entry, &missing).await {
                        self.fail(entry, e).await;
                        return;
                    }
                }
                Err(e) => {
                    self.fail(entry, e).await;
                    return;
                }
            }
        }
    }

    /// Send every chunk not yet uploaded. `Ok(true)` when all are
    /// acknowledged, `Ok(false)` when the file stopped uploading.
    async fn upload_pending_chunks(&self, entry: &FileEntry) -> AppResult<bool> {
        loop {
            let run = {
                let mut state = entry.state.lock().await;
                if state.record.status != UploadStatus::Uploading {
                    return Ok(false);
                }
                let chunks = self.reconcile(&mut state.record).await?;
                if chunks.len() != state.record.total_chunks as usize {
                    return Err(AppError::persistence(format!(
                        "Local data of {} is incomplete: {} of {} chunks",
                        entry.id,
                        chunks.len(),
                        state.record.total_chunks
                    )));
                }
                state.sampler = SpeedSampler {
                    at: Instant::now(),
                    bytes: state.record.uploaded_bytes,
                };
                Run {
                    queue: Mutex::new(
                        chunks.iter().filter(|c| !c.uploaded).map(|c| c.index).collect(),
                    ),
                    failure: Mutex::new(None),
                    sizes: chunks.iter().map(|c| (c.index, c.size())).collect(),
                    file_name: state.record.name.clone(),
                    total_chunks: state.record.total_chunks,
                }
            };

            let slots = self.inner.config.concurrency.max(1);
            join_all((0..slots).map(|_| self.slot(entry, &run))).await;

            if let Some(e) = run.failure.into_inner() {
                return Err(e);
            }
            if !entry.is_uploading() {
                return Ok(false);
            }
            if entry.state.lock().await.record.all_chunks_uploaded() {
                return Ok(true);
            }
            // A pause/resume in the middle of the pass left indices behind.
            debug!(file_id = %entry.id, "Rescanning chunk state");
        }
    }

    async fn slot(&self, entry: &FileEntry, run: &Run) {
        loop {
            if !entry.is_uploading() || run.failed().await {
                return;
            }
            let Some(index) = run.queue.lock().await.pop_front() else {
                return;
            };
            if let Err(e) = self.send_with_retry(entry, run, index).await {
                run.fail(e).await;
                return;
            }
        }
    }

    /// Transfer one chunk, retrying retryable failures with backoff.
    async fn send_with_retry(&self, entry: &FileEntry, run: &Run, index: u32) -> AppResult<()> {
        let key = entry.id.chunk_key(index);
        let retry = &self.inner.config.retry;
        let mut attempt = 0u32;

        loop {
            let result = {
                let _permit = self
                    .inner
                    .global
                    .acquire()
                    .await
                    .map_err(|_| AppError::service_unavailable("Upload scheduler closed"))?;
                if !entry.is_uploading() {
                    return Ok(());
                }
                self.transfer_chunk(&key, run).await
            };

            match result {
                Ok(()) => {
                    let size = run.sizes.get(&index).copied().unwrap_or_default();
                    self.record_chunk_done(entry, &key, size).await;
                    return Ok(());
                }
                Err(e) if e.is_retryable() => {
                    attempt += 1;
                    if attempt >= retry.max_attempts {
                        warn!(chunk = %key, attempts = attempt, error = %e, "Giving up on chunk");
                        return Err(e);
                    }
                    let delay = retry.backoff(attempt);
                    warn!(
                        chunk = %key,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Chunk transfer failed, retrying"
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = wait_until_stopped(entry.status.subscribe()) => return Ok(()),
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Probe, then upload if the server does not have the chunk.
    async fn transfer_chunk(&self, key: &ChunkKey, run: &Run) -> AppResult<()> {
        let exists = match self.inner.transport.probe_chunk(key).await {
            Ok(exists) => exists,
            Err(e) => {
                warn!(chunk = %key, error = %e, "Probe failed, uploading anyway");
                false
            }
        };
        if exists {
            debug!(chunk = %key, "Chunk already on server");
            return Ok(());
        }

        let payload = self
            .inner
            .store
            .chunk_payload(key)
            .await?
            .ok_or_else(|| AppError::persistence(format!("Payload missing for chunk {key}")))?;
        self.inner
            .transport
            .upload_chunk(ChunkUpload {
                key: key.clone(),
                file_name: run.file_name.clone(),
                total_chunks: run.total_chunks,
                payload,
            })
            .await?;
        debug!(chunk = %key, "Chunk uploaded");
        Ok(())
    }

    async fn record_chunk_done(&self, entry: &FileEntry, key: &ChunkKey, size: u64) {
        let mut state = entry.state.lock().await;
        if state.record.status != UploadStatus::Uploading {
            debug!(chunk = %key, status = %state.record.status, "Discarding chunk result");
            return;
        }

        if let Err(e) = self.inner.store.mark_uploaded(key, true).await {
            warn!(chunk = %key, error = %e, "Failed to persist uploaded flag; keeping in-memory count");
        }

        let EntryState { record, sampler } = &mut *state;
        record.uploaded_chunks = (record.uploaded_chunks + 1).min(record.total_chunks);
        record.uploaded_bytes = (record.uploaded_bytes + size).min(record.size);

        let now = Instant::now();
        let elapsed = now.duration_since(sampler.at);
        if elapsed >= SPEED_SAMPLE_INTERVAL {
            let speed = (record.uploaded_bytes - sampler.bytes) as f64 / elapsed.as_secs_f64();
            record.speed_bytes_per_sec = speed;
            record.eta_seconds = (speed > 0.0)
                .then(|| ((record.size - record.uploaded_bytes) as f64 / speed).ceil() as u64);
            *sampler = SpeedSampler {
                at: now,
                bytes: record.uploaded_bytes,
            };
        }

        if let Err(e) = self.inner.store.put_file(record).await {
            warn!(file_id = %record.id, error = %e, "Failed to persist progress");
        }

        let event = UploadEvent::Progress {
            file_id: record.id.clone(),
            uploaded_chunks: record.uploaded_chunks,
            total_chunks: record.total_chunks,
            progress_percent: record.progress_percent(),
            speed_bytes_per_sec: record.speed_bytes_per_sec,
            eta_seconds: record.eta_seconds,
        };
        drop(state);
        self.emit(event);
    }

    /// Clear the uploaded flag of chunks the server reported missing.
    async fn reset_chunks(&self, entry: &FileEntry, missing: &[u32]) -> AppResult<()> {
        let mut state = entry.state.lock().await;
        for &index in missing {
            self.inner
                .store
                .mark_uploaded(&entry.id.chunk_key(index), false)
                .await?;
        }
        self.reconcile(&mut state.record).await?;
        self.inner.store.put_file(&state.record).await
    }

    async fn complete(&self, entry: &FileEntry, response: MergeResponse) {
        {
            let mut state = entry.state.lock().await;
            // A merge that finished after a pause still produced the file.
            if !matches!(
                state.record.status,
                UploadStatus::Uploading | UploadStatus::Paused
            ) {
                return;
            }
            let record = &mut state.record;
            record.status = UploadStatus::Success;
            record.uploaded_chunks = record.total_chunks;
            record.uploaded_bytes = record.size;
            record.speed_bytes_per_sec = 0.0;
            record.eta_seconds = Some(0);
            record.last_error = None;
            entry.status.send_replace(UploadStatus::Success);
        }

        info!(file_id = %entry.id, path = %response.file_path, bytes = response.file_size, "Upload complete");
        self.emit(UploadEvent::Success {
            file_id: entry.id.clone(),
            file_path: response.file_path,
        });

        if let Err(e) = self.inner.store.delete_all_for_file(&entry.id).await {
            warn!(file_id = %entry.id, error = %e, "Failed to purge local data of finished upload");
        }
    }

    async fn fail(&self, entry: &FileEntry, error: AppError) {
        {
            let mut state = entry.state.lock().await;
            if state.record.status != UploadStatus::Uploading {
                return;
            }
            state.record.status = UploadStatus::Error;
            state.record.last_error = Some(error.to_string());
            state.record.speed_bytes_per_sec = 0.0;
            state.record.eta_seconds = None;
            entry.status.send_replace(UploadStatus::Error);
            if let Err(e) = self.inner.store.put_file(&state.record).await {
                warn!(file_id = %entry.id, error = %e, "Failed to persist error state");
            }
        }

        warn!(file_id = %entry.id, error = %error, "Upload failed");
        self.emit(UploadEvent::Error {
            file_id: entry.id.clone(),
            message: error.to_string(),
        });
    }
}

/// Resolve once the watched status is anything but Uploading.
async fn wait_until_stopped(mut status: watch::Receiver<UploadStatus>) {
    loop {
        if *status.borrow_and_update() != UploadStatus::Uploading {
            return;
        }
        if status.changed().await.is_err() {
            return;
        }
    }
}
