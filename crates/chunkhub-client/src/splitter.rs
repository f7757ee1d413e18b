//! Pool of long-lived threads that cut source files into chunks.
//!
//! Reading and copying chunk payloads is blocking work, so it runs on
//! dedicated OS threads rather than on the async runtime. Each split job
//! streams its chunks back through a bounded channel; the consumer's pace
//! throttles the reader, and dropping the receiver cancels the job.

use std::fs::File;
use std::io::{BufReader, Read};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, mpsc as std_mpsc};
use std::thread::{self, JoinHandle};

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use chunkhub_core::error::{AppError, ErrorKind};
use chunkhub_core::result::AppResult;

use crate::model::{ChunkSpan, FileSource, plan_chunks};

/// Chunks buffered per job before the reader blocks.
const CHANNEL_DEPTH: usize = 4;

/// One chunk cut from a source file.
#[derive(Debug, Clone)]
pub struct SplitChunk {
    pub span: ChunkSpan,
    pub payload: Bytes,
}

struct SplitJob {
    path: PathBuf,
    spans: Vec<ChunkSpan>,
    tx: mpsc::Sender<AppResult<SplitChunk>>,
}

/// Explicitly owned pool of splitter threads.
#[derive(Debug)]
pub struct SplitterPool {
    sender: Mutex<Option<std_mpsc::Sender<SplitJob>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    size: usize,
}

impl SplitterPool {
    /// Start `workers` threads; `0` means one per available CPU.
    pub fn new(workers: usize) -> AppResult<Self> {
        let size = if workers == 0 {
            thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1)
        } else {
            workers
        };

        let (sender, receiver) = std_mpsc::channel::<SplitJob>();
        let receiver = Arc::new(Mutex::new(receiver));

        let mut handles = Vec::with_capacity(size);
        for i in 0..size {
            let receiver = Arc::clone(&receiver);
            let handle = thread::Builder::new()
                .name(format!("chunk-splitter-{i}"))
                .spawn(move || worker_loop(&receiver))
                .map_err(|e| {
                    AppError::with_source(ErrorKind::Internal, "Failed to spawn splitter thread", e)
                })?;
            handles.push(handle);
        }

        debug!(workers = size, "Splitter pool started");
        Ok(Self {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(handles),
            size,
        })
    }

    /// Number of worker threads.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Queue `source` for splitting into `chunk_size` pieces.
    ///
    /// Chunks arrive in index order. A read failure is delivered as the
    /// last item.
    pub fn split(
        &self,
        source: &FileSource,
        chunk_size: u64,
    ) -> AppResult<mpsc::Receiver<AppResult<SplitChunk>>> {
        let (tx, rx) = mpsc::channel(CHANNEL_DEPTH);
        let job = SplitJob {
            path: source.path.clone(),
            spans: plan_chunks(source.size, chunk_size),
            tx,
        };

        let sender = self
            .sender
            .lock()
            .map_err(|_| AppError::internal("Splitter pool lock poisoned"))?;
        sender
            .as_ref()
            .ok_or_else(|| AppError::service_unavailable("Splitter pool is shut down"))?
            .send(job)
            .map_err(|_| AppError::service_unavailable("Splitter pool is shut down"))?;
        Ok(rx)
    }

    /// Stop accepting jobs and wait for the workers to finish.
    pub fn shutdown(&self) {
        if let Ok(mut sender) = self.sender.lock() {
            sender.take();
        }
        let handles = match self.workers.lock() {
            Ok(mut workers) => std::mem::take(&mut *workers),
            Err(_) => return,
        };
        for handle in handles {
            if handle.join().is_err() {
                warn!("Splitter thread panicked");
            }
        }
        debug!("Splitter pool stopped");
    }
}

impl Drop for SplitterPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(receiver: &Mutex<std_mpsc::Receiver<SplitJob>>) {
    loop {
        let job = {
            let Ok(receiver) = receiver.lock() else {
                return;
            };
            match receiver.recv() {
                Ok(job) => job,
                Err(_) => return,
            }
        };
        run_job(job);
    }
}

fn run_job(job: SplitJob) {
    let read_error = |e: std::io::Error| {
        AppError::with_source(
            ErrorKind::Storage,
            format!("Failed to read source file: {}", job.path.display()),
            e,
        )
    };

    let mut reader = match File::open(&job.path) {
        Ok(file) => BufReader::new(file),
        Err(e) => {
            let _ = job.tx.blocking_send(Err(read_error(e)));
            return;
        }
    };

    for span in &job.spans {
        let mut buf = vec![0u8; (span.end - span.start) as usize];
        if let Err(e) = reader.read_exact(&mut buf) {
            let _ = job.tx.blocking_send(Err(read_error(e)));
            return;
        }
        let chunk = SplitChunk {
            span: *span,
            payload: Bytes::from(buf),
        };
        if job.tx.blocking_send(Ok(chunk)).is_err() {
            debug!(path = %job.path.display(), index = span.index, "Split cancelled");
            return;
        }
    }
}
