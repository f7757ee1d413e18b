//! # chunkhub-client
//!
//! Resumable upload client for ChunkHub. Files are cut into fixed-size
//! chunks by a [`SplitterPool`], persisted in a [`ChunkStore`], sent through
//! a [`Transport`] and merged server-side, all driven by the
//! [`UploadScheduler`]. Progress survives restarts: the store holds every
//! chunk until its file is merged.

pub mod events;
pub mod model;
pub mod scheduler;
pub mod splitter;
pub mod store;
pub mod transport;

pub use events::UploadEvent;
pub use model::{ChunkRecord, FileRecord, FileSource, UploadStatus};
pub use scheduler::{AddOutcome, UploadScheduler};
pub use splitter::SplitterPool;
pub use store::{ChunkStore, FsChunkStore, MemoryChunkStore};
pub use transport::{HttpTransport, Transport};
