//! # chunkhub-storage
//!
//! Server-side storage for ChunkHub: the local filesystem provider, the
//! per-file chunk holding area, merge coordination, stale-area cleanup and
//! the catalog of assembled files.

pub mod catalog;
pub mod chunked;
pub mod providers;

pub use catalog::FileCatalog;
pub use chunked::{ChunkedUploadHandler, MergeCoordinator, StaleUploadSweeper};
pub use providers::LocalStorageProvider;
