//! Chunked upload handling on the receiving side.

pub mod assembler;
pub mod cleanup;
pub mod upload;

pub use assembler::MergeCoordinator;
pub use cleanup::{StaleUploadSweeper, SweepReport};
pub use upload::ChunkedUploadHandler;
