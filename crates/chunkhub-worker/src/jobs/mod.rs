//! Built-in job handler implementations.

pub mod cleanup;

pub use cleanup::ChunkCleanupHandler;
