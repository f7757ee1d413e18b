//! Core traits defined in `chunkhub-core` and implemented by other crates.

pub mod storage;

pub use storage::StorageProvider;
