//! # chunkhub-core
//!
//! Core crate for ChunkHub. Contains the storage trait, configuration
//! schemas, typed identifiers, the HTTP wire protocol shared by the
//! server and the upload client, and the unified error system.
//!
//! This crate has **no** internal dependencies on other ChunkHub crates.

pub mod config;
pub mod error;
pub mod protocol;
pub mod result;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
