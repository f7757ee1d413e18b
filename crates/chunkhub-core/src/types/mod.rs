//! Core type definitions used across the ChunkHub workspace.

pub mod id;

pub use id::*;
