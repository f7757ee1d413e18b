//! # chunkhub-api
//!
//! HTTP API layer for the ChunkHub upload server, built on Axum.
//! Receives chunks, answers probes, merges files and serves the catalog
//! of assembled files.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use error::ApiError;
pub use router::build_router;
pub use state::AppState;
