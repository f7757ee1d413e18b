//! HTTP request handlers, one module per route group.

pub mod files;
pub mod health;
pub mod upload;
