//! Scheduled maintenance tasks for the ChunkHub upload server.
//!
//! This crate provides:
//! - A job handler trait and its execution error type
//! - A cron scheduler that runs registered handlers on a schedule
//! - The stale upload cleanup job

pub mod executor;
pub mod jobs;
pub mod scheduler;

pub use executor::{JobExecutionError, JobHandler};
pub use scheduler::CronScheduler;
