//! Upload client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings for the resumable upload client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the upload server.
    #[serde(default = "default_server_url")]
    pub server_url: String,
    /// Chunk size in bytes (default 1 MiB).
    #[serde(default = "default_chunk_size")]
    pub chunk_size_bytes: u64,
    /// Concurrent chunk transfers per file.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Concurrent chunk transfers across all files.
    #[serde(default = "default_global_concurrency")]
    pub global_concurrency: usize,
    /// Largest file accepted by `add_files` (default 1 GiB).
    #[serde(default = "default_max_file_size")]
    pub max_file_size_bytes: u64,
    /// Splitter worker threads (0 = available parallelism).
    #[serde(default)]
    pub splitter_workers: usize,
    /// Directory of the durable local chunk store.
    #[serde(default = "default_state_dir")]
    pub state_dir: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    /// Retry policy for failed chunk transfers.
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            chunk_size_bytes: default_chunk_size(),
            concurrency: default_concurrency(),
            global_concurrency: default_global_concurrency(),
            max_file_size_bytes: default_max_file_size(),
            splitter_workers: 0,
            state_dir: default_state_dir(),
            request_timeout_seconds: default_request_timeout(),
            retry: RetryConfig::default(),
        }
    }
}

/// Bounded exponential backoff for chunk transfers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Consecutive failures of one chunk before the file goes to Error.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds.
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
    /// Upper bound on any single delay, in milliseconds.
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
    /// Growth factor applied per attempt.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
            multiplier: default_multiplier(),
        }
    }
}

impl RetryConfig {
    /// Delay to wait after the given failed attempt (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let millis = self.initial_backoff_ms as f64 * self.multiplier.max(1.0).powi(exponent);
        Duration::from_millis(millis.min(self.max_backoff_ms as f64) as u64)
    }
}

fn default_server_url() -> String {
    "http://127.0.0.1:3001".to_string()
}

fn default_chunk_size() -> u64 {
    1_048_576 // 1 MiB
}

fn default_concurrency() -> usize {
    3
}

fn default_global_concurrency() -> usize {
    8
}

fn default_max_file_size() -> u64 {
    1_073_741_824 // 1 GiB
}

fn default_state_dir() -> String {
    "./.chunkhub".to_string()
}

fn default_request_timeout() -> u64 {
    60
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_backoff() -> u64 {
    1000
}

fn default_max_backoff() -> u64 {
    30_000
}

fn default_multiplier() -> f64 {
    2.0
}
