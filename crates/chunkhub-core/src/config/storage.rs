//! Server-side storage configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Where the server keeps in-progress chunks and assembled files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory for all upload data.
    #[serde(default = "default_upload_root")]
    pub upload_root: String,
    /// Sub-directory of `upload_root` holding per-file chunk areas.
    #[serde(default = "default_temp_dir")]
    pub temp_dir_name: String,
    /// Sub-directory of `upload_root` holding assembled files.
    #[serde(default = "default_files_dir")]
    pub files_dir_name: String,
    /// Maximum declared file size accepted by merge (default 1 GiB).
    #[serde(default = "default_max_upload")]
    pub max_upload_size_bytes: u64,
    /// Maximum accepted size of a single chunk request body (default 16 MiB).
    #[serde(default = "default_max_chunk")]
    pub max_chunk_request_bytes: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_root: default_upload_root(),
            temp_dir_name: default_temp_dir(),
            files_dir_name: default_files_dir(),
            max_upload_size_bytes: default_max_upload(),
            max_chunk_request_bytes: default_max_chunk(),
        }
    }
}

impl StorageConfig {
    /// Absolute-or-relative path of the chunk holding area.
    pub fn temp_dir(&self) -> PathBuf {
        PathBuf::from(&self.upload_root).join(&self.temp_dir_name)
    }

    /// Absolute-or-relative path of the assembled files directory.
    pub fn files_dir(&self) -> PathBuf {
        PathBuf::from(&self.upload_root).join(&self.files_dir_name)
    }
}

fn default_upload_root() -> String {
    "./uploads".to_string()
}

fn default_temp_dir() -> String {
    "temp".to_string()
}

fn default_files_dir() -> String {
    "files".to_string()
}

fn default_max_upload() -> u64 {
    1_073_741_824 // 1 GiB
}

fn default_max_chunk() -> u64 {
    16 * 1024 * 1024
}
