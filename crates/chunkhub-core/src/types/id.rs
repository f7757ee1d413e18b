//! Identifiers for files and chunks in transfer.
//!
//! A [`FileId`] is derived on the client from the file's name, size and
//! modification time, so re-selecting the same file yields the same id.
//! A [`ChunkKey`] names one chunk of one file and has the wire form
//! `"{fileId}-{index}"`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::AppError;

/// Client-derived stable identifier for a file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(String);

impl FileId {
    /// Derive the id of a file from its observable attributes.
    pub fn derive(name: &str, size: u64, last_modified_ms: i64) -> Self {
        Self(format!("{name}-{size}-{last_modified_ms}"))
    }

    /// Wrap an id received from elsewhere (wire, store).
    pub fn new(id: impl Into<String>) -> Result<Self, AppError> {
        let id = id.into();
        if id.is_empty() {
            return Err(AppError::validation("fileId must not be empty"));
        }
        Ok(Self(id))
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// A filesystem-safe, fixed-length name for this id (hex SHA-256).
    ///
    /// File ids embed user-supplied file names, so they are never used as
    /// path components directly.
    pub fn storage_name(&self) -> String {
        hex::encode(Sha256::digest(self.0.as_bytes()))
    }

    /// Key of the chunk at `index` within this file.
    pub fn chunk_key(&self, index: u32) -> ChunkKey {
        ChunkKey {
            file_id: self.clone(),
            index,
        }
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for FileId {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Identifier of one chunk within one file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ChunkKey {
    /// The file the chunk belongs to.
    pub file_id: FileId,
    /// Zero-based chunk index.
    pub index: u32,
}

impl fmt::Display for ChunkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.file_id, self.index)
    }
}

impl FromStr for ChunkKey {
    type Err = AppError;

    /// Parses `"{fileId}-{index}"`. The file id itself contains dashes, so
    /// the split happens at the last one.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (file_id, index) = s
            .rsplit_once('-')
            .ok_or_else(|| AppError::validation(format!("Malformed chunk key: {s}")))?;
        let index = index
            .parse::<u32>()
            .map_err(|_| AppError::validation(format!("Malformed chunk index in key: {s}")))?;
        Ok(Self {
            file_id: FileId::new(file_id)?,
            index,
        })
    }
}

impl From<ChunkKey> for String {
    fn from(key: ChunkKey) -> String {
        key.to_string()
    }
}

impl TryFrom<String> for ChunkKey {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
