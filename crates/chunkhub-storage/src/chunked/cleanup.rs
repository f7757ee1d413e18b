//! Stale holding-area cleanup.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use chunkhub_core::result::AppResult;
use chunkhub_core::traits::storage::StorageProvider;

/// Removes holding areas of uploads that were never merged.
#[derive(Debug, Clone)]
pub struct StaleUploadSweeper {
    /// Storage provider where chunks are stored.
    provider: Arc<dyn StorageProvider>,
    /// Directory that holds all upload areas.
    temp_root: String,
    /// Age after which an untouched holding area is removed.
    max_age: Duration,
}

/// Outcome of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Holding areas inspected.
    pub scanned: usize,
    /// Holding areas removed.
    pub removed: usize,
    /// Holding areas that could not be removed.
    pub failed: usize,
}

impl StaleUploadSweeper {
    /// Create a new sweeper.
    pub fn new(
        provider: Arc<dyn StorageProvider>,
        temp_root: impl Into<String>,
        max_age: Duration,
    ) -> Self {
        Self {
            provider,
            temp_root: temp_root.into(),
            max_age,
        }
    }

    /// Remove every holding area not modified within `max_age` of now.
    pub async fn sweep(&self) -> AppResult<SweepReport> {
        let max_age = chrono::Duration::from_std(self.max_age).unwrap_or(chrono::Duration::MAX);
        let cutoff = Utc::now()
            .checked_sub_signed(max_age)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        self.sweep_older_than(cutoff).await
    }

    /// Remove every holding area last modified before `cutoff`.
    pub async fn sweep_older_than(&self, cutoff: DateTime<Utc>) -> AppResult<SweepReport> {
        let mut report = SweepReport::default();

        for entry in self.provider.list(&self.temp_root).await? {
            if !entry.is_directory {
                continue;
            }
            report.scanned += 1;

            let stale = entry.last_modified.is_some_and(|t| t < cutoff);
            if !stale {
                continue;
            }

            match self.provider.delete_dir(&entry.path).await {
                Ok(()) => {
                    report.removed += 1;
                    tracing::info!(path = %entry.path, "Removed stale upload area");
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(path = %entry.path, error = %e, "Failed to remove stale upload area");
                }
            }
        }

        Ok(report)
    }
}
