//! Stale upload sweep configuration.

use serde::{Deserialize, Serialize};

/// Periodic removal of abandoned chunk holding areas.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupConfig {
    /// Whether the sweep is scheduled at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Cron expression (with seconds field) for the sweep.
    #[serde(default = "default_schedule")]
    pub schedule: String,
    /// Holding areas untouched for longer than this are removed.
    #[serde(default = "default_max_age_hours")]
    pub max_age_hours: u64,
    /// Run one sweep immediately at startup.
    #[serde(default = "default_true")]
    pub sweep_on_startup: bool,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            schedule: default_schedule(),
            max_age_hours: default_max_age_hours(),
            sweep_on_startup: true,
        }
    }
}

impl CleanupConfig {
    /// Maximum age as a `std::time::Duration`.
    pub fn max_age(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.max_age_hours * 3600)
    }
}

fn default_true() -> bool {
    true
}

fn default_schedule() -> String {
    "0 0 * * * *".to_string()
}

fn default_max_age_hours() -> u64 {
    24
}
