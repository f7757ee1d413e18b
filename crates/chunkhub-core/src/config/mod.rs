//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section, and every field has a default so an empty file is valid.

pub mod app;
pub mod cleanup;
pub mod client;
pub mod logging;
pub mod storage;

use serde::{Deserialize, Serialize};

pub use self::app::{CorsConfig, ServerConfig};
pub use self::cleanup::CleanupConfig;
pub use self::client::{ClientConfig, RetryConfig};
pub use self::logging::LoggingConfig;
pub use self::storage::StorageConfig;

use crate::error::AppError;

/// Root application configuration.
///
/// This struct is the top-level deserialization target for the merged
/// TOML configuration files (default.toml + environment overlay).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Server-side chunk and file storage settings.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Stale upload sweep settings.
    #[serde(default)]
    pub cleanup: CleanupConfig,
    /// Upload client settings.
    #[serde(default)]
    pub client: ClientConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration for a named environment.
    ///
    /// Merges `config/default.toml` with `config/{env}.toml` and environment
    /// variables prefixed with `CHUNKHUB__` (sections separated by `__`).
    pub fn load(env: &str) -> Result<Self, AppError> {
        Self::build(
            config::Config::builder()
                .add_source(config::File::with_name("config/default").required(false))
                .add_source(config::File::with_name(&format!("config/{env}")).required(false)),
        )
    }

    /// Load configuration from an explicit file path plus environment variables.
    pub fn load_from(path: &str) -> Result<Self, AppError> {
        Self::build(
            config::Config::builder().add_source(config::File::with_name(path).required(false)),
        )
    }

    fn build(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, AppError> {
        let config = builder
            .add_source(
                config::Environment::with_prefix("CHUNKHUB")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        let config: Self = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the transfer pipeline unusable.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.client.chunk_size_bytes == 0 {
            return Err(AppError::configuration("client.chunk_size_bytes must be > 0"));
        }
        if self.client.concurrency == 0 {
            return Err(AppError::configuration("client.concurrency must be > 0"));
        }
        if self.client.global_concurrency == 0 {
            return Err(AppError::configuration(
                "client.global_concurrency must be > 0",
            ));
        }
        if self.client.retry.max_attempts == 0 {
            return Err(AppError::configuration(
                "client.retry.max_attempts must be > 0",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_transfer_contract() {
        let config = AppConfig::default();
        assert_eq!(config.client.chunk_size_bytes, 1024 * 1024);
        assert_eq!(config.client.concurrency, 3);
        assert_eq!(config.client.max_file_size_bytes, 1024 * 1024 * 1024);
        assert_eq!(config.cleanup.max_age_hours, 24);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let mut config = AppConfig::default();
        config.client.concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_toml_deserializes_with_defaults() {
        let config: AppConfig = config::Config::builder()
            .add_source(config::File::from_str("", config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(config.server.port, 3001);
        assert_eq!(config.storage.temp_dir(), std::path::PathBuf::from("./uploads/temp"));
    }
}
