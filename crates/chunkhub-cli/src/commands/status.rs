//! Status command.

use chunkhub_core::config::AppConfig;
use chunkhub_core::error::AppError;

use crate::output::{self, OutputFormat};

/// List every upload in the local store.
pub async fn execute(config: &AppConfig, format: OutputFormat) -> Result<(), AppError> {
    let scheduler = super::open_scheduler(config).await?;
    output::print_uploads(&scheduler.files().await, format);
    Ok(())
}
