//! Remove and clear commands.

use clap::Args;

use chunkhub_core::config::AppConfig;
use chunkhub_core::error::AppError;

use crate::output;

/// Arguments for the remove command
#[derive(Debug, Args)]
pub struct RemoveArgs {
    /// File ID to remove
    pub file_id: String,
}

/// Execute the remove command
pub async fn execute(args: &RemoveArgs, config: &AppConfig) -> Result<(), AppError> {
    let scheduler = super::open_scheduler(config).await?;
    let id = super::parse_file_id(&args.file_id)?;
    scheduler.remove_file(&id).await?;
    output::print_success(&format!("Removed {id}"));
    Ok(())
}

/// Remove every tracked upload and its local data.
pub async fn clear(config: &AppConfig) -> Result<(), AppError> {
    let scheduler = super::open_scheduler(config).await?;
    let count = scheduler.files().await.len();
    scheduler.clear_all().await?;
    output::print_success(&format!("Cleared {count} upload(s)"));
    Ok(())
}
