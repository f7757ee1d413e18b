//! Resume command.

use clap::Args;

use chunkhub_client::UploadStatus;
use chunkhub_core::config::AppConfig;
use chunkhub_core::error::AppError;

use crate::output::{self, OutputFormat};

/// Arguments for the resume command
#[derive(Debug, Args)]
pub struct ResumeArgs {
    /// File ID to resume (default: every unfinished upload)
    pub file_id: Option<String>,
}

/// Execute the resume command
pub async fn execute(
    args: &ResumeArgs,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let scheduler = super::open_scheduler(config).await?;

    let candidates = match &args.file_id {
        Some(raw) => {
            let id = super::parse_file_id(raw)?;
            let record = scheduler
                .file(&id)
                .await
                .ok_or_else(|| AppError::not_found(format!("No upload with id {id}")))?;
            vec![record]
        }
        None => scheduler.files().await,
    };

    let mut ids = Vec::new();
    for record in candidates {
        match record.status {
            UploadStatus::Error => {
                scheduler.pause_upload(&record.id).await?;
                scheduler.resume_upload(&record.id).await?;
            }
            UploadStatus::Paused => scheduler.resume_upload(&record.id).await?,
            UploadStatus::Pending => scheduler.start_upload(&record.id).await?,
            _ => continue,
        }
        ids.push(record.id);
    }

    if ids.is_empty() {
        output::print_success("Nothing to resume");
        return Ok(());
    }
    super::wait_for_uploads(&scheduler, &ids, format).await
}
