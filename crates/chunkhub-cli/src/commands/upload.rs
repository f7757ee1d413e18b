//! Upload command.

use std::path::PathBuf;

use clap::Args;

use chunkhub_client::{AddOutcome, FileSource, UploadStatus};
use chunkhub_core::config::AppConfig;
use chunkhub_core::error::AppError;

use crate::output::{self, OutputFormat};

/// Arguments for the upload command
#[derive(Debug, Args)]
pub struct UploadArgs {
    /// Files to upload
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Split and persist only; start later with `resume`
    #[arg(long)]
    pub no_start: bool,
}

/// Execute the upload command
pub async fn execute(
    args: &UploadArgs,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let scheduler = super::open_scheduler(config).await?;

    let mut sources = Vec::with_capacity(args.files.len());
    for path in &args.files {
        sources.push(FileSource::from_path(path).await?);
    }

    let mut ids = Vec::new();
    for outcome in scheduler.add_files(sources, !args.no_start).await {
        match outcome {
            AddOutcome::Added(id) => ids.push(id),
            AddOutcome::Duplicate(id) => {
                // Left over from an earlier run: continue it instead.
                if !args.no_start {
                    match scheduler.file(&id).await.map(|r| r.status) {
                        Some(UploadStatus::Paused) => scheduler.resume_upload(&id).await?,
                        Some(UploadStatus::Pending) => scheduler.start_upload(&id).await?,
                        _ => {}
                    }
                }
                output::print_warning(&format!("{id}: already tracked"));
                ids.push(id);
            }
            AddOutcome::Failed { file_id, error } => {
                output::print_error(&format!("{file_id}: {}", error.message));
            }
        }
    }

    if args.no_start {
        output::print_success(&format!("{} file(s) ready", ids.len()));
        output::print_uploads(&scheduler.files().await, format);
        return Ok(());
    }
    super::wait_for_uploads(&scheduler, &ids, format).await
}
