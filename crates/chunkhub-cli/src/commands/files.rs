//! Server-side file commands.

use std::path::PathBuf;

use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use chunkhub_core::config::AppConfig;
use chunkhub_core::error::AppError;

use crate::output::{self, OutputFormat};

/// Arguments for file commands
#[derive(Debug, Args)]
pub struct FilesArgs {
    /// File subcommand
    #[command(subcommand)]
    pub command: FilesCommand,
}

/// File subcommands
#[derive(Debug, Subcommand)]
pub enum FilesCommand {
    /// List assembled files
    List,
    /// Download an assembled file
    Download {
        /// File name on the server
        name: String,
        /// Destination path (default: the file name in the current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Delete an assembled file
    Delete {
        /// File name on the server
        name: String,
    },
}

/// Server file display row
#[derive(Debug, Serialize, Tabled)]
struct FileRow {
    /// Name
    name: String,
    /// Size
    size: String,
    /// Upload time
    uploaded: String,
    /// Server path
    path: String,
}

/// Execute file commands
pub async fn execute(
    args: &FilesArgs,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let transport = super::transport(config)?;

    match &args.command {
        FilesCommand::List => {
            let files = transport.list_files().await?;
            let rows: Vec<FileRow> = files
                .iter()
                .map(|f| FileRow {
                    name: f.name.clone(),
                    size: output::format_bytes(f.size),
                    uploaded: f
                        .upload_time
                        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                        .unwrap_or_else(|| "-".to_string()),
                    path: f.path.clone(),
                })
                .collect();
            output::print_list(&rows, format);
        }
        FilesCommand::Download { name, output: dest } => {
            let dest = dest.clone().unwrap_or_else(|| PathBuf::from(name));
            let bytes = transport.download_file(name, &dest).await?;
            output::print_success(&format!(
                "Downloaded '{name}' to {} ({})",
                dest.display(),
                output::format_bytes(bytes)
            ));
        }
        FilesCommand::Delete { name } => {
            transport.delete_file(name).await?;
            output::print_success(&format!("Deleted '{name}'"));
        }
    }

    Ok(())
}
