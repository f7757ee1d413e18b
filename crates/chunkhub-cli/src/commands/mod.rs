//! CLI command definitions and dispatch.

pub mod files;
pub mod remove;
pub mod resume;
pub mod status;
pub mod upload;

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use chunkhub_client::{
    FsChunkStore, HttpTransport, SplitterPool, UploadScheduler, UploadStatus,
};
use chunkhub_core::config::AppConfig;
use chunkhub_core::error::{AppError, ErrorKind};
use chunkhub_core::types::FileId;

use crate::output::{self, OutputFormat};

/// ChunkHub: resumable chunked file uploads
#[derive(Debug, Parser)]
#[command(name = "chunkhub", version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: String,

    /// Server base URL (overrides `client.server_url`)
    #[arg(short, long)]
    pub server: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Split, persist and upload files
    Upload(upload::UploadArgs),
    /// Show tracked uploads
    Status,
    /// Continue paused or failed uploads
    Resume(resume::ResumeArgs),
    /// Remove one tracked upload and its local data
    Remove(remove::RemoveArgs),
    /// Remove every tracked upload
    Clear,
    /// Files assembled on the server
    Files(files::FilesArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<(), AppError> {
        let mut config = load_config(&self.config)?;
        if let Some(server) = &self.server {
            config.client.server_url = server.clone();
        }

        match &self.command {
            Commands::Upload(args) => upload::execute(args, &config, self.format).await,
            Commands::Status => status::execute(&config, self.format).await,
            Commands::Resume(args) => resume::execute(args, &config, self.format).await,
            Commands::Remove(args) => remove::execute(args, &config).await,
            Commands::Clear => remove::clear(&config).await,
            Commands::Files(args) => files::execute(args, &config, self.format).await,
        }
    }
}

/// Helper: load configuration from file
pub fn load_config(config_path: &str) -> Result<AppConfig, AppError> {
    AppConfig::load_from(config_path)
}

/// Helper: HTTP transport for the configured server
pub fn transport(config: &AppConfig) -> Result<HttpTransport, AppError> {
    HttpTransport::new(
        &config.client.server_url,
        Duration::from_secs(config.client.request_timeout_seconds),
    )
}

/// Helper: scheduler over the durable store, with persisted uploads restored
pub async fn open_scheduler(config: &AppConfig) -> Result<UploadScheduler, AppError> {
    let store = FsChunkStore::open(&config.client.state_dir).await?;
    let splitter = SplitterPool::new(config.client.splitter_workers)?;
    let scheduler = UploadScheduler::new(
        config.client.clone(),
        Arc::new(store),
        Arc::new(transport(config)?),
        Arc::new(splitter),
    );
    let restored = scheduler.restore_uploads().await?;
    tracing::debug!(state_dir = %config.client.state_dir, restored, "Opened local upload state");
    Ok(scheduler)
}

/// Helper: parse a file id argument
pub fn parse_file_id(raw: &str) -> Result<FileId, AppError> {
    FileId::new(raw)
}

/// Print events until the returned task is aborted.
fn spawn_event_printer(scheduler: &UploadScheduler) -> JoinHandle<()> {
    let mut events = scheduler.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => output::print_event(&event),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    })
}

/// Helper: wait for `ids` to finish, printing progress.
///
/// Ctrl-C pauses every upload and waits for in-flight chunks, so a later
/// `resume` picks up where this run stopped.
pub async fn wait_for_uploads(
    scheduler: &UploadScheduler,
    ids: &[FileId],
    format: OutputFormat,
) -> Result<(), AppError> {
    let printer = spawn_event_printer(scheduler);

    let finished = async {
        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            records.push(scheduler.wait_idle(id).await?);
        }
        Ok::<_, AppError>(records)
    };

    let records = tokio::select! {
        records = finished => records,
        _ = tokio::signal::ctrl_c() => {
            output::print_warning("Interrupted, pausing uploads...");
            scheduler.shutdown().await;
            printer.abort();
            output::print_warning("Uploads paused. Run `chunkhub resume` to continue.");
            return Ok(());
        }
    };
    printer.abort();
    let records = records?;

    println!();
    output::print_uploads(&records, format);

    let failed = records
        .iter()
        .filter(|r| r.status == UploadStatus::Error)
        .count();
    if failed > 0 {
        return Err(AppError::new(
            ErrorKind::Transport,
            format!("{failed} upload(s) failed; run `chunkhub resume` to retry"),
        ));
    }
    Ok(())
}
