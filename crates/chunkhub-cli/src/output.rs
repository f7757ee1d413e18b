//! Table and JSON output formatting for CLI commands.

use serde::Serialize;
use tabled::{Table, Tabled};

use chunkhub_client::{FileRecord, UploadEvent};

/// Output format selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// JSON output
    Json,
}

/// Print a list of items in the selected format
pub fn print_list<T: Serialize + Tabled>(items: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if items.is_empty() {
                println!("No results found.");
            } else {
                println!("{}", Table::new(items));
            }
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(items).unwrap_or_else(|_| "[]".to_string());
            println!("{json}");
        }
    }
}

/// One tracked upload as a table row.
#[derive(Debug, Serialize, Tabled)]
#[serde(rename_all = "camelCase")]
pub struct UploadRow {
    /// File ID
    #[tabled(rename = "ID")]
    pub id: String,
    /// File name
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "Size")]
    pub size: String,
    #[tabled(rename = "Status")]
    pub status: String,
    #[tabled(rename = "Chunks")]
    pub chunks: String,
    #[tabled(rename = "Progress")]
    pub progress: String,
    #[tabled(rename = "Error")]
    pub error: String,
}

impl From<&FileRecord> for UploadRow {
    fn from(record: &FileRecord) -> Self {
        Self {
            id: record.id.to_string(),
            name: record.name.clone(),
            size: format_bytes(record.size),
            status: record.status.to_string(),
            chunks: format!("{}/{}", record.uploaded_chunks, record.total_chunks),
            progress: format!("{:.1}%", record.progress_percent()),
            error: record.last_error.clone().unwrap_or_default(),
        }
    }
}

/// Print tracked uploads in the selected format.
pub fn print_uploads(records: &[FileRecord], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            let rows: Vec<UploadRow> = records.iter().map(UploadRow::from).collect();
            print_list(&rows, format);
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(records).unwrap_or_else(|_| "[]".to_string());
            println!("{json}");
        }
    }
}

/// One line per lifecycle event while uploads run.
pub fn print_event(event: &UploadEvent) {
    match event {
        UploadEvent::Started { file_id } => println!("→ {file_id}: started"),
        UploadEvent::Resumed { file_id } => println!("→ {file_id}: resumed"),
        UploadEvent::Progress {
            file_id,
            uploaded_chunks,
            total_chunks,
            progress_percent,
            speed_bytes_per_sec,
            eta_seconds,
        } => {
            let eta = eta_seconds.map(|s| format!(", eta {s}s")).unwrap_or_default();
            println!(
                "  {file_id}: {uploaded_chunks}/{total_chunks} chunks ({progress_percent:.1}%, {}/s{eta})",
                format_bytes(*speed_bytes_per_sec as u64)
            );
        }
        UploadEvent::Success { file_id, file_path } => {
            print_success(&format!("{file_id}: stored at {file_path}"));
        }
        UploadEvent::Error { file_id, message } => print_error(&format!("{file_id}: {message}")),
        UploadEvent::Paused { file_id } => print_warning(&format!("{file_id}: paused")),
        UploadEvent::Added { .. } | UploadEvent::Removed { .. } => {}
    }
}

/// `1536` → `"1.5 KiB"`.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

/// Print a success message
pub fn print_success(msg: &str) {
    println!("✓ {msg}");
}

/// Print a warning message
pub fn print_warning(msg: &str) {
    println!("⚠ {msg}");
}

/// Print an error message
pub fn print_error(msg: &str) {
    eprintln!("✗ {msg}");
}
