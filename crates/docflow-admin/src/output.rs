use chrono::{DateTime, Utc};
use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, Table};
use docflow_core::{DocumentMetadata, DocumentResult};
use docflow_protocol::ResultSchema;
use serde::Serialize;

/// Longest payload excerpt shown in a table cell.
const EXCERPT_CHARS: usize = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    Yaml,
}

/// A result message as received by the watcher.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchedResult {
    pub received_at: DateTime<Utc>,
    pub document_id: u64,
    pub kind: String,
    pub status: String,
    pub payload: String,
    pub error_details: String,
}

impl WatchedResult {
    /// `status` is the literal the kind's schema puts on the wire.
    pub fn new(result: &DocumentResult, received_at: DateTime<Utc>) -> Self {
        let schema = ResultSchema::for_kind(result.kind());
        WatchedResult {
            received_at,
            document_id: result.document_id().value(),
            kind: result.kind().to_string(),
            status: schema.status_literal(result.status()).to_string(),
            payload: result.payload().to_string(),
            error_details: result.error_details().unwrap_or_default().to_string(),
        }
    }
}

pub fn render_results(results: &[WatchedResult], format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(results)?),
        OutputFormat::Yaml => Ok(serde_yaml::to_string(results)?),
        OutputFormat::Table => {
            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec![
                "Received", "Document", "Kind", "Status", "Payload", "Error",
            ]);
            for result in results {
                table.add_row(vec![
                    result.received_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                    result.document_id.to_string(),
                    result.kind.clone(),
                    result.status.clone(),
                    excerpt(&result.payload),
                    result.error_details.clone(),
                ]);
            }
            Ok(table.to_string())
        }
    }
}

pub fn render_metadata(
    metadata: &DocumentMetadata,
    format: OutputFormat,
) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(metadata)?),
        OutputFormat::Yaml => Ok(serde_yaml::to_string(metadata)?),
        OutputFormat::Table => {
            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["Field", "Value"]);

            let id = metadata.id.map(|id| id.to_string());
            let file_size = metadata.file_size.map(|size| size.to_string());
            let content = metadata.content.as_deref().map(excerpt);
            let summary = metadata.summary.as_deref().map(excerpt);
            let rows = [
                ("ID", id.as_deref()),
                ("Title", metadata.title.as_deref()),
                ("Status", metadata.status.as_deref()),
                ("Storage Path", metadata.storage_path.as_deref()),
                ("File Size", file_size.as_deref()),
                ("Created", metadata.created_date.as_deref()),
                ("Content", content.as_deref()),
                ("Summary", summary.as_deref()),
            ];
            for (field, value) in rows {
                table.add_row(vec![field, value.unwrap_or("-")]);
            }
            Ok(table.to_string())
        }
    }
}

fn excerpt(text: &str) -> String {
    let flat = text.replace('\n', " ");
    if flat.chars().count() <= EXCERPT_CHARS {
        flat
    } else {
        let cut: String = flat.chars().take(EXCERPT_CHARS).collect();
        format!("{}...", cut)
    }
}
