use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One validated production-data row tied to a case number.
///
/// Constructed only by the row validator; a row that fails any field check
/// never becomes a `CaseRecord`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseRecord {
    pub case_number: String,
    pub critical_parts: u32,
    pub total_lines: u32,
    pub domestic_lines: u32,
    pub bulk_lines: u32,
    /// 1-based row index in the original file, for error reporting and
    /// idempotent re-identification.
    pub source_row: u32,
}

/// Validation failures for a single spreadsheet row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowError {
    pub row: u32,
    pub messages: Vec<String>,
}

/// One entry of the ordered column→field mapping carried in `UploadMeta`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnBinding {
    /// Spreadsheet column letter ("A".."E").
    pub column: String,
    /// Logical record field the column feeds.
    pub field: String,
}

/// Describes the originating file and its archived destination.
/// Created once per confirmed submission attempt and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadMeta {
    pub file_name: String,
    /// None if every upload path failed; the batch still submits.
    pub file_url: Option<String>,
    pub storage_path: Option<String>,
    pub header_row_index: u32,
    pub column_map: Vec<ColumnBinding>,
    pub row_count: u32,
    pub shipment_ids: Vec<String>,
}

/// A shipment as selected for ingestion. `production_uploaded` is owned by
/// the server and set as a side effect of a successful submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shipment {
    pub id: String,
    #[serde(default)]
    pub production_uploaded: bool,
}

/// Body of the processing endpoint's POST: every selected shipment
/// receives the same full record set (fan-out, not partition).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestPayload {
    pub shipments: HashMap<String, Vec<CaseRecord>>,
    pub meta: UploadMeta,
}

/// Body of the processing endpoint's DELETE. The sentinel `"*"` in a
/// shipment's case-number list means "delete all production records for
/// this shipment".
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletePayload {
    pub shipments: HashMap<String, Vec<String>>,
}

pub const WIPE_ALL: &str = "*";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionResult {
    pub total_items: u64,
    #[serde(default)]
    pub per_shipment_counts: HashMap<String, u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResult {
    pub total_deletes: u64,
}

/// Snapshot of the most recent successful submission, retained client-side
/// only, so one compensating delete can reverse it without re-reading the
/// server state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastUpload {
    pub shipment_ids: Vec<String>,
    pub case_numbers: Vec<String>,
    pub recorded_at: DateTime<Utc>,
}

/// The user-selected blob handed to the pipeline.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub bytes: Bytes,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Reads a source file from disk, keeping only the file name for
    /// reporting and archiving.
    pub async fn from_path(path: &std::path::Path) -> Result<Self, crate::error::IngestError> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();
        let bytes = tokio::fs::read(path).await?;
        Ok(Self::new(name, bytes))
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// Lowercased extension, if any.
    pub fn extension(&self) -> Option<String> {
        std::path::Path::new(&self.name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
    }
}
