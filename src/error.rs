//! Error types surfaced by the mapping engine.
//!
//! Command handlers wrap these in `anyhow` with context; library callers can
//! match on the variants to tell validation problems from transport failures.

use thiserror::Error;

use crate::mapping::FieldId;

/// Rejected edits to the target-field list. None of these change state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    #[error("Target field name cannot be empty")]
    EmptyName,

    #[error("Target field \"{0}\" already exists")]
    DuplicateName(String),

    #[error("No target field with id {0}")]
    UnknownField(FieldId),

    #[error("No target field named \"{0}\"")]
    UnknownFieldName(String),

    #[error("Source field \"{0}\" is not available for mapping")]
    UnknownSourceField(String),
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("No target fields are configured. Cannot export data.")]
    NoTargetFields,

    #[error("No data to export.")]
    NoRows,

    #[error("Failed to export to Excel: {0}")]
    Spreadsheet(#[from] rust_xlsxwriter::XlsxError),

    #[error("CSV serialization failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl ExportError {
    /// Notices that are reported to the user but are not failures.
    pub fn is_informational(&self) -> bool {
        matches!(self, ExportError::NoRows)
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Missing record id for mapping update")]
    MissingRecordId,

    #[error("Missing backend URL; set FIELD_MAPPER_API_URL or pass --api-url")]
    MissingApiUrl,

    #[error("Mapping update failed ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("An error occurred while updating mappings: {0}")]
    Network(#[from] reqwest::Error),
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Unsupported file type '{0}'")]
    UnsupportedFileType(String),

    #[error("Cannot determine file type for {0:?}; pass --file-type")]
    UnknownFileType(std::path::PathBuf),

    #[error("Worksheet error: {0}")]
    Workbook(#[from] calamine::Error),

    #[error("Workbook {0:?} has no worksheets")]
    EmptyWorkbook(std::path::PathBuf),
}
