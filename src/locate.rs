//! Source file types and the root-array heuristic for JSON payloads.
//!
//! API responses often wrap their rows, e.g. `[{"data": [...]}]`. For JSON
//! sources the first array-valued property of the first element is taken as
//! the row collection. Only the first array found is considered; payloads
//! with several nested arrays are ambiguous and are not inferred further.

use std::{fmt, path::Path, str::FromStr};

use clap::ValueEnum;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    error::SourceError,
    extract::{Extraction, extract, extract_records},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
#[value(rename_all = "lowercase")]
pub enum FileType {
    Json,
    Csv,
    Xlsx,
    Xls,
    Txt,
    Sql,
}

impl FileType {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension().and_then(|ext| ext.to_str())?;
        match ext.to_ascii_lowercase().as_str() {
            "tsv" => Some(FileType::Txt),
            "sqlite" => Some(FileType::Sql),
            other => other.parse().ok(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Json => "json",
            FileType::Csv => "csv",
            FileType::Xlsx => "xlsx",
            FileType::Xls => "xls",
            FileType::Txt => "txt",
            FileType::Sql => "sql",
        }
    }

    /// Only JSON payloads go through the root-array locator; every other
    /// source is already row-shaped.
    pub fn uses_root_locator(&self) -> bool {
        matches!(self, FileType::Json)
    }
}

impl FromStr for FileType {
    type Err = SourceError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(FileType::Json),
            "csv" => Ok(FileType::Csv),
            "xlsx" => Ok(FileType::Xlsx),
            "xls" => Ok(FileType::Xls),
            "txt" => Ok(FileType::Txt),
            "sql" => Ok(FileType::Sql),
            other => Err(SourceError::UnsupportedFileType(other.to_string())),
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn locate_root_array(parsed: &Value) -> Option<&[Value]> {
    let items = match parsed {
        Value::Array(items) => items,
        _ => return None,
    };
    match items.first() {
        Some(Value::Object(first)) => first.values().find_map(|value| match value {
            Value::Array(nested) => Some(nested.as_slice()),
            _ => None,
        }),
        _ if items.iter().all(Value::is_object) => Some(items.as_slice()),
        _ => None,
    }
}

/// Resolves the row collection for a source and extracts it.
pub fn resolve_rows(rows: &Value, file_type: FileType) -> Extraction {
    if file_type.uses_root_locator() {
        if let Some(located) = locate_root_array(rows) {
            debug!("Located {} row(s) under the first nested array", located.len());
            return extract_records(located);
        }
        debug!("No nested row array found; using the payload as rows");
    }
    extract(rows)
}
