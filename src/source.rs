//! Row-source loaders.
//!
//! Every loader produces the same thing the upload, API-script and
//! database-connection collaborators hand to the mapping engine: a JSON value
//! holding row-like records plus the file type tag that decides whether the
//! root-array locator runs.

use std::path::Path;

use anyhow::{Context, Result};
use calamine::{Data, Reader, open_workbook_auto};
use encoding_rs::Encoding;
use log::{debug, info};
use serde_json::{Map, Number, Value};

use crate::{
    cli::SourceArgs,
    error::SourceError,
    extract::Extraction,
    io_utils,
    locate::{self, FileType},
};

#[derive(Debug, Clone)]
pub struct LoadedSource {
    pub file_type: FileType,
    pub records: Value,
}

pub fn resolve_file_type(path: &Path, provided: Option<FileType>) -> Result<FileType> {
    match provided.or_else(|| FileType::from_path(path)) {
        Some(file_type) => Ok(file_type),
        None => Err(SourceError::UnknownFileType(path.to_path_buf()).into()),
    }
}

pub fn load_source(
    path: &Path,
    file_type: Option<FileType>,
    encoding: &'static Encoding,
    delimiter: Option<u8>,
) -> Result<LoadedSource> {
    let file_type = resolve_file_type(path, file_type)?;
    debug!("Loading {path:?} as {file_type}");
    let records = match file_type {
        FileType::Json | FileType::Sql => load_json(path, encoding)?,
        FileType::Csv | FileType::Txt => load_delimited(path, encoding, delimiter)?,
        FileType::Xlsx | FileType::Xls => load_workbook(path)?,
    };
    if let Value::Array(items) = &records {
        info!("Loaded {} record(s) from {path:?}", items.len());
    }
    Ok(LoadedSource { file_type, records })
}

/// Loads the source named by `args` and resolves it into canonical rows.
pub fn load_extraction(args: &SourceArgs) -> Result<(FileType, Extraction)> {
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let loaded = load_source(&args.input, args.file_type, encoding, args.delimiter)
        .with_context(|| format!("Loading source {:?}", args.input))?;
    let extraction = locate::resolve_rows(&loaded.records, loaded.file_type);
    debug!(
        "Resolved {} row(s) over {} field(s)",
        extraction.rows.len(),
        extraction.headers.len()
    );
    Ok((loaded.file_type, extraction))
}

fn load_json(path: &Path, encoding: &'static Encoding) -> Result<Value> {
    let bytes = io_utils::read_input_bytes(path)?;
    let text = io_utils::decode_bytes(&bytes, encoding)?;
    serde_json::from_str(&text).with_context(|| format!("Parsing JSON from {path:?}"))
}

fn load_delimited(
    path: &Path,
    encoding: &'static Encoding,
    delimiter: Option<u8>,
) -> Result<Value> {
    let bytes = io_utils::read_input_bytes(path)?;
    let text = io_utils::decode_bytes(&bytes, encoding)?;
    let header_line = text.lines().next().unwrap_or_default();
    let delimiter = io_utils::resolve_input_delimiter(path, delimiter, header_line);

    let mut reader = io_utils::open_csv_reader(text.as_bytes(), delimiter);
    let headers = reader
        .headers()
        .with_context(|| format!("Reading headers from {path:?}"))?
        .clone();

    let mut records = Vec::new();
    for (row_idx, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Reading row {}", row_idx + 2))?;
        let object = headers
            .iter()
            .zip(record.iter())
            .map(|(header, field)| (header.to_string(), Value::String(field.to_string())))
            .collect::<Map<String, Value>>();
        records.push(Value::Object(object));
    }
    Ok(Value::Array(records))
}

fn load_workbook(path: &Path) -> Result<Value> {
    let mut workbook = open_workbook_auto(path)
        .map_err(SourceError::from)
        .with_context(|| format!("Opening workbook {path:?}"))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| SourceError::EmptyWorkbook(path.to_path_buf()))?
        .map_err(SourceError::from)?;

    let mut rows = range.rows().skip_while(|row| row.iter().all(is_blank));
    let Some(header_row) = rows.next() else {
        return Ok(Value::Array(Vec::new()));
    };
    let headers = header_row
        .iter()
        .enumerate()
        .map(|(idx, cell)| match cell_to_json(cell) {
            Value::Null => format!("col{}", idx + 1),
            Value::String(s) if s.trim().is_empty() => format!("col{}", idx + 1),
            Value::String(s) => s.trim().to_string(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>();

    let records = rows
        .filter(|row| !row.iter().all(is_blank))
        .map(|row| {
            let object = headers
                .iter()
                .zip(row.iter())
                .map(|(header, cell)| (header.clone(), cell_to_json(cell)))
                .collect::<Map<String, Value>>();
            Value::Object(object)
        })
        .collect();
    Ok(Value::Array(records))
}

fn is_blank(cell: &Data) -> bool {
    match cell {
        Data::Empty => true,
        Data::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn cell_to_json(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::Null,
        Data::String(s) => Value::String(s.clone()),
        Data::Int(i) => Value::Number(Number::from(*i)),
        Data::Float(f) => Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(f.to_string())),
        Data::Bool(b) => Value::Bool(*b),
        other => Value::String(other.to_string()),
    }
}
