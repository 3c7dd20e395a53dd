//! Export serializer for mapped rows.
//!
//! Columns always follow the target-field order, never the source header
//! order. Nothing is produced when no target fields are configured or when
//! there are no rows; spreadsheet failures likewise leave no partial output.

use chrono::NaiveDate;
use clap::ValueEnum;
use csv::{QuoteStyle, Terminator, WriterBuilder};
use indexmap::IndexMap;
use itertools::Itertools;
use rust_xlsxwriter::{Workbook, Worksheet, XlsxError};
use serde::{Deserialize, Serialize};

use crate::{
    error::ExportError,
    extract::CanonicalRow,
    locate::FileType,
    mapping::{TargetField, project_row},
    value::{Cell, quote_sql_identifier, sanitize_table_name},
};

pub const SHEET_NAME: &str = "Data";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
#[value(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Json,
    Xlsx,
    Sql,
}

impl ExportFormat {
    pub fn for_file_type(file_type: FileType) -> Self {
        match file_type {
            FileType::Csv | FileType::Txt => ExportFormat::Csv,
            FileType::Json => ExportFormat::Json,
            FileType::Xlsx | FileType::Xls => ExportFormat::Xlsx,
            FileType::Sql => ExportFormat::Sql,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
            ExportFormat::Xlsx => "xlsx",
            ExportFormat::Sql => "sql",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv;charset=utf-8",
            ExportFormat::Json => "application/json;charset=utf-8",
            ExportFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
            ExportFormat::Sql => "application/sql;charset=utf-8",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub format: ExportFormat,
    pub table_name: Option<String>,
    pub date: NaiveDate,
}

#[derive(Debug, Clone)]
pub struct ExportedFile {
    pub filename: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

/// `<sanitized-table-name>_<YYYYMMDD>.<ext>`
pub fn export_filename(request: &ExportRequest) -> String {
    format!(
        "{}_{}.{}",
        sanitize_table_name(request.table_name.as_deref()),
        request.date.format("%Y%m%d"),
        request.format.extension()
    )
}

pub fn export(
    targets: &[TargetField],
    rows: &[CanonicalRow],
    request: &ExportRequest,
) -> Result<ExportedFile, ExportError> {
    if targets.is_empty() {
        return Err(ExportError::NoTargetFields);
    }
    if rows.is_empty() {
        return Err(ExportError::NoRows);
    }

    let columns = targets.iter().map(|t| t.name.clone()).collect::<Vec<_>>();
    let projected = rows
        .iter()
        .map(|row| project_row(targets, row))
        .collect::<Vec<_>>();

    let bytes = match request.format {
        ExportFormat::Csv => to_csv(&columns, &projected)?,
        ExportFormat::Json => serde_json::to_vec_pretty(&projected)?,
        ExportFormat::Sql => {
            let table = sanitize_table_name(request.table_name.as_deref());
            to_sql(&table, &columns, &projected).into_bytes()
        }
        ExportFormat::Xlsx => to_xlsx(&columns, &projected)?,
    };

    Ok(ExportedFile {
        filename: export_filename(request),
        content_type: request.format.content_type(),
        bytes,
    })
}

/// Records joined by CRLF with no trailing terminator. Fields are quoted
/// only when they contain a delimiter, a quote or a line break.
pub fn to_csv(
    columns: &[String],
    rows: &[IndexMap<String, Cell>],
) -> Result<Vec<u8>, ExportError> {
    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(encode_csv_record(columns)?);
    for row in rows {
        let fields = columns
            .iter()
            .map(|column| row.get(column).map(Cell::as_display).unwrap_or_default())
            .collect::<Vec<_>>();
        lines.push(encode_csv_record(&fields)?);
    }
    Ok(lines.join("\r\n").into_bytes())
}

fn encode_csv_record(fields: &[String]) -> Result<String, ExportError> {
    // The csv writer quotes a lone empty field so the line is not blank.
    if fields.iter().all(String::is_empty) {
        return Ok(",".repeat(fields.len().saturating_sub(1)));
    }
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Necessary)
        .terminator(Terminator::CRLF)
        .double_quote(true)
        .from_writer(Vec::new());
    writer.write_record(fields)?;
    let mut bytes = writer
        .into_inner()
        .map_err(|err| csv::Error::from(err.into_error()))?;
    if bytes.ends_with(b"\r\n") {
        bytes.truncate(bytes.len() - 2);
    }
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// One `INSERT` per row, joined by CRLF. The target table must already exist.
pub fn to_sql(table: &str, columns: &[String], rows: &[IndexMap<String, Cell>]) -> String {
    let table = quote_sql_identifier(table);
    let column_list = columns.iter().map(|c| quote_sql_identifier(c)).join(", ");
    rows.iter()
        .map(|row| {
            let values = columns
                .iter()
                .map(|column| {
                    row.get(column)
                        .map(Cell::to_sql_literal)
                        .unwrap_or_else(|| "NULL".to_string())
                })
                .join(", ");
            format!("INSERT INTO {table} ({column_list}) VALUES ({values});")
        })
        .join("\r\n")
}

pub fn to_xlsx(
    columns: &[String],
    rows: &[IndexMap<String, Cell>],
) -> Result<Vec<u8>, ExportError> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;
    for (col, name) in columns.iter().enumerate() {
        sheet.write_string(0, col_index(col), name.as_str())?;
    }
    for (idx, row) in rows.iter().enumerate() {
        let row_num = u32::try_from(idx + 1).unwrap_or(u32::MAX);
        for (col, column) in columns.iter().enumerate() {
            if let Some(cell) = row.get(column) {
                write_cell(sheet, row_num, col_index(col), cell)?;
            }
        }
    }
    Ok(workbook.save_to_buffer()?)
}

fn col_index(col: usize) -> u16 {
    u16::try_from(col).unwrap_or(u16::MAX)
}

fn write_cell(sheet: &mut Worksheet, row: u32, col: u16, cell: &Cell) -> Result<(), XlsxError> {
    match cell {
        Cell::Null => {}
        Cell::Bool(b) => {
            sheet.write_boolean(row, col, *b)?;
        }
        Cell::Number(n) => match n.as_f64() {
            Some(f) => {
                sheet.write_number(row, col, f)?;
            }
            None => {
                sheet.write_string(row, col, n.to_string())?;
            }
        },
        other => {
            let text = other.as_display();
            if !text.is_empty() {
                sheet.write_string(row, col, text)?;
            }
        }
    }
    Ok(())
}
