use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use crate::{export::ExportFormat, locate::FileType, preview::DEFAULT_PAGE_SIZE};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Map tabular source fields onto configurable target fields",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Flatten a source file and preview its fields and rows page by page
    Inspect(InspectArgs),
    /// Edit the target-field list of a mapping file and optionally sync it
    Map(MapArgs),
    /// Export mapped rows as CSV, JSON, XLSX or SQL
    Export(ExportArgs),
    /// Print mapped rows with their metadata as JSON
    Rows(RowsArgs),
}

/// Options shared by every command that reads a source file.
#[derive(Debug, Args)]
pub struct SourceArgs {
    /// Source file (json, csv, txt, tsv, xlsx, xls, sql); `-` reads stdin
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Override the file type inferred from the extension
    #[arg(long = "file-type", value_enum)]
    pub file_type: Option<FileType>,
    /// Delimiter for csv/txt sources (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct InspectArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    /// 1-based page to display
    #[arg(long, default_value_t = 1)]
    pub page: usize,
    /// Rows per page
    #[arg(long = "page-size", default_value_t = DEFAULT_PAGE_SIZE)]
    pub page_size: usize,
    /// Only keep rows with a cell containing this text (case-insensitive)
    #[arg(long)]
    pub search: Option<String>,
}

#[derive(Debug, Args)]
pub struct BackendArgs {
    /// Backend base URL (overrides FIELD_MAPPER_API_URL)
    #[arg(long = "api-url")]
    pub api_url: Option<String>,
    /// Bearer token for the backend (overrides FIELD_MAPPER_TOKEN)
    #[arg(long)]
    pub token: Option<String>,
    /// Request timeout in seconds
    #[arg(long = "timeout-secs")]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Args)]
pub struct MapArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    /// Mapping file (YAML, or JSON when it ends in .json)
    #[arg(short = 'm', long = "mapping")]
    pub mapping: PathBuf,
    /// Write the edited mapping here instead of back to --mapping
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Append an unmapped target field
    #[arg(long = "add", action = clap::ArgAction::Append)]
    pub add: Vec<String>,
    /// Rename a target field using `OLD=NEW`
    #[arg(long = "rename", action = clap::ArgAction::Append)]
    pub rename: Vec<String>,
    /// Bind a target to a source field using `NAME=SOURCE`, or clear it with `NAME=`
    #[arg(long = "remap", action = clap::ArgAction::Append)]
    pub remap: Vec<String>,
    /// Move a target one position using `NAME:up` or `NAME:down`
    #[arg(long = "move", action = clap::ArgAction::Append)]
    pub moves: Vec<String>,
    /// Delete a target field
    #[arg(long = "remove", action = clap::ArgAction::Append)]
    pub remove: Vec<String>,
    /// Hide a source field and unmap every target bound to it
    #[arg(long = "hide", action = clap::ArgAction::Append)]
    pub hide: Vec<String>,
    /// Push the edited list to the backend when it differs from the file
    #[arg(long)]
    pub sync: bool,
    #[command(flatten)]
    pub backend: BackendArgs,
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    /// Mapping file (YAML, or JSON when it ends in .json)
    #[arg(short = 'm', long = "mapping")]
    pub mapping: PathBuf,
    /// Output format (defaults to the source file type)
    #[arg(long, value_enum)]
    pub format: Option<ExportFormat>,
    /// Output directory or file; `-` writes to stdout (defaults to the current directory)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Table name used for the SQL statements and the filename
    #[arg(long = "table-name")]
    pub table_name: Option<String>,
    /// Date stamped into the filename as YYYYMMDD (defaults to today, UTC)
    #[arg(long, value_parser = parse_export_date)]
    pub date: Option<NaiveDate>,
    /// Only keep rows with a cell containing this text (case-insensitive)
    #[arg(long)]
    pub search: Option<String>,
}

#[derive(Debug, Args)]
pub struct RowsArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    /// Mapping file (YAML, or JSON when it ends in .json)
    #[arg(short = 'm', long = "mapping")]
    pub mapping: PathBuf,
    /// Script name recorded on every row (defaults to the first mapping name)
    #[arg(long = "script-name")]
    pub script_name: Option<String>,
    /// Output file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Only keep rows with a cell containing this text (case-insensitive)
    #[arg(long)]
    pub search: Option<String>,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}

pub fn parse_export_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value.trim(), "%Y%m%d")
        .map_err(|err| format!("Expected a date as YYYYMMDD: {err}"))
}

/// Splits `left<sep>right`, trimming both sides.
pub fn split_pair(value: &str, separator: char) -> Result<(&str, &str), String> {
    value
        .split_once(separator)
        .map(|(left, right)| (left.trim(), right.trim()))
        .ok_or_else(|| format!("Expected '{separator}' in '{value}'"))
}
