//! I/O helpers shared by the source loaders and the command handlers.
//!
//! - **Delimiter resolution**: explicit flag, then extension (`.tsv` → tab),
//!   then a tab sniff on the header line of `.txt` files, else comma.
//! - **Encoding**: input decoding via `encoding_rs`, defaulting to UTF-8.
//!   Output is always UTF-8.
//! - **stdin/stdout**: the `-` path convention routes through standard streams.

use std::{
    fs::{self, File},
    io::{self, BufWriter, Read, Write},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use encoding_rs::{Encoding, UTF_8};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>, header_line: &str) -> u8 {
    if let Some(delim) = provided {
        return delim;
    }
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        Some(ext) if ext.eq_ignore_ascii_case("txt") && header_line.contains('\t') => {
            DEFAULT_TSV_DELIMITER
        }
        _ => DEFAULT_CSV_DELIMITER,
    }
}

pub fn read_input_bytes(path: &Path) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    if is_dash(path) {
        io::stdin()
            .lock()
            .read_to_end(&mut buf)
            .context("Reading standard input")?;
    } else {
        buf = fs::read(path).with_context(|| format!("Opening input file {path:?}"))?;
    }
    Ok(buf)
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(anyhow!(
            "Failed to decode text with encoding {}",
            encoding.name()
        ))
    } else {
        Ok(text.into_owned())
    }
}

pub fn open_csv_reader<R>(reader: R, delimiter: u8) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true);
    builder.from_reader(reader)
}

/// Writes `bytes` to `path`, or to stdout when `path` is `None` or `-`.
pub fn write_output(path: Option<&Path>, bytes: &[u8]) -> Result<()> {
    let mut writer: Box<dyn Write> = match path {
        Some(p) if !is_dash(p) => Box::new(BufWriter::new(
            File::create(p).with_context(|| format!("Creating output file {p:?}"))?,
        )),
        _ => Box::new(io::stdout()),
    };
    writer.write_all(bytes).context("Writing output")?;
    writer.flush().context("Flushing output")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn txt_sniffs_tab_delimiter() {
        let path = Path::new("export.txt");
        assert_eq!(resolve_input_delimiter(path, None, "a\tb"), b'\t');
        assert_eq!(resolve_input_delimiter(path, None, "a,b"), b',');
        assert_eq!(resolve_input_delimiter(path, Some(b';'), "a\tb"), b';');
        assert_eq!(resolve_input_delimiter(Path::new("x.tsv"), None, ""), b'\t');
    }

    #[test]
    fn unknown_encoding_is_rejected() {
        assert!(resolve_encoding(Some("klingon")).is_err());
        assert_eq!(resolve_encoding(Some("latin1")).unwrap().name(), "windows-1252");
    }
}
