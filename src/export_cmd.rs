use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use log::info;

use crate::{
    cli::ExportArgs,
    config::MappingDocument,
    export::{self, ExportFormat, ExportRequest},
    io_utils, source,
};

pub fn execute(args: &ExportArgs) -> Result<()> {
    let document = MappingDocument::load(&args.mapping)?;
    let (file_type, extraction) = source::load_extraction(&args.source)?;
    let extraction = extraction.searched(args.search.as_deref());
    let session = document.start_session(extraction.headers);

    let request = ExportRequest {
        format: args
            .format
            .unwrap_or_else(|| ExportFormat::for_file_type(file_type)),
        table_name: args.table_name.clone().or_else(|| document.table_name.clone()),
        date: args.date.unwrap_or_else(|| Utc::now().date_naive()),
    };

    match export::export(session.targets(), &extraction.rows, &request) {
        Ok(file) => {
            let destination = resolve_destination(args.output.as_deref(), &file.filename);
            io_utils::write_output(destination.as_deref(), &file.bytes)?;
            info!(
                "Exported {} row(s) as {} ({}) to {}",
                extraction.rows.len(),
                file.filename,
                file.content_type,
                destination
                    .map(|p| format!("{p:?}"))
                    .unwrap_or_else(|| "stdout".into())
            );
            Ok(())
        }
        Err(err) if err.is_informational() => {
            info!("{err}");
            Ok(())
        }
        Err(err) => Err(err).context("Exporting mapped rows"),
    }
}

/// `None` means stdout. Directories receive the generated filename.
pub fn resolve_destination(output: Option<&Path>, filename: &str) -> Option<PathBuf> {
    match output {
        None => Some(PathBuf::from(filename)),
        Some(path) if io_utils::is_dash(path) => None,
        Some(path) if path.is_dir() => Some(path.join(filename)),
        Some(path) => Some(path.to_path_buf()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destination_follows_output_kind() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            resolve_destination(Some(dir.path()), "t_20240101.csv"),
            Some(dir.path().join("t_20240101.csv"))
        );
        assert_eq!(resolve_destination(Some(Path::new("-")), "x.csv"), None);
        assert_eq!(
            resolve_destination(None, "x.csv"),
            Some(PathBuf::from("x.csv"))
        );
        assert_eq!(
            resolve_destination(Some(Path::new("out/custom.sql")), "x.sql"),
            Some(PathBuf::from("out/custom.sql"))
        );
    }
}
