//! `rows` command: mapped output rows with their metadata, as JSON.

use anyhow::{Context, Result};
use log::info;

use crate::{cli::RowsArgs, config::MappingDocument, io_utils, source};

pub fn execute(args: &RowsArgs) -> Result<()> {
    let document = MappingDocument::load(&args.mapping)?;
    let (_, extraction) = source::load_extraction(&args.source)?;
    let extraction = extraction.searched(args.search.as_deref());
    let session = document.start_session(extraction.headers);

    let script_name = args
        .script_name
        .clone()
        .or_else(|| document.name.first().cloned())
        .or_else(|| document.table_name.clone())
        .unwrap_or_default();
    let rows = session.mapped_rows(&extraction.rows, &script_name);

    let mut bytes = serde_json::to_vec_pretty(&rows).context("Serializing mapped rows")?;
    bytes.push(b'\n');
    io_utils::write_output(args.output.as_deref(), &bytes)?;
    info!(
        "Mapped {} row(s) through {} target field(s)",
        rows.len(),
        session.targets().len()
    );
    Ok(())
}
