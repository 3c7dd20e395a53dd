//! `map` command: edit a mapping file's target fields against a source.

use anyhow::{Context, Result, anyhow, bail};
use log::{debug, info, warn};

use crate::{
    cli::{MapArgs, split_pair},
    config::{BackendSettings, MappingDocument},
    mapping::{Direction, MappingSession},
    source,
    sync::HttpMappingSink,
    table,
};

pub fn execute(args: &MapArgs) -> Result<()> {
    let document = MappingDocument::load(&args.mapping)?;
    let (_, extraction) = source::load_extraction(&args.source)?;
    let mut session = document.start_session(extraction.headers);
    info!(
        "Loaded {} target field(s) from {:?} over {} source field(s)",
        session.targets().len(),
        args.mapping,
        session.headers().len()
    );

    apply_edits(&mut session, args)?;
    print_targets(&session);

    let output = args.output.as_deref().unwrap_or(&args.mapping);
    document
        .with_session(&session)
        .save(output)
        .with_context(|| format!("Saving mapping to {output:?}"))?;
    info!("Mapping written to {output:?}");

    if args.sync {
        sync_session(&mut session, args)?;
    }
    Ok(())
}

/// Applies the requested edits in a fixed order: add, rename, remap, move,
/// remove, hide. The first failing edit aborts the command.
pub fn apply_edits(session: &mut MappingSession, args: &MapArgs) -> Result<()> {
    for name in &args.add {
        session
            .add_field(name)
            .with_context(|| format!("Adding target field '{name}'"))?;
    }
    for pair in &args.rename {
        let (old, new) = split_pair(pair, '=').map_err(|err| anyhow!(err))?;
        let id = session.find_by_name(old)?;
        session
            .rename(id, new)
            .with_context(|| format!("Renaming '{old}' to '{new}'"))?;
    }
    for pair in &args.remap {
        let (name, source) = split_pair(pair, '=').map_err(|err| anyhow!(err))?;
        let id = session.find_by_name(name)?;
        let source = (!source.is_empty()).then_some(source);
        session
            .remap(id, source)
            .with_context(|| format!("Remapping '{name}'"))?;
    }
    for pair in &args.moves {
        let (name, direction) = pair
            .rsplit_once(':')
            .ok_or_else(|| anyhow!("Expected NAME:up or NAME:down, got '{pair}'"))?;
        let direction = direction.parse::<Direction>().map_err(|err| anyhow!(err))?;
        let id = session.find_by_name(name)?;
        if !session.reorder(id, direction)? {
            debug!("'{name}' is already at the edge; move ignored");
        }
    }
    for name in &args.remove {
        let id = session.find_by_name(name)?;
        session.remove(id)?;
    }
    for source in &args.hide {
        let reset = session.hide_source_field(source);
        info!("Hid source field '{source}' ({reset} target field(s) unmapped)");
    }
    Ok(())
}

fn print_targets(session: &MappingSession) {
    let headers = vec!["#".to_string(), "target".to_string(), "source".to_string()];
    let rows = session
        .targets()
        .iter()
        .enumerate()
        .map(|(idx, target)| {
            vec![
                (idx + 1).to_string(),
                target.name.clone(),
                target.mapped_source_field.clone().unwrap_or_default(),
            ]
        })
        .collect::<Vec<_>>();
    table::print_table(&headers, &rows);
}

fn sync_session(session: &mut MappingSession, args: &MapArgs) -> Result<()> {
    if session.context().record_id.is_none() {
        warn!("Mapping has no record_id; skipping sync");
        return Ok(());
    }
    let settings = BackendSettings::from_env().with_overrides(
        args.backend.api_url.clone(),
        args.backend.token.clone(),
        args.backend.timeout_secs,
    );
    let sink = HttpMappingSink::new(&settings)?;
    session.set_sink(Box::new(sink));
    if !session.sync_if_changed() {
        info!("Target fields match the mapping file; nothing to sync");
        return Ok(());
    }
    if let Some(err) = session.last_sync_error() {
        bail!("Sync failed: {err}");
    }
    info!("Target fields synced to backend");
    Ok(())
}
