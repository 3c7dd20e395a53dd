//! Paginated preview of canonical rows.

use anyhow::Result;
use log::info;

use crate::{
    cli::InspectArgs,
    extract::{CanonicalRow, Extraction},
    source, table,
};

pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct Page<'a> {
    /// 1-based page number after clamping.
    pub number: usize,
    pub total_pages: usize,
    pub rows: &'a [CanonicalRow],
}

pub fn total_pages(row_count: usize, per_page: usize) -> usize {
    row_count.div_ceil(per_page.max(1))
}

/// Slices out one page. Out-of-range page numbers clamp to the nearest page.
pub fn paginate(extraction: &Extraction, page: usize, per_page: usize) -> Page<'_> {
    let per_page = per_page.max(1);
    let total = total_pages(extraction.rows.len(), per_page);
    let number = page.clamp(1, total.max(1));
    let start = ((number - 1) * per_page).min(extraction.rows.len());
    let end = (start + per_page).min(extraction.rows.len());
    Page {
        number,
        total_pages: total,
        rows: &extraction.rows[start..end],
    }
}

pub fn execute(args: &InspectArgs) -> Result<()> {
    let (file_type, extraction) = source::load_extraction(&args.source)?;
    let extraction = extraction.searched(args.search.as_deref());
    info!("Inspecting {:?} as {file_type}", args.source.input);

    println!("Source fields ({}):", extraction.headers.len());
    for header in &extraction.headers {
        println!("  {header}");
    }

    if extraction.rows.is_empty() {
        println!();
        println!("No rows to display.");
        return Ok(());
    }

    let page = paginate(&extraction, args.page, args.page_size);
    let page_view = Extraction {
        headers: extraction.headers.clone(),
        rows: page.rows.to_vec(),
    };
    println!();
    table::print_table(&page_view.headers, &page_view.rows_as_strings());
    info!(
        "Page {} of {} ({} row(s) total)",
        page.number,
        page.total_pages,
        extraction.rows.len()
    );
    Ok(())
}
