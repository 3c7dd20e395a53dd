//! Header set and canonical row extraction.
//!
//! Every record in a collection is flattened, the union of flat keys forms
//! the header set in first-seen order, and every record is projected onto
//! that header set. Missing and null cells become empty strings because the
//! rows feed straight into text display.

use indexmap::{IndexMap, IndexSet};
use log::debug;
use serde::Serialize;
use serde_json::Value;

use crate::{flatten::flatten, value::Cell};

pub type CanonicalRow = IndexMap<String, Cell>;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Extraction {
    pub headers: Vec<String>,
    pub rows: Vec<CanonicalRow>,
}

impl Extraction {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Narrows the rows to a search term; the header set is unchanged.
    pub fn searched(mut self, term: Option<&str>) -> Self {
        if let Some(term) = term {
            let before = self.rows.len();
            self.rows = filter_rows(&self.rows, term);
            debug!("Search '{term}' kept {} of {before} row(s)", self.rows.len());
        }
        self
    }

    /// Display strings aligned with `headers`, for table rendering.
    pub fn rows_as_strings(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|row| {
                self.headers
                    .iter()
                    .map(|h| row.get(h).map(Cell::as_display).unwrap_or_default())
                    .collect()
            })
            .collect()
    }
}

/// Keeps rows where any cell contains `term`, ignoring case. A blank term
/// keeps every row.
pub fn filter_rows(rows: &[CanonicalRow], term: &str) -> Vec<CanonicalRow> {
    let needle = term.trim().to_lowercase();
    if needle.is_empty() {
        return rows.to_vec();
    }
    rows.iter()
        .filter(|row| {
            row.values()
                .any(|cell| !cell.is_falsy() && cell.as_display().to_lowercase().contains(&needle))
        })
        .cloned()
        .collect()
}

/// Extracts from any JSON value: an array is a collection, a single non-null
/// value is a one-element collection and null is empty.
pub fn extract(input: &Value) -> Extraction {
    match input {
        Value::Array(items) => extract_records(items),
        Value::Null => Extraction::default(),
        single => extract_records(std::slice::from_ref(single)),
    }
}

pub fn extract_records(records: &[Value]) -> Extraction {
    if records.is_empty() {
        return Extraction::default();
    }
    let flattened = records.iter().map(flatten).collect::<Vec<_>>();

    let mut headers = IndexSet::new();
    for flat in &flattened {
        for key in flat.keys() {
            if !headers.contains(key.as_str()) {
                headers.insert(key.clone());
            }
        }
    }
    let headers = headers.into_iter().collect::<Vec<String>>();

    let rows = flattened
        .iter()
        .map(|flat| {
            headers
                .iter()
                .map(|header| {
                    let cell = flat.get(header).map(Cell::from_leaf).unwrap_or_else(Cell::empty);
                    (header.clone(), cell)
                })
                .collect::<CanonicalRow>()
        })
        .collect();

    Extraction { headers, rows }
}

/// Header set only, in first-seen order.
pub fn unique_keys(input: &Value) -> Vec<String> {
    extract(input).headers
}
