//! Target-field configuration store.
//!
//! A [`MappingSession`] owns the ordered list of output columns for one
//! mapping screen and the source fields offered for binding. Each
//! [`TargetField`] carries a generated [`FieldId`] that survives renames and
//! reorders; names and positions are both mutable, so nothing else may be
//! used to address a field.
//!
//! Successful edits re-evaluate the sync state: when a sink and a record id
//! are present and the list differs from what the backend supplied at
//! bootstrap, the new payload is pushed. A failed push is logged and kept in
//! [`MappingSession::last_sync_error`]; local edits are never rolled back.

use std::{collections::HashSet, fmt, str::FromStr};

use indexmap::IndexMap;
use log::{debug, error, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::MappingError,
    extract::CanonicalRow,
    sync::{MappingSink, SessionContext, SyncPayload},
    value::Cell,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldId(Uuid);

impl FieldId {
    pub fn generate() -> Self {
        FieldId(Uuid::new_v4())
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetField {
    pub id: FieldId,
    pub name: String,
    pub mapped_source_field: Option<String>,
}

impl TargetField {
    fn unmapped(name: String) -> Self {
        Self {
            id: FieldId::generate(),
            name,
            mapped_source_field: None,
        }
    }

    pub fn is_mapped(&self) -> bool {
        self.mapped_source_field.is_some()
    }
}

/// A label/source pair supplied by the backend when a session starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitialMapping {
    pub label: String,
    #[serde(rename = "sourceApiField", default)]
    pub source_api_field: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            other => Err(format!("Unknown direction '{other}' (expected up or down)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRename {
    pub id: FieldId,
    pub current_name: String,
}

/// One output row: target values in target order plus the denormalised
/// metadata downstream consumers expect.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MappedRow {
    #[serde(flatten)]
    pub values: IndexMap<String, Cell>,
    pub script_name: String,
    pub field_keys: Vec<String>,
    pub form_id: String,
    /// Source binding per target, `""` when unmapped.
    pub uploaded_column_keys: Vec<String>,
    /// Source fields still offered for mapping.
    pub all_column_keys: Vec<String>,
}

/// Projects a canonical row through the target list. Unmapped targets and
/// bindings to absent sources yield an empty string.
pub fn project_row(targets: &[TargetField], row: &CanonicalRow) -> IndexMap<String, Cell> {
    targets
        .iter()
        .map(|target| {
            let cell = target
                .mapped_source_field
                .as_deref()
                .and_then(|source| row.get(source))
                .map(|cell| match cell {
                    Cell::Null => Cell::empty(),
                    other => other.clone(),
                })
                .unwrap_or_else(Cell::empty);
            (target.name.clone(), cell)
        })
        .collect()
}

/// Target names that occur more than once, in first-seen order.
pub fn duplicate_names(targets: &[TargetField]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut duplicates = Vec::new();
    for target in targets {
        if !seen.insert(target.name.as_str()) && !duplicates.contains(&target.name) {
            duplicates.push(target.name.clone());
        }
    }
    duplicates
}

pub struct MappingSession {
    headers: Vec<String>,
    displayable: Vec<String>,
    targets: Vec<TargetField>,
    pending_rename: Option<PendingRename>,
    requested: Vec<InitialMapping>,
    context: SessionContext,
    sink: Option<Box<dyn MappingSink>>,
    last_sync_error: Option<String>,
}

impl fmt::Debug for MappingSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappingSession")
            .field("headers", &self.headers)
            .field("displayable", &self.displayable)
            .field("targets", &self.targets)
            .field("pending_rename", &self.pending_rename)
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

impl MappingSession {
    /// Starts a session from backend-supplied mappings.
    ///
    /// A requested source binds only if it is in `headers` and no earlier
    /// entry in this pass claimed it; later duplicates start unmapped.
    pub fn bootstrap(initial: &[InitialMapping], headers: Vec<String>) -> Self {
        let mut claimed: HashSet<&str> = HashSet::new();
        let targets = initial
            .iter()
            .map(|mapping| {
                let mapped_source_field = match mapping.source_api_field.as_deref() {
                    Some(source) if headers.iter().any(|h| h == source) => {
                        if claimed.insert(source) {
                            Some(source.to_string())
                        } else {
                            debug!(
                                "Source field '{source}' already claimed; '{}' starts unmapped",
                                mapping.label
                            );
                            None
                        }
                    }
                    _ => None,
                };
                TargetField {
                    id: FieldId::generate(),
                    name: mapping.label.clone(),
                    mapped_source_field,
                }
            })
            .collect::<Vec<TargetField>>();

        let duplicates = duplicate_names(&targets);
        if !duplicates.is_empty() {
            warn!(
                "Duplicate target field name(s) {duplicates:?}; mapped rows keep only the last value for each"
            );
        }

        Self {
            displayable: headers.clone(),
            headers,
            targets,
            pending_rename: None,
            requested: initial.to_vec(),
            context: SessionContext::default(),
            sink: None,
            last_sync_error: None,
        }
    }

    pub fn with_context(mut self, context: SessionContext) -> Self {
        self.context = context;
        self
    }

    pub fn with_sink(mut self, sink: Box<dyn MappingSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn set_sink(&mut self, sink: Box<dyn MappingSink>) {
        self.sink = Some(sink);
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn displayable_source_fields(&self) -> &[String] {
        &self.displayable
    }

    pub fn targets(&self) -> &[TargetField] {
        &self.targets
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn pending_rename(&self) -> Option<&PendingRename> {
        self.pending_rename.as_ref()
    }

    pub fn last_sync_error(&self) -> Option<&str> {
        self.last_sync_error.as_deref()
    }

    pub fn get(&self, id: FieldId) -> Option<&TargetField> {
        self.targets.iter().find(|t| t.id == id)
    }

    pub fn find_by_name(&self, name: &str) -> Result<FieldId, MappingError> {
        self.targets
            .iter()
            .find(|t| t.name == name.trim())
            .map(|t| t.id)
            .ok_or_else(|| MappingError::UnknownFieldName(name.to_string()))
    }

    fn position(&self, id: FieldId) -> Result<usize, MappingError> {
        self.targets
            .iter()
            .position(|t| t.id == id)
            .ok_or(MappingError::UnknownField(id))
    }

    pub fn add_field(&mut self, name: &str) -> Result<FieldId, MappingError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(MappingError::EmptyName);
        }
        if self.targets.iter().any(|t| t.name == name) {
            return Err(MappingError::DuplicateName(name.to_string()));
        }
        let target = TargetField::unmapped(name.to_string());
        let id = target.id;
        self.targets.push(target);
        self.after_mutation();
        Ok(id)
    }

    /// Binds or clears the source of a target. Several targets may share a
    /// source after explicit edits.
    pub fn remap(&mut self, id: FieldId, source: Option<&str>) -> Result<(), MappingError> {
        let idx = self.position(id)?;
        if let Some(source) = source
            && !self.displayable.iter().any(|f| f == source)
        {
            return Err(MappingError::UnknownSourceField(source.to_string()));
        }
        self.targets[idx].mapped_source_field = source.map(str::to_string);
        self.after_mutation();
        Ok(())
    }

    pub fn begin_rename(&mut self, id: FieldId) -> Result<(), MappingError> {
        let idx = self.position(id)?;
        self.pending_rename = Some(PendingRename {
            id,
            current_name: self.targets[idx].name.clone(),
        });
        Ok(())
    }

    pub fn edit_pending_name(&mut self, name: &str) {
        if let Some(pending) = self.pending_rename.as_mut() {
            pending.current_name = name.to_string();
        }
    }

    pub fn cancel_rename(&mut self) {
        self.pending_rename = None;
    }

    /// Saves the pending edit. On failure the edit stays open.
    pub fn commit_rename(&mut self) -> Result<(), MappingError> {
        let Some(pending) = self.pending_rename.clone() else {
            return Ok(());
        };
        self.rename(pending.id, &pending.current_name)
    }

    pub fn rename(&mut self, id: FieldId, new_name: &str) -> Result<(), MappingError> {
        let idx = self.position(id)?;
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Err(MappingError::EmptyName);
        }
        if self.targets.iter().any(|t| t.name == new_name && t.id != id) {
            return Err(MappingError::DuplicateName(new_name.to_string()));
        }
        self.targets[idx].name = new_name.to_string();
        if self.pending_rename.as_ref().is_some_and(|p| p.id == id) {
            self.pending_rename = None;
        }
        self.after_mutation();
        Ok(())
    }

    pub fn remove(&mut self, id: FieldId) -> Result<TargetField, MappingError> {
        let idx = self.position(id)?;
        let removed = self.targets.remove(idx);
        if self.pending_rename.as_ref().is_some_and(|p| p.id == id) {
            self.pending_rename = None;
        }
        self.after_mutation();
        Ok(removed)
    }

    /// Moves a target one step. Returns `false` at the boundary.
    pub fn reorder(&mut self, id: FieldId, direction: Direction) -> Result<bool, MappingError> {
        let idx = self.position(id)?;
        let new_idx = match direction {
            Direction::Up if idx > 0 => idx - 1,
            Direction::Down if idx + 1 < self.targets.len() => idx + 1,
            _ => return Ok(false),
        };
        let target = self.targets.remove(idx);
        self.targets.insert(new_idx, target);
        self.after_mutation();
        Ok(true)
    }

    /// Stops offering `source` for mapping and unbinds every target using
    /// it. The header set is untouched. Returns the number of unbound targets.
    pub fn hide_source_field(&mut self, source: &str) -> usize {
        self.displayable.retain(|f| f != source);
        let mut reset = 0;
        for target in &mut self.targets {
            if target.mapped_source_field.as_deref() == Some(source) {
                target.mapped_source_field = None;
                reset += 1;
            }
        }
        if reset > 0 {
            debug!("Hiding '{source}' unmapped {reset} target field(s)");
        }
        self.after_mutation();
        reset
    }

    /// Whether the current list differs from the bootstrap request, compared
    /// as ordered `(name, source)` pairs. Requested sources absent from the
    /// header set count as unmapped.
    pub fn has_changed(&self) -> bool {
        let requested = self.requested.iter().map(|m| {
            let source = m
                .source_api_field
                .as_deref()
                .filter(|s| self.headers.iter().any(|h| h == *s));
            (m.label.as_str(), source)
        });
        let current = self
            .targets
            .iter()
            .map(|t| (t.name.as_str(), t.mapped_source_field.as_deref()));
        !requested.eq(current)
    }

    pub fn sync_payload(&self) -> SyncPayload {
        SyncPayload::build(&self.targets, &self.context)
    }

    /// Pushes the payload if a sink and record id are present and the list
    /// changed. Returns whether a push was attempted.
    pub fn sync_if_changed(&mut self) -> bool {
        let Some(sink) = self.sink.as_ref() else {
            return false;
        };
        if self.context.record_id.is_none() || !self.has_changed() {
            return false;
        }
        let payload = SyncPayload::build(&self.targets, &self.context);
        match sink.push(&self.context, &payload) {
            Ok(()) => self.last_sync_error = None,
            Err(err) => {
                error!("{err}");
                self.last_sync_error = Some(err.to_string());
            }
        }
        true
    }

    fn after_mutation(&mut self) {
        self.sync_if_changed();
    }

    pub fn mapped_rows(&self, rows: &[CanonicalRow], script_name: &str) -> Vec<MappedRow> {
        let field_keys = self.targets.iter().map(|t| t.name.clone()).collect::<Vec<_>>();
        let form_id = self.context.form_id_string();
        let uploaded_column_keys = self
            .targets
            .iter()
            .map(|t| t.mapped_source_field.clone().unwrap_or_default())
            .collect::<Vec<_>>();
        rows.iter()
            .map(|row| MappedRow {
                values: project_row(&self.targets, row),
                script_name: script_name.to_string(),
                field_keys: field_keys.clone(),
                form_id: form_id.clone(),
                uploaded_column_keys: uploaded_column_keys.clone(),
                all_column_keys: self.displayable.clone(),
            })
            .collect()
    }

    /// Current list as backend-shaped mappings, for writing back to disk.
    pub fn to_initial_mappings(&self) -> Vec<InitialMapping> {
        self.targets
            .iter()
            .map(|t| InitialMapping {
                label: t.name.clone(),
                source_api_field: t.mapped_source_field.clone(),
            })
            .collect()
    }
}
