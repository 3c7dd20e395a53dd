//! Mapping documents and backend settings.
//!
//! A mapping document describes one mapping session: the backend record it
//! belongs to, the form it feeds and the label/source pairs to bootstrap
//! from. Documents are YAML unless the path ends in `.json`.

use std::{env, fs, path::Path};

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    mapping::{InitialMapping, MappingSession},
    sync::{DEFAULT_RESOURCE, SessionContext, SyncMode},
};

pub const API_URL_ENV: &str = "FIELD_MAPPER_API_URL";
pub const LEGACY_API_URL_ENV: &str = "NEXT_PUBLIC_API_URL";
pub const TOKEN_ENV: &str = "FIELD_MAPPER_TOKEN";

fn default_resource() -> String {
    DEFAULT_RESOURCE.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
    #[serde(default = "default_resource")]
    pub resource: String,
    #[serde(default)]
    pub name: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_id: Option<Value>,
    #[serde(default)]
    pub sync_mode: SyncMode,
    #[serde(default)]
    pub fields: Vec<InitialMapping>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hidden_source_fields: Vec<String>,
}

impl Default for MappingDocument {
    fn default() -> Self {
        Self {
            table_name: None,
            record_id: None,
            resource: default_resource(),
            name: Vec::new(),
            form_id: None,
            sync_mode: SyncMode::default(),
            fields: Vec::new(),
            hidden_source_fields: Vec::new(),
        }
    }
}

fn is_json_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

impl MappingDocument {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Opening mapping file {path:?}"))?;
        let document = if is_json_path(path) {
            serde_json::from_str(&raw).context("Parsing mapping JSON")?
        } else {
            serde_yaml::from_str(&raw).context("Parsing mapping YAML")?
        };
        Ok(document)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let serialized = if is_json_path(path) {
            serde_json::to_string_pretty(self).context("Serializing mapping JSON")?
        } else {
            serde_yaml::to_string(self).context("Serializing mapping YAML")?
        };
        fs::write(path, serialized).with_context(|| format!("Writing mapping file {path:?}"))
    }

    pub fn session_context(&self) -> SessionContext {
        SessionContext {
            record_id: self.record_id.clone().filter(|id| !id.trim().is_empty()),
            form_id: self.form_id.clone(),
            mapping_names: self.name.clone(),
            resource: self.resource.clone(),
            sync_mode: self.sync_mode,
        }
    }

    /// Bootstraps a session over `headers` and applies the hidden fields.
    pub fn start_session(&self, headers: Vec<String>) -> MappingSession {
        let mut session =
            MappingSession::bootstrap(&self.fields, headers).with_context(self.session_context());
        for hidden in &self.hidden_source_fields {
            session.hide_source_field(hidden);
        }
        session
    }

    /// Copy of this document carrying the session's current field list.
    pub fn with_session(&self, session: &MappingSession) -> Self {
        let headers = session.headers();
        let displayable = session.displayable_source_fields();
        // Hidden fields absent from this source are kept for other uploads.
        let hidden_source_fields = self
            .hidden_source_fields
            .iter()
            .filter(|h| !headers.contains(*h))
            .chain(headers.iter().filter(|h| !displayable.contains(*h)))
            .cloned()
            .collect();
        Self {
            fields: session.to_initial_mappings(),
            hidden_source_fields,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendSettings {
    pub api_url: Option<String>,
    pub token: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl BackendSettings {
    pub fn from_env() -> Self {
        let api_url = env::var(API_URL_ENV)
            .or_else(|_| env::var(LEGACY_API_URL_ENV))
            .ok()
            .filter(|v| !v.trim().is_empty());
        let token = env::var(TOKEN_ENV).ok();
        debug!("Backend URL from environment: {api_url:?}");
        Self {
            api_url,
            token,
            timeout_secs: None,
        }
    }

    pub fn with_overrides(
        mut self,
        api_url: Option<String>,
        token: Option<String>,
        timeout_secs: Option<u64>,
    ) -> Self {
        if api_url.is_some() {
            self.api_url = api_url;
        }
        if token.is_some() {
            self.token = token;
        }
        if timeout_secs.is_some() {
            self.timeout_secs = timeout_secs;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_document_uses_backend_field_names() {
        let yaml = r#"
table_name: patients
record_id: "42"
form_id: 7
name: [Intake]
fields:
  - label: Patient ID
    sourceApiField: id
  - label: Notes
hidden_source_fields: [meta.internal]
"#;
        let document: MappingDocument = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(document.resource, "file-uploads");
        assert_eq!(document.sync_mode, SyncMode::NamesOnly);
        assert_eq!(document.fields[0].source_api_field.as_deref(), Some("id"));
        assert_eq!(document.fields[1].source_api_field, None);
        assert_eq!(document.session_context().form_id_string(), "7");
    }

    #[test]
    fn hidden_fields_survive_write_back() {
        let document = MappingDocument {
            fields: vec![InitialMapping {
                label: "Secret".to_string(),
                source_api_field: Some("meta.internal".to_string()),
            }],
            hidden_source_fields: vec!["meta.internal".to_string()],
            ..MappingDocument::default()
        };
        let headers = vec!["id".to_string(), "meta.internal".to_string()];
        let session = document.start_session(headers);
        assert_eq!(session.targets()[0].mapped_source_field, None);

        let written = document.with_session(&session);
        assert_eq!(written.hidden_source_fields, vec!["meta.internal"]);
        assert_eq!(written.fields[0].source_api_field, None);
    }

    #[test]
    fn overrides_replace_environment_values() {
        let settings = BackendSettings {
            api_url: Some("http://env".to_string()),
            token: Some("env-token".to_string()),
            timeout_secs: None,
        }
        .with_overrides(Some("http://flag".to_string()), None, Some(5));
        assert_eq!(settings.api_url.as_deref(), Some("http://flag"));
        assert_eq!(settings.token.as_deref(), Some("env-token"));
        assert_eq!(settings.timeout_secs, Some(5));
    }
}
