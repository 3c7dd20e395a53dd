//! Synchronising the target-field list with the backend.
//!
//! The deployed `map-to-form` endpoint receives the ordered list of target
//! names only; source bindings travel through format-specific endpoints.
//! `SyncMode::WithBindings` sends `{label, sourceApiField}` pairs instead for
//! backends that accept them.

use std::time::Duration;

use clap::ValueEnum;
use log::{debug, info};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{config::BackendSettings, error::SyncError, mapping::TargetField};

pub const DEFAULT_RESOURCE: &str = "file-uploads";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
#[value(rename_all = "kebab-case")]
pub enum SyncMode {
    #[default]
    NamesOnly,
    WithBindings,
}

/// Addressing details for the mapping endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionContext {
    pub record_id: Option<String>,
    pub form_id: Option<Value>,
    pub mapping_names: Vec<String>,
    pub resource: String,
    pub sync_mode: SyncMode,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self {
            record_id: None,
            form_id: None,
            mapping_names: Vec::new(),
            resource: DEFAULT_RESOURCE.to_string(),
            sync_mode: SyncMode::default(),
        }
    }
}

impl SessionContext {
    /// The form id as carried on mapped rows: its string form, or empty.
    pub fn form_id_string(&self) -> String {
        match &self.form_id {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SyncField {
    Name(String),
    Binding {
        label: String,
        #[serde(rename = "sourceApiField")]
        source_api_field: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncPayload {
    pub fields: Vec<SyncField>,
    pub name: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form_id: Option<Value>,
}

impl SyncPayload {
    pub fn build(targets: &[TargetField], context: &SessionContext) -> Self {
        let fields = targets
            .iter()
            .map(|target| match context.sync_mode {
                SyncMode::NamesOnly => SyncField::Name(target.name.clone()),
                SyncMode::WithBindings => SyncField::Binding {
                    label: target.name.clone(),
                    source_api_field: target.mapped_source_field.clone(),
                },
            })
            .collect();
        Self {
            fields,
            name: context.mapping_names.clone(),
            form_id: context.form_id.clone(),
        }
    }
}

/// Receives the sync payload after a mapping change.
pub trait MappingSink {
    fn push(&self, context: &SessionContext, payload: &SyncPayload) -> Result<(), SyncError>;
}

pub struct HttpMappingSink {
    client: Client,
    api_url: String,
    token: Option<String>,
}

impl HttpMappingSink {
    pub fn new(settings: &BackendSettings) -> Result<Self, SyncError> {
        let api_url = settings
            .api_url
            .clone()
            .filter(|url| !url.trim().is_empty())
            .ok_or(SyncError::MissingApiUrl)?;
        let mut builder = Client::builder();
        if let Some(secs) = settings.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Ok(Self {
            client: builder.build()?,
            api_url,
            token: settings.token.clone().filter(|t| !t.is_empty()),
        })
    }

    pub fn endpoint(&self, context: &SessionContext, record_id: &str) -> String {
        format!(
            "{}/api/{}/{}/map-to-form",
            self.api_url.trim_end_matches('/'),
            context.resource.trim_matches('/'),
            record_id
        )
    }
}

impl MappingSink for HttpMappingSink {
    fn push(&self, context: &SessionContext, payload: &SyncPayload) -> Result<(), SyncError> {
        let record_id = context
            .record_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or(SyncError::MissingRecordId)?;
        let url = self.endpoint(context, record_id);
        debug!("POST {url} with {} field(s)", payload.fields.len());

        let mut request = self.client.post(&url).json(payload);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send()?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            let message = if text.trim().is_empty() {
                status.canonical_reason().unwrap_or("unknown status").to_string()
            } else {
                text
            };
            return Err(SyncError::Rejected {
                status: status.as_u16(),
                message,
            });
        }
        info!("Synced {} target field(s) for record {record_id}", payload.fields.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::FieldId;
    use serde_json::json;

    fn targets() -> Vec<TargetField> {
        vec![
            TargetField {
                id: FieldId::generate(),
                name: "Patient".to_string(),
                mapped_source_field: Some("name".to_string()),
            },
            TargetField {
                id: FieldId::generate(),
                name: "Age".to_string(),
                mapped_source_field: None,
            },
        ]
    }

    #[test]
    fn names_only_payload_matches_deployed_contract() {
        let context = SessionContext {
            form_id: Some(json!(7)),
            mapping_names: vec!["Intake".to_string()],
            ..SessionContext::default()
        };
        let payload = SyncPayload::build(&targets(), &context);
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({"fields": ["Patient", "Age"], "name": ["Intake"], "form_id": 7})
        );
    }

    #[test]
    fn binding_payload_carries_sources() {
        let context = SessionContext {
            sync_mode: SyncMode::WithBindings,
            ..SessionContext::default()
        };
        let payload = SyncPayload::build(&targets(), &context);
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({
                "fields": [
                    {"label": "Patient", "sourceApiField": "name"},
                    {"label": "Age", "sourceApiField": null}
                ],
                "name": []
            })
        );
    }

    #[test]
    fn endpoint_joins_resource_and_record() {
        let settings = BackendSettings {
            api_url: Some("http://localhost:8000/".to_string()),
            token: None,
            timeout_secs: None,
        };
        let sink = HttpMappingSink::new(&settings).unwrap();
        let context = SessionContext {
            resource: "api-scripts".to_string(),
            ..SessionContext::default()
        };
        assert_eq!(
            sink.endpoint(&context, "42"),
            "http://localhost:8000/api/api-scripts/42/map-to-form"
        );
    }

    #[test]
    fn missing_api_url_is_rejected() {
        let settings = BackendSettings::default();
        assert!(matches!(
            HttpMappingSink::new(&settings),
            Err(SyncError::MissingApiUrl)
        ));
    }

    #[test]
    fn form_id_string_forms() {
        let mut context = SessionContext::default();
        assert_eq!(context.form_id_string(), "");
        context.form_id = Some(json!(12));
        assert_eq!(context.form_id_string(), "12");
        context.form_id = Some(json!("abc"));
        assert_eq!(context.form_id_string(), "abc");
    }
}
