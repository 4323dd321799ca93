//! Flow documents: a project, one flow, its endpoints, environment and steps
//! in a single JSON or TOML file.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::model::{Endpoint, EnvironmentVariable, Flow, FlowStepDto, Project, RunConfig};
use crate::error::FlowError;
use crate::store::MemoryStore;

/// Supported document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    /// `.json`
    Json,
    /// `.toml`
    Toml,
}

impl DocumentFormat {
    pub fn from_path(path: &Path) -> Result<Self, FlowError> {
        match path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).as_deref() {
            Some("json") => Ok(DocumentFormat::Json),
            Some("toml") => Ok(DocumentFormat::Toml),
            _ => Err(FlowError::ConfigError(format!(
                "{}: expected a .json or .toml flow document",
                path.display()
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowDocument {
    pub project: Project,
    pub flow: Flow,
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
    /// Variables of the project's environment.
    #[serde(default)]
    pub environment: Vec<EnvironmentVariable>,
    pub steps: Vec<FlowStepDto>,
    /// Defaults for `flowpilot run`; command-line flags win.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run: Option<RunConfig>,
}

impl FlowDocument {
    pub fn parse(content: &str, format: DocumentFormat) -> Result<Self, FlowError> {
        let value = match format {
            DocumentFormat::Json => serde_json::from_str::<Value>(content)
                .map_err(|e| FlowError::ConfigError(e.to_string()))?,
            DocumentFormat::Toml => {
                // TOML → toml::Value → serde_json::Value, so `Value` fields (bodies,
                // processors) come out as JSON trees
                let toml_val: toml::Value =
                    toml::from_str(content).map_err(|e| FlowError::ConfigError(e.to_string()))?;
                toml_value_to_json(toml_val)
            }
        };
        serde_json::from_value(value).map_err(|e| FlowError::ConfigError(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, FlowError> {
        let format = DocumentFormat::from_path(path)?;
        let content = std::fs::read_to_string(path)
            .map_err(|e| FlowError::ConfigError(format!("{}: {}", path.display(), e)))?;
        Self::parse(&content, format)
    }

    /// Insert the project, flow, endpoints and environment into `store`.
    /// Steps are left out; they go through `configure_flow`.
    pub async fn install(&self, store: &MemoryStore) -> Result<(), FlowError> {
        if self.flow.project_id != self.project.id {
            return Err(FlowError::ConfigError(format!(
                "flow {} belongs to project {}, document declares project {}",
                self.flow.id, self.flow.project_id, self.project.id
            )));
        }
        store.insert_project(self.project.clone()).await;
        store.insert_flow(self.flow.clone()).await;
        for endpoint in &self.endpoints {
            store.insert_endpoint(endpoint.clone()).await;
        }
        for variable in &self.environment {
            store.insert_variable(variable.clone()).await;
        }
        Ok(())
    }
}

/// TOML has no null; datetimes become strings.
fn toml_value_to_json(val: toml::Value) -> Value {
    match val {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::from(i),
        toml::Value::Float(f) => Value::from(f),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Array(arr) => Value::Array(arr.into_iter().map(toml_value_to_json).collect()),
        toml::Value::Table(tbl) => Value::Object(
            tbl.into_iter()
                .map(|(k, v)| (k, toml_value_to_json(v)))
                .collect::<Map<String, Value>>(),
        ),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
    }
}
