pub mod duration;
pub mod task;

pub use duration::{DurationInline, DurationSpec, Timeout};
pub use task::{
    CallTask, DoTask, FlowDirective, ForSpec, ForTask, ForkSpec, ForkTask, ProcessReturnType,
    RaiseError, RaiseSpec, RaiseTask, RunSpec, RunTask, SetTask, ShellSpec, SwitchCase,
    SwitchTask, Task, TaskBase, TaskItem, TaskList,
};

use crate::core::error::WorkflowError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

/// Parsed workflow document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub document: Document,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Input>,
    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    pub use_: Option<Use>,
    #[serde(rename = "do")]
    pub do_: TaskList,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Output>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Timeout>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub dsl: String,
    pub namespace: String,
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

/// Reusable components declared under `use`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Use {
    #[serde(default)]
    pub errors: IndexMap<String, ErrorDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(default = "default_schema_format")]
    pub format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<Value>,
}

fn default_schema_format() -> String {
    "json".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Input {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Output {
    #[serde(rename = "as", default, skip_serializing_if = "Option::is_none")]
    pub as_: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Export {
    #[serde(rename = "as", default, skip_serializing_if = "Option::is_none")]
    pub as_: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
}

/// Error shape shared by `use.errors` entries and inline `raise` definitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDefinition {
    #[serde(rename = "type")]
    pub error_type: String,
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
}

impl Workflow {
    /// Parse a workflow from YAML (JSON is accepted as a YAML subset).
    pub fn from_yaml_str(source: &str) -> Result<Self, WorkflowError> {
        serde_yaml::from_str(source).map_err(|e| {
            WorkflowError::validation(format!("failed to parse workflow: {}", e), "/")
        })
    }

    /// Error definition registered under `use.errors`.
    pub fn error_definition(&self, name: &str) -> Option<&ErrorDefinition> {
        self.use_.as_ref().and_then(|u| u.errors.get(name))
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Load a workflow document from disk.
pub fn load_workflow(path: &Path) -> Result<Workflow, WorkflowError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        WorkflowError::configuration(
            format!("failed to read workflow {}: {}", path.display(), e),
            "/",
        )
    })?;
    Workflow::from_yaml_str(&content)
}
