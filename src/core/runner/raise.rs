use super::{TaskRunner, TaskSupport};
use crate::core::error::WorkflowError;
use crate::core::expression::is_strict_expr;
use crate::core::model::{ErrorDefinition, RaiseError, RaiseTask, Workflow};
use crate::core::types::ErrorCategory;
use async_trait::async_trait;
use serde_json::Value;

/// Raises the error definition resolved when the runner was built.
#[derive(Debug)]
pub struct RaiseTaskRunner {
    name: String,
    definition: ErrorDefinition,
}

impl RaiseTaskRunner {
    pub fn new(
        name: &str,
        task: &RaiseTask,
        reference: &str,
        workflow: &Workflow,
    ) -> Result<Self, WorkflowError> {
        let definition = match &task.raise.error {
            RaiseError::Definition(definition) => definition.clone(),
            RaiseError::Ref(error_ref) => workflow
                .error_definition(error_ref)
                .cloned()
                .ok_or_else(|| {
                    WorkflowError::validation(
                        format!(
                            "raise task '{}' references undefined error '{}'",
                            name, error_ref
                        ),
                        reference,
                    )
                })?,
        };
        Ok(RaiseTaskRunner {
            name: name.to_string(),
            definition,
        })
    }

    pub fn definition(&self) -> &ErrorDefinition {
        &self.definition
    }

    fn resolve_text(
        &self,
        text: Option<&str>,
        input: &Value,
        support: &TaskSupport,
        reference: &str,
    ) -> Result<Option<String>, WorkflowError> {
        let Some(text) = text else {
            return Ok(None);
        };
        if !is_strict_expr(text) {
            return Ok(Some(text.to_string()));
        }
        let value = support
            .evaluate(text, input)
            .map_err(|err| WorkflowError::expression(err, reference))?;
        Ok(Some(match value {
            Value::String(s) => s,
            other => other.to_string(),
        }))
    }
}

#[async_trait]
impl TaskRunner for RaiseTaskRunner {
    async fn run(&self, input: Value, support: &TaskSupport) -> Result<Value, WorkflowError> {
        let reference = support.context.task_reference().unwrap_or_default();
        let title =
            self.resolve_text(self.definition.title.as_deref(), &input, support, &reference)?;
        let detail =
            self.resolve_text(self.definition.detail.as_deref(), &input, support, &reference)?;

        let mut error = match ErrorCategory::from_type_uri(&self.definition.error_type) {
            Some(category) => WorkflowError::for_category(category, "", &reference)
                .with_status(self.definition.status),
            None => {
                WorkflowError::custom(self.definition.error_type.clone(), self.definition.status)
                    .with_instance(reference.as_str())
            }
        };
        error.detail = detail;
        if let Some(title) = title {
            error = error.with_title(title);
        }

        tracing::debug!(task = %reference, error_type = %error.error_type, "raising error");
        Err(error)
    }

    fn task_name(&self) -> &str {
        &self.name
    }
}
