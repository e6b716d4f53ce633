use super::{TaskRunner, TaskSupport};
use crate::core::error::WorkflowError;
use crate::core::model::SetTask;
use async_trait::async_trait;
use serde_json::Value;

/// Evaluates the `set` template and merges the result over the input.
#[derive(Debug)]
pub struct SetTaskRunner {
    name: String,
    template: Value,
}

impl SetTaskRunner {
    pub fn new(name: &str, task: &SetTask) -> Self {
        SetTaskRunner {
            name: name.to_string(),
            template: task.set.clone(),
        }
    }
}

#[async_trait]
impl TaskRunner for SetTaskRunner {
    async fn run(&self, input: Value, support: &TaskSupport) -> Result<Value, WorkflowError> {
        let reference = support.context.task_reference().unwrap_or_default();
        let evaluated = match &self.template {
            Value::String(expression) => support.evaluate(expression, &input),
            template => support.traverse(template, &input),
        }
        .map_err(|err| WorkflowError::expression(err, &reference))?;

        let values = match evaluated {
            Value::Object(values) => values,
            other => {
                return Err(WorkflowError::runtime(
                    format!(
                        "set task '{}' must produce an object, got {}",
                        self.name, other
                    ),
                    &reference,
                ))
            }
        };

        match input {
            Value::Object(mut merged) => {
                merged.extend(values);
                Ok(Value::Object(merged))
            }
            _ => Ok(Value::Object(values)),
        }
    }

    fn task_name(&self) -> &str {
        &self.name
    }
}
