use super::{DoTaskRunner, TaskRunner, TaskSupport};
use crate::core::error::WorkflowError;
use crate::core::model::{ForTask, Workflow};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;

const DEFAULT_EACH: &str = "$item";
const DEFAULT_AT: &str = "$index";

/// Runs the nested task list once per element of the `in` collection.
#[derive(Debug)]
pub struct ForTaskRunner {
    name: String,
    each: String,
    at: String,
    collection: String,
    while_: Option<String>,
    body: DoTaskRunner,
}

/// Loop variable names always carry a leading `$`.
fn variable_name(name: Option<&str>, default: &str) -> String {
    match name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(n) if n.starts_with('$') => n.to_string(),
        Some(n) => format!("${}", n),
        None => default.to_string(),
    }
}

impl ForTaskRunner {
    pub fn new(
        name: &str,
        task: &ForTask,
        reference: &str,
        workflow: &Workflow,
    ) -> Result<Self, WorkflowError> {
        if task.for_.in_.trim().is_empty() {
            return Err(WorkflowError::validation(
                format!("for task '{}' requires an 'in' expression", name),
                reference,
            ));
        }
        Ok(ForTaskRunner {
            name: name.to_string(),
            each: variable_name(task.for_.each.as_deref(), DEFAULT_EACH),
            at: variable_name(task.for_.at.as_deref(), DEFAULT_AT),
            collection: task.for_.in_.clone(),
            while_: task.while_.clone(),
            body: DoTaskRunner::new(name, &task.do_, &format!("{}/do", reference), workflow)?,
        })
    }
}

#[async_trait]
impl TaskRunner for ForTaskRunner {
    async fn run(&self, input: Value, support: &TaskSupport) -> Result<Value, WorkflowError> {
        let reference = support.context.task_reference().unwrap_or_default();
        let collection = support
            .evaluate(&self.collection, &input)
            .map_err(|err| WorkflowError::expression(err, &reference))?;

        let items = match collection {
            Value::Null => return Ok(input),
            Value::Array(items) => items,
            single => vec![single],
        };
        tracing::debug!(task = %reference, iterations = items.len(), "for loop started");

        let mut output = input;
        for (index, item) in items.into_iter().enumerate() {
            if support.is_cancelled() {
                return Err(WorkflowError::runtime(
                    format!("for task '{}' was cancelled", self.name),
                    &reference,
                ));
            }

            let _bindings = support.context.add_local_expr_vars(HashMap::from([
                (self.each.clone(), item),
                (self.at.clone(), json!(index)),
            ]));
            output = self.body.run(output, support).await?;

            if let Some(condition) = &self.while_ {
                if !support.evaluate_bool(condition, &output) {
                    tracing::debug!(task = %reference, index, "for loop stopped by while");
                    break;
                }
            }
        }
        Ok(output)
    }

    fn task_name(&self) -> &str {
        &self.name
    }
}
