//! Input, output and export processing applied around every task and around the workflow.

use super::TaskSupport;
use crate::core::error::WorkflowError;
use crate::core::model::{Export, Input, Output};
use serde_json::Value;

/// Validate the raw input against `input.schema`, then apply `input.from`.
pub fn process_input(
    definition: Option<&Input>,
    input: Value,
    support: &TaskSupport,
    reference: &str,
) -> Result<Value, WorkflowError> {
    let Some(definition) = definition else {
        return Ok(input);
    };

    support
        .validate(&input, definition.schema.as_ref())
        .map_err(|err| WorkflowError::validation(format!("input: {}", err), reference))?;

    match &definition.from {
        Some(from) => support
            .transform(from, &input)
            .map_err(|err| WorkflowError::expression(format!("input.from: {}", err), reference)),
        None => Ok(input),
    }
}

/// Apply `output.as` to the raw output, then validate against `output.schema`.
pub fn process_output(
    definition: Option<&Output>,
    output: Value,
    support: &TaskSupport,
    reference: &str,
) -> Result<Value, WorkflowError> {
    let Some(definition) = definition else {
        return Ok(output);
    };

    let output = match &definition.as_ {
        Some(transform) => support.transform(transform, &output).map_err(|err| {
            WorkflowError::expression(format!("output.as: {}", err), reference)
        })?,
        None => output,
    };

    support
        .validate(&output, definition.schema.as_ref())
        .map_err(|err| WorkflowError::validation(format!("output: {}", err), reference))?;
    Ok(output)
}

/// Apply `export.as` to the task output, validate it and replace `$context` with the result.
pub fn process_export(
    definition: Option<&Export>,
    output: &Value,
    support: &TaskSupport,
    reference: &str,
) -> Result<(), WorkflowError> {
    let Some(definition) = definition else {
        return Ok(());
    };
    let Some(transform) = &definition.as_ else {
        return Ok(());
    };

    let exported = support.transform(transform, output).map_err(|err| {
        WorkflowError::expression(format!("export.as: {}", err), reference)
    })?;
    support
        .validate(&exported, definition.schema.as_ref())
        .map_err(|err| WorkflowError::validation(format!("export: {}", err), reference))?;

    support.context.set_instance_ctx(exported);
    Ok(())
}
