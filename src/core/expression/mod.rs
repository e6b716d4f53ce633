//! Runtime expression port.
//!
//! Workflow documents embed expressions either wrapped as `${ ... }` (inside templates) or as
//! bare strings in fields that are always expressions (`if`, `when`, `for.in`, ...). The
//! engine talks to an [`ExpressionEvaluator`]; [`RhaiEvaluator`] is the default adapter.

pub mod rhai_engine;

pub use rhai_engine::RhaiEvaluator;

use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// Variables visible to an expression, keyed by name without the leading `$`.
pub type ExpressionVars = HashMap<String, Value>;

#[derive(Debug, Error)]
pub enum ExpressionError {
    #[error("failed to compile expression '{expression}': {message}")]
    Compile { expression: String, message: String },

    #[error("failed to evaluate expression '{expression}': {message}")]
    Evaluation { expression: String, message: String },
}

pub trait ExpressionEvaluator: Send + Sync {
    /// Evaluate `expression` against `input` with the given variables.
    fn evaluate(
        &self,
        expression: &str,
        input: &Value,
        vars: &ExpressionVars,
    ) -> Result<Value, ExpressionError>;

    /// Evaluate a guard. Failures and non-boolean results count as `false`.
    fn evaluate_bool(&self, expression: &str, input: &Value, vars: &ExpressionVars) -> bool {
        match self.evaluate(&normalize_expr(expression), input, vars) {
            Ok(Value::Bool(result)) => result,
            Ok(other) => {
                tracing::debug!(expression, result = %other, "guard produced a non-boolean value");
                false
            }
            Err(err) => {
                tracing::debug!(expression, error = %err, "guard evaluation failed");
                false
            }
        }
    }
}

/// True for strings written as `${ ... }`.
pub fn is_strict_expr(expression: &str) -> bool {
    let trimmed = expression.trim();
    trimmed.starts_with("${") && trimmed.ends_with('}')
}

/// Strip the `${ }` wrapper.
pub fn sanitize_expr(expression: &str) -> String {
    let trimmed = expression.trim();
    if is_strict_expr(trimmed) {
        trimmed[2..trimmed.len() - 1].trim().to_string()
    } else {
        trimmed.to_string()
    }
}

/// Expression text ready for evaluation, wrapped or not.
pub fn normalize_expr(expression: &str) -> String {
    sanitize_expr(expression)
}

/// Rebuild `node`, replacing every `${ ... }` string found in it by its evaluated value.
/// Plain strings, numbers and keys are copied as they are.
pub fn traverse_and_evaluate(
    evaluator: &dyn ExpressionEvaluator,
    node: &Value,
    input: &Value,
    vars: &ExpressionVars,
) -> Result<Value, ExpressionError> {
    match node {
        Value::String(text) if is_strict_expr(text) => {
            evaluator.evaluate(&sanitize_expr(text), input, vars)
        }
        Value::Object(map) => {
            let mut result = serde_json::Map::with_capacity(map.len());
            for (key, value) in map {
                result.insert(
                    key.clone(),
                    traverse_and_evaluate(evaluator, value, input, vars)?,
                );
            }
            Ok(Value::Object(result))
        }
        Value::Array(items) => items
            .iter()
            .map(|item| traverse_and_evaluate(evaluator, item, input, vars))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        other => Ok(other.clone()),
    }
}

/// Evaluate a `from`/`as` transform: a string is an expression with or without the wrapper,
/// anything else is a template.
pub fn evaluate_transform(
    evaluator: &dyn ExpressionEvaluator,
    transform: &Value,
    input: &Value,
    vars: &ExpressionVars,
) -> Result<Value, ExpressionError> {
    match transform {
        Value::String(text) => evaluator.evaluate(&normalize_expr(text), input, vars),
        other => traverse_and_evaluate(evaluator, other, input, vars),
    }
}
