//! JSON-Schema port used by the input/output/export pipeline.

use crate::core::model::Schema;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("unsupported schema format '{0}'")]
    UnsupportedFormat(String),

    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    #[error("schema validation failed: {0}")]
    Violation(String),
}

pub trait SchemaValidator: Send + Sync {
    /// Validate `data` against `schema`. A missing schema always validates.
    fn validate(&self, data: &Value, schema: Option<&Schema>) -> Result<(), SchemaError>;
}

/// Validator backed by the `jsonschema` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonSchemaValidator;

impl SchemaValidator for JsonSchemaValidator {
    fn validate(&self, data: &Value, schema: Option<&Schema>) -> Result<(), SchemaError> {
        let Some(schema) = schema else {
            return Ok(());
        };
        if !schema.format.eq_ignore_ascii_case("json") {
            return Err(SchemaError::UnsupportedFormat(schema.format.clone()));
        }
        let Some(document) = schema.document.as_ref() else {
            return Ok(());
        };

        let validator = jsonschema::validator_for(document)
            .map_err(|err| SchemaError::InvalidSchema(err.to_string()))?;
        let violations: Vec<String> = validator
            .iter_errors(data)
            .map(|err| {
                let path = err.instance_path.to_string();
                if path.is_empty() {
                    err.to_string()
                } else {
                    format!("{} at {}", err, path)
                }
            })
            .collect();

        if violations.is_empty() {
            Ok(())
        } else {
            Err(SchemaError::Violation(violations.join("; ")))
        }
    }
}
