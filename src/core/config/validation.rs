use super::EngineConfig;
use crate::core::error::WorkflowError;
use crate::core::types::ErrorCategory;

pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate configuration rules
    pub fn validate(config: &EngineConfig) -> Result<(), WorkflowError> {
        if config.runtime.name.trim().is_empty() {
            return Err(WorkflowError::new(
                ErrorCategory::Configuration,
                "runtime.name cannot be empty",
            ));
        }

        if config.shell.program.trim().is_empty() {
            return Err(WorkflowError::new(
                ErrorCategory::Configuration,
                "shell.program cannot be empty",
            ));
        }

        if config.shell.output_capture_limit_bytes == 0 {
            return Err(WorkflowError::new(
                ErrorCategory::Configuration,
                "shell.output_capture_limit_bytes must be >= 1",
            ));
        }

        if config.expression.max_operations == 0 {
            return Err(WorkflowError::new(
                ErrorCategory::Configuration,
                "expression.max_operations must be >= 1",
            ));
        }

        if config.http.timeout_seconds == 0 {
            return Err(WorkflowError::new(
                ErrorCategory::Configuration,
                "http.timeout_seconds must be >= 1",
            ));
        }

        Ok(())
    }
}
