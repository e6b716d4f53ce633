use super::{ConfigValidator, EngineConfig};
use crate::core::error::WorkflowError;
use crate::core::types::ErrorCategory;
use std::env;
use std::path::Path;

/// File name looked up when loading configuration from a directory.
pub const CONFIG_FILE_NAME: &str = "swrunner.toml";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load config from a directory (dir/swrunner.toml).
    /// Environment variables override config file values; a missing file yields defaults.
    pub fn load_from_dir(dir: &Path) -> Result<EngineConfig, WorkflowError> {
        Self::load(&dir.join(CONFIG_FILE_NAME))
    }

    /// Load config from a specific path, apply env overrides and validate.
    pub fn load(path: &Path) -> Result<EngineConfig, WorkflowError> {
        let mut config = Self::load_from_file(path)?.unwrap_or_default();
        Self::apply_env_overrides(&mut config);
        ConfigValidator::validate(&config)?;
        Ok(config)
    }

    /// Load config from specific file path
    /// Returns Ok(None) if file doesn't exist
    pub fn load_from_file(path: &Path) -> Result<Option<EngineConfig>, WorkflowError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            WorkflowError::new(
                ErrorCategory::Configuration,
                format!("failed to read config file {}: {}", path.display(), e),
            )
        })?;

        let config: EngineConfig = toml::from_str(&content).map_err(|e| {
            WorkflowError::new(
                ErrorCategory::Configuration,
                format!("failed to parse config file {}: {}", path.display(), e),
            )
        })?;

        Ok(Some(config))
    }

    /// Apply environment variable overrides to the configuration
    fn apply_env_overrides(config: &mut EngineConfig) {
        if let Ok(name) = env::var("SWRUNNER_RUNTIME_NAME") {
            if !name.trim().is_empty() {
                config.runtime.name = name;
            }
        }

        if let Ok(shell) = env::var("SWRUNNER_SHELL") {
            if !shell.trim().is_empty() {
                config.shell.program = shell;
            }
        }

        if let Ok(raw) = env::var("SWRUNNER_EXPR_MAX_OPERATIONS") {
            if let Ok(max_operations) = raw.trim().parse::<u64>() {
                config.expression.max_operations = max_operations;
            }
        }

        if let Ok(raw) = env::var("SWRUNNER_HTTP_TIMEOUT_SECONDS") {
            if let Ok(timeout) = raw.trim().parse::<u64>() {
                config.http.timeout_seconds = timeout;
            }
        }
    }
}
