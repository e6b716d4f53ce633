pub mod loader;
pub mod validation;

pub use loader::{ConfigLoader, CONFIG_FILE_NAME};
pub use validation::ConfigValidator;

use serde::{Deserialize, Serialize};

/// Engine configuration loaded from swrunner.toml
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    /// Runtime descriptor exposed to expressions as `$runtime`
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// Expression engine limits
    #[serde(default)]
    pub expression: ExpressionConfig,

    /// Shell task configuration
    #[serde(default)]
    pub shell: ShellConfig,

    /// HTTP call configuration
    #[serde(default)]
    pub http: HttpConfig,
}

/// Runtime descriptor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default = "default_runtime_name")]
    pub name: String,

    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Limits applied to the expression engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpressionConfig {
    #[serde(default = "default_max_operations")]
    pub max_operations: u64,

    #[serde(default = "default_max_call_levels")]
    pub max_call_levels: usize,

    #[serde(default = "default_max_expr_depth")]
    pub max_expr_depth: usize,
}

/// Shell used by `run: shell` tasks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellConfig {
    #[serde(default = "default_shell_program")]
    pub program: String,

    #[serde(default = "default_shell_args")]
    pub args: Vec<String>,

    /// Captured stdout/stderr is truncated beyond this many bytes
    #[serde(default = "default_output_capture_limit")]
    pub output_capture_limit_bytes: usize,
}

/// Outbound HTTP configuration for `call: http` tasks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_timeout_seconds")]
    pub timeout_seconds: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

// Default functions
fn default_runtime_name() -> String {
    env!("CARGO_PKG_NAME").to_string()
}

fn default_max_operations() -> u64 {
    50_000
}

fn default_max_call_levels() -> usize {
    64
}

fn default_max_expr_depth() -> usize {
    64
}

fn default_shell_program() -> String {
    "sh".to_string()
}

fn default_shell_args() -> Vec<String> {
    vec!["-c".to_string()]
}

fn default_output_capture_limit() -> usize {
    1_048_576
}

fn default_http_timeout_seconds() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            name: default_runtime_name(),
            metadata: serde_json::Map::new(),
        }
    }
}

impl Default for ExpressionConfig {
    fn default() -> Self {
        ExpressionConfig {
            max_operations: default_max_operations(),
            max_call_levels: default_max_call_levels(),
            max_expr_depth: default_max_expr_depth(),
        }
    }
}

impl Default for ShellConfig {
    fn default() -> Self {
        ShellConfig {
            program: default_shell_program(),
            args: default_shell_args(),
            output_capture_limit_bytes: default_output_capture_limit(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        HttpConfig {
            timeout_seconds: default_http_timeout_seconds(),
            user_agent: default_user_agent(),
        }
    }
}
