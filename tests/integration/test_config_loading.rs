use serde_json::json;
use serial_test::serial;
use std::env;
use std::fs;
use swrunner::core::config::ConfigLoader;
use swrunner::core::types::ErrorCategory;
use swrunner::core::{Workflow, WorkflowRunner};
use tempfile::TempDir;

fn clear_swrunner_env() {
    for v in &[
        "SWRUNNER_RUNTIME_NAME",
        "SWRUNNER_SHELL",
        "SWRUNNER_EXPR_MAX_OPERATIONS",
        "SWRUNNER_HTTP_TIMEOUT_SECONDS",
    ] {
        env::remove_var(v);
    }
}

#[test]
#[serial]
fn test_missing_file_yields_defaults() {
    clear_swrunner_env();
    let temp_dir = TempDir::new().unwrap();

    let config = ConfigLoader::load_from_dir(temp_dir.path()).unwrap();
    assert_eq!(config.runtime.name, "swrunner");
    assert_eq!(config.shell.program, "sh");
    assert_eq!(config.expression.max_operations, 50_000);
    assert_eq!(config.http.timeout_seconds, 30);
}

#[test]
#[serial]
fn test_config_file_sections_are_loaded() {
    clear_swrunner_env();
    let temp_dir = TempDir::new().unwrap();
    let config_content = r#"
[runtime]
name = "edge-runner"

[runtime.metadata]
region = "eu-west-1"

[expression]
max_operations = 1000

[shell]
program = "bash"
args = ["-eu", "-c"]
output_capture_limit_bytes = 4096

[http]
timeout_seconds = 5
user_agent = "edge/1.0"

[logging]
default_level = "debug"
"#;
    fs::write(temp_dir.path().join("swrunner.toml"), config_content).unwrap();

    let config = ConfigLoader::load_from_dir(temp_dir.path()).unwrap();
    assert_eq!(config.runtime.name, "edge-runner");
    assert_eq!(config.runtime.metadata.get("region"), Some(&json!("eu-west-1")));
    assert_eq!(config.expression.max_operations, 1000);
    assert_eq!(config.shell.program, "bash");
    assert_eq!(config.shell.args, vec!["-eu".to_string(), "-c".to_string()]);
    assert_eq!(config.shell.output_capture_limit_bytes, 4096);
    assert_eq!(config.http.timeout_seconds, 5);
    assert_eq!(config.http.user_agent, "edge/1.0");
}

#[test]
#[serial]
fn test_environment_overrides_file_values() {
    clear_swrunner_env();
    let temp_dir = TempDir::new().unwrap();
    fs::write(
        temp_dir.path().join("swrunner.toml"),
        "[runtime]\nname = \"from-file\"\n\n[http]\ntimeout_seconds = 5\n",
    )
    .unwrap();

    env::set_var("SWRUNNER_RUNTIME_NAME", "from-env");
    env::set_var("SWRUNNER_HTTP_TIMEOUT_SECONDS", "12");
    env::set_var("SWRUNNER_EXPR_MAX_OPERATIONS", "not-a-number");

    let config = ConfigLoader::load_from_dir(temp_dir.path()).unwrap();
    assert_eq!(config.runtime.name, "from-env");
    assert_eq!(config.http.timeout_seconds, 12);
    // Unparseable overrides are ignored.
    assert_eq!(config.expression.max_operations, 50_000);

    clear_swrunner_env();
}

#[test]
#[serial]
fn test_invalid_values_fail_validation() {
    clear_swrunner_env();
    let temp_dir = TempDir::new().unwrap();
    fs::write(
        temp_dir.path().join("swrunner.toml"),
        "[shell]\noutput_capture_limit_bytes = 0\n",
    )
    .unwrap();

    let err = ConfigLoader::load_from_dir(temp_dir.path()).unwrap_err();
    assert!(err.is_category(ErrorCategory::Configuration));
    assert!(err.to_string().contains("output_capture_limit_bytes"));
}

#[test]
#[serial]
fn test_malformed_toml_is_configuration_error() {
    clear_swrunner_env();
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("swrunner.toml"), "[runtime\nname = ").unwrap();

    let err = ConfigLoader::load_from_dir(temp_dir.path()).unwrap_err();
    assert!(err.is_category(ErrorCategory::Configuration));
    assert!(err.to_string().contains("failed to parse config file"));
}

#[tokio::test]
#[serial]
async fn test_runtime_descriptor_comes_from_config() {
    clear_swrunner_env();
    let temp_dir = TempDir::new().unwrap();
    fs::write(
        temp_dir.path().join("swrunner.toml"),
        "[runtime]\nname = \"lab\"\n",
    )
    .unwrap();
    let config = ConfigLoader::load_from_dir(temp_dir.path()).unwrap();

    let source = r#"
document:
  dsl: "1.0.0"
  namespace: test
  name: runtime
  version: "0.1.0"
do:
  - describe:
      set:
        runtime: "${ $runtime.name }"
        version: "${ $runtime.version }"
"#;
    let runner = WorkflowRunner::builder(Workflow::from_yaml_str(source).unwrap())
        .with_config(config)
        .build()
        .unwrap();
    let output = runner.run(json!({})).await.unwrap();
    assert_eq!(output["runtime"], json!("lab"));
    assert_eq!(output["version"], json!(swrunner::VERSION));
}
