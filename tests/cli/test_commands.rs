use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

const GREETING_WORKFLOW: &str = r#"
document:
  dsl: "1.0.0"
  namespace: demo
  name: greeting
  version: "1.2.0"
use:
  errors:
    anonymous:
      type: https://serverlessworkflow.io/spec/1.0.0/errors/validation
      status: 422
      title: Anonymous Caller
do:
  - check:
      switch:
        - missingName:
            when: "${ .name == null }"
            then: reject
        - named:
            then: greet
  - reject:
      raise:
        error: anonymous
  - greet:
      set:
        message: "${ \"hello \" + .name }"
      output:
        as: .message
"#;

fn write_workflow(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

fn swrunner() -> Command {
    let mut cmd = Command::cargo_bin("swrunner").unwrap();
    cmd.env_remove("SWRUNNER_LOG_DIR")
        .env_remove("SWRUNNER_LOG_LEVEL")
        .env_remove("SWRUNNER_LOG_CONSOLE")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_run_command_help() {
    swrunner()
        .arg("run")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Execute a workflow document"));
}

#[test]
fn test_validate_command_help() {
    swrunner()
        .arg("validate")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("without running it"));
}

#[test]
fn test_version_command() {
    swrunner()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(swrunner::VERSION));
}

#[test]
fn test_run_prints_output_json() {
    let dir = TempDir::new().unwrap();
    let workflow = write_workflow(&dir, "greeting.yaml", GREETING_WORKFLOW);

    swrunner()
        .arg("run")
        .arg(&workflow)
        .arg("--input")
        .arg(r#"{"name": "ada"}"#)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"hello ada\""));
}

#[test]
fn test_run_reads_input_file() {
    let dir = TempDir::new().unwrap();
    let workflow = write_workflow(&dir, "greeting.yaml", GREETING_WORKFLOW);
    let input = dir.path().join("input.json");
    fs::write(&input, r#"{"name": "grace"}"#).unwrap();

    swrunner()
        .arg("run")
        .arg(&workflow)
        .arg("--input-file")
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"hello grace\""));
}

#[test]
fn test_failed_run_reports_typed_error() {
    let dir = TempDir::new().unwrap();
    let workflow = write_workflow(&dir, "greeting.yaml", GREETING_WORKFLOW);

    swrunner()
        .arg("run")
        .arg(&workflow)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("\"status\": 422"))
        .stderr(predicate::str::contains("\"instance\": \"/do/1/reject\""))
        .stderr(predicate::str::contains("Anonymous Caller"));
}

#[test]
fn test_invalid_input_json_is_rejected() {
    let dir = TempDir::new().unwrap();
    let workflow = write_workflow(&dir, "greeting.yaml", GREETING_WORKFLOW);

    swrunner()
        .arg("run")
        .arg(&workflow)
        .arg("--input")
        .arg("{not json")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--input is not valid JSON"));
}

#[test]
fn test_validate_accepts_well_formed_workflow() {
    let dir = TempDir::new().unwrap();
    let workflow = write_workflow(&dir, "greeting.yaml", GREETING_WORKFLOW);

    swrunner()
        .arg("validate")
        .arg(&workflow)
        .assert()
        .success()
        .stdout(predicate::str::contains("workflow 'greeting' (1.2.0) is valid"));
}

#[test]
fn test_validate_reports_undefined_error_reference() {
    let dir = TempDir::new().unwrap();
    let workflow = write_workflow(
        &dir,
        "broken.yaml",
        r#"
document:
  dsl: "1.0.0"
  namespace: demo
  name: broken
  version: "0.1.0"
do:
  - fail:
      raise:
        error: neverDeclared
"#,
    );

    swrunner()
        .arg("validate")
        .arg(&workflow)
        .assert()
        .failure()
        .stderr(predicate::str::contains("neverDeclared"));
}

#[test]
fn test_missing_explicit_config_is_an_error() {
    let dir = TempDir::new().unwrap();
    let workflow = write_workflow(&dir, "greeting.yaml", GREETING_WORKFLOW);

    swrunner()
        .arg("validate")
        .arg(&workflow)
        .arg("--config")
        .arg(dir.path().join("absent.toml"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_config_next_to_workflow_is_used() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("swrunner.toml"),
        "[runtime]\nname = \"sidecar\"\n",
    )
    .unwrap();
    let workflow = write_workflow(
        &dir,
        "runtime.yaml",
        r#"
document:
  dsl: "1.0.0"
  namespace: demo
  name: runtime
  version: "0.1.0"
do:
  - describe:
      set:
        runtime: "${ $runtime.name }"
"#,
    );

    swrunner()
        .arg("run")
        .arg(&workflow)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"sidecar\""));
}
