use async_trait::async_trait;
use serde_json::json;
use std::sync::{Arc, Mutex};
use swrunner::core::runner::{CommandExecutionOutput, CommandExecutionRequest, CommandRunner};
use swrunner::core::types::ErrorCategory;
use swrunner::core::{Workflow, WorkflowError, WorkflowRunner};
use tokio_util::sync::CancellationToken;

fn runner(source: &str) -> WorkflowRunner {
    WorkflowRunner::new(Workflow::from_yaml_str(source).expect("workflow parses"))
        .expect("runner builds")
}

fn shell_workflow(task: &str) -> String {
    format!(
        r#"
document:
  dsl: "1.0.0"
  namespace: test
  name: shell
  version: "0.1.0"
do:
  - cmd:
{}
"#,
        task
    )
}

#[tokio::test]
async fn test_stdout_is_default_output() {
    let source = shell_workflow(
        r#"      run:
        shell:
          command: "echo hello""#,
    );
    let output = runner(&source).run(json!({})).await.unwrap();
    assert_eq!(output, json!("hello"));
}

#[tokio::test]
async fn test_non_zero_exit_is_data_not_error() {
    let source = shell_workflow(
        r#"      run:
        shell:
          command: "exit 3"
        return: code"#,
    );
    let output = runner(&source).run(json!({})).await.unwrap();
    assert_eq!(output, json!(3));
}

#[tokio::test]
async fn test_return_all_collects_streams_and_code() {
    let source = shell_workflow(
        r#"      run:
        shell:
          command: "echo out; echo err 1>&2; exit 2"
        return: all"#,
    );
    let output = runner(&source).run(json!({})).await.unwrap();
    assert_eq!(output, json!({"stdout": "out", "stderr": "err", "code": 2}));
}

#[tokio::test]
async fn test_return_stderr_and_none() {
    let stderr = shell_workflow(
        r#"      run:
        shell:
          command: "echo oops 1>&2"
        return: stderr"#,
    );
    assert_eq!(
        runner(&stderr).run(json!({})).await.unwrap(),
        json!("oops")
    );

    let none = shell_workflow(
        r#"      run:
        shell:
          command: "echo ignored"
        return: none"#,
    );
    assert_eq!(runner(&none).run(json!({})).await.unwrap(), json!(null));
}

#[tokio::test]
async fn test_environment_and_arguments_are_evaluated() {
    let source = shell_workflow(
        r#"      run:
        shell:
          command: "echo $GREETING"
          arguments:
            - "${ .name }"
          environment:
            GREETING: "${ \"hello\" }""#,
    );
    let output = runner(&source)
        .run(json!({"name": "world"}))
        .await
        .unwrap();
    assert_eq!(output, json!("hello world"));
}

#[tokio::test]
async fn test_command_expression_uses_task_input() {
    let source = shell_workflow(
        r#"      run:
        shell:
          command: "${ \"echo \" + .word }""#,
    );
    let output = runner(&source)
        .run(json!({"word": "expanded"}))
        .await
        .unwrap();
    assert_eq!(output, json!("expanded"));
}

#[tokio::test]
async fn test_fire_and_forget_returns_input() {
    let source = shell_workflow(
        r#"      run:
        shell:
          command: "sleep 2"
        await: false"#,
    );
    let started = std::time::Instant::now();
    let output = runner(&source).run(json!({"keep": true})).await.unwrap();
    assert_eq!(output, json!({"keep": true}));
    assert!(started.elapsed() < std::time::Duration::from_secs(2));
}

#[test]
fn test_unsupported_process_type_fails_at_construction() {
    let source = shell_workflow(
        r#"      run:
        script:
          language: js
          code: "console.log(1)""#,
    );
    let err = WorkflowRunner::new(Workflow::from_yaml_str(&source).unwrap())
        .err()
        .expect("construction fails");
    assert!(err.is_category(ErrorCategory::Configuration));
    assert!(err.to_string().contains("script"));
    assert_eq!(err.instance.as_deref(), Some("/do/0/cmd"));
}

#[derive(Default)]
struct RecordingRunner {
    requests: Mutex<Vec<CommandExecutionRequest>>,
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(
        &self,
        request: &CommandExecutionRequest,
        _cancel: &CancellationToken,
    ) -> Result<CommandExecutionOutput, WorkflowError> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(CommandExecutionOutput {
            stdout: b"recorded\n".to_vec(),
            stderr: Vec::new(),
            exit_code: 0,
        })
    }

    fn spawn_detached(&self, request: &CommandExecutionRequest) -> Result<(), WorkflowError> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(())
    }
}

#[tokio::test]
async fn test_injected_command_runner_receives_resolved_request() {
    let source = shell_workflow(
        r#"      run:
        shell:
          command: deploy
          arguments:
            --target: "${ .env }"
            --dry-run: null
          environment:
            REGION: eu-west-1"#,
    );
    let recorder = Arc::new(RecordingRunner::default());
    let runner = WorkflowRunner::builder(Workflow::from_yaml_str(&source).unwrap())
        .with_command_runner(recorder.clone())
        .build()
        .unwrap();

    let output = runner.run(json!({"env": "staging"})).await.unwrap();
    assert_eq!(output, json!("recorded"));

    let requests = recorder.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.program, "sh");
    assert_eq!(request.shell_args, vec!["-c".to_string()]);
    assert_eq!(request.script, "deploy --target staging --dry-run");
    assert_eq!(request.env.get("REGION").map(String::as_str), Some("eu-west-1"));
}
