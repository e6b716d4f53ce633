use serde_json::{json, Value};
use swrunner::core::error::WorkflowError;
use swrunner::core::types::{ErrorCategory, StatusPhase};
use swrunner::core::{Workflow, WorkflowRunner};

fn runner(source: &str) -> WorkflowRunner {
    let workflow = Workflow::from_yaml_str(source).expect("workflow parses");
    WorkflowRunner::new(workflow).expect("runner builds")
}

async fn run(source: &str, input: Value) -> Result<Value, WorkflowError> {
    runner(source).run(input).await
}

const CHAIN_WORKFLOW: &str = r#"
document:
  dsl: "1.0.0"
  namespace: test
  name: chain
  version: "0.1.0"
do:
  - setA:
      set:
        x: 1
  - setB:
      set:
        y: "${ .x + 1 }"
"#;

#[tokio::test]
async fn test_sequential_set_tasks_chain_outputs() {
    let output = run(CHAIN_WORKFLOW, json!({})).await.expect("run succeeds");
    assert_eq!(output, json!({"x": 1, "y": 2}));
}

#[tokio::test]
async fn test_task_statuses_are_recorded() {
    let runner = runner(CHAIN_WORKFLOW);
    runner.run(json!({})).await.expect("run succeeds");

    let ctx = runner.context();
    assert_eq!(ctx.status(), StatusPhase::Completed);
    let phases: Vec<StatusPhase> = ctx
        .task_status_history("/do/0/setA")
        .iter()
        .map(|log| log.status)
        .collect();
    assert_eq!(
        phases,
        vec![
            StatusPhase::Pending,
            StatusPhase::Running,
            StatusPhase::Completed
        ]
    );
    assert_eq!(ctx.task_status("/do/1/setB"), Some(StatusPhase::Completed));
    assert_eq!(ctx.output(), json!({"x": 1, "y": 2}));
}

#[tokio::test]
async fn test_set_template_is_not_mutated_between_runs() {
    let runner = runner(CHAIN_WORKFLOW);
    let before = runner.workflow().clone();

    let first = runner.run(json!({})).await.expect("first run");
    let second = runner.run(json!({"z": true})).await.expect("second run");

    assert_eq!(first, json!({"x": 1, "y": 2}));
    assert_eq!(second, json!({"z": true, "x": 1, "y": 2}));
    assert_eq!(runner.workflow(), &before);
}

#[tokio::test]
async fn test_empty_task_list_returns_input() {
    let source = r#"
document:
  dsl: "1.0.0"
  namespace: test
  name: empty
  version: "0.1.0"
do: []
"#;
    let output = run(source, json!({"keep": "me"})).await.expect("run succeeds");
    assert_eq!(output, json!({"keep": "me"}));
}

#[tokio::test]
async fn test_if_guard_skips_task() {
    let source = r#"
document:
  dsl: "1.0.0"
  namespace: test
  name: guarded
  version: "0.1.0"
do:
  - maybe:
      if: "${ .enabled }"
      set:
        ran: true
  - always:
      set:
        done: true
"#;
    let skipped = run(source, json!({"enabled": false})).await.unwrap();
    assert_eq!(skipped, json!({"enabled": false, "done": true}));

    let ran = run(source, json!({"enabled": true})).await.unwrap();
    assert_eq!(ran, json!({"enabled": true, "ran": true, "done": true}));
}

#[tokio::test]
async fn test_invalid_if_expression_counts_as_false() {
    let source = r#"
document:
  dsl: "1.0.0"
  namespace: test
  name: broken-guard
  version: "0.1.0"
do:
  - never:
      if: "${ .x + }"
      set:
        ran: true
  - after:
      set:
        done: true
"#;
    let output = run(source, json!({})).await.expect("broken guard is not an error");
    assert_eq!(output, json!({"done": true}));
}

#[tokio::test]
async fn test_then_directives_jump_and_end() {
    let source = r#"
document:
  dsl: "1.0.0"
  namespace: test
  name: jumps
  version: "0.1.0"
do:
  - first:
      set:
        a: 1
      then: third
  - second:
      set:
        b: 2
  - third:
      set:
        c: 3
      then: end
  - fourth:
      set:
        d: 4
"#;
    let output = run(source, json!({})).await.unwrap();
    assert_eq!(output, json!({"a": 1, "c": 3}));
}

#[tokio::test]
async fn test_unknown_then_target_fails_at_construction() {
    let source = r#"
document:
  dsl: "1.0.0"
  namespace: test
  name: bad-jump
  version: "0.1.0"
do:
  - first:
      set:
        a: 1
      then: nowhere
"#;
    let workflow = Workflow::from_yaml_str(source).unwrap();
    let err = WorkflowRunner::new(workflow).err().expect("construction fails");
    assert!(err.is_category(ErrorCategory::Validation));
    assert_eq!(err.instance.as_deref(), Some("/do/0/first"));
}

#[tokio::test]
async fn test_nested_do_reports_nested_reference() {
    let source = r#"
document:
  dsl: "1.0.0"
  namespace: test
  name: nested
  version: "0.1.0"
do:
  - outer:
      do:
        - ok:
            set:
              step: 1
        - broken:
            set: "${ .step }"
"#;
    let runner = runner(source);
    let err = runner.run(json!({})).await.unwrap_err();
    assert!(err.is_category(ErrorCategory::Runtime));
    assert_eq!(err.instance.as_deref(), Some("/do/0/outer/do/1/broken"));
    assert_eq!(runner.context().status(), StatusPhase::Faulted);
    assert_eq!(
        runner.context().task_status("/do/0/outer/do/1/broken"),
        Some(StatusPhase::Faulted)
    );
    assert_eq!(
        runner.context().task_status("/do/0/outer"),
        Some(StatusPhase::Faulted)
    );
}

#[tokio::test]
async fn test_task_descriptor_is_visible_to_expressions() {
    let source = r#"
document:
  dsl: "1.0.0"
  namespace: test
  name: descriptors
  version: "0.1.0"
do:
  - describe:
      set:
        name: "${ $task.name }"
        reference: "${ $task.reference }"
        workflow: "${ $workflow.definition.document.name }"
        runtime: "${ $runtime.name }"
"#;
    let output = run(source, json!({})).await.unwrap();
    assert_eq!(
        output,
        json!({
            "name": "describe",
            "reference": "/do/0/describe",
            "workflow": "descriptors",
            "runtime": "swrunner"
        })
    );
}

#[tokio::test]
async fn test_unsupported_task_kind_is_rejected_when_parsing() {
    let source = r#"
document:
  dsl: "1.0.0"
  namespace: test
  name: unsupported
  version: "0.1.0"
do:
  - pause:
      wait:
        seconds: 1
"#;
    let err = Workflow::from_yaml_str(source).unwrap_err();
    assert!(err.is_category(ErrorCategory::Validation));
    assert!(err.to_string().contains("unsupported task kind"), "{}", err);
}

#[tokio::test]
async fn test_set_producing_non_object_is_runtime_error() {
    let source = r#"
document:
  dsl: "1.0.0"
  namespace: test
  name: scalar-set
  version: "0.1.0"
do:
  - flatten:
      set: "${ .x }"
"#;
    let runner = WorkflowRunner::new(Workflow::from_yaml_str(source).unwrap()).unwrap();
    let err = runner.run(json!({"x": 1})).await.unwrap_err();
    assert!(err.is_category(ErrorCategory::Runtime));
    assert!(err.to_string().contains("must produce an object"));
    assert_eq!(err.instance.as_deref(), Some("/do/0/flatten"));
    assert_eq!(
        runner.context().task_status("/do/0/flatten"),
        Some(StatusPhase::Faulted)
    );
}
