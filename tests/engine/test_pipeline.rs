use serde_json::json;
use swrunner::core::types::ErrorCategory;
use swrunner::core::{Workflow, WorkflowRunner};

fn runner(source: &str) -> WorkflowRunner {
    WorkflowRunner::new(Workflow::from_yaml_str(source).expect("workflow parses"))
        .expect("runner builds")
}

const VALIDATED_WORKFLOW: &str = r#"
document:
  dsl: "1.0.0"
  namespace: test
  name: validated
  version: "0.1.0"
input:
  schema:
    format: json
    document:
      type: object
      required: [user]
      properties:
        user:
          type: object
          required: [name]
  from: "${ {name: .user.name} }"
do:
  - greet:
      set:
        greeting: "${ \"hello \" + .name }"
output:
  as: .greeting
"#;

#[tokio::test]
async fn test_workflow_input_and_output_transforms() {
    let output = runner(VALIDATED_WORKFLOW)
        .run(json!({"user": {"name": "ada", "age": 36}}))
        .await
        .unwrap();
    assert_eq!(output, json!("hello ada"));
}

#[tokio::test]
async fn test_workflow_input_schema_violation() {
    let runner = runner(VALIDATED_WORKFLOW);
    let err = runner.run(json!({"account": {}})).await.unwrap_err();
    assert!(err.is_category(ErrorCategory::Validation));
    assert_eq!(err.instance.as_deref(), Some("/"));
    // Nothing ran.
    assert!(runner.context().task_status("/do/0/greet").is_none());
}

#[tokio::test]
async fn test_task_input_from_and_output_as() {
    let source = r#"
document:
  dsl: "1.0.0"
  namespace: test
  name: task-pipeline
  version: "0.1.0"
do:
  - pick:
      input:
        from: .order
      set:
        total: "${ .price * .quantity }"
      output:
        as:
          total: "${ .total }"
          currency: EUR
"#;
    let output = runner(source)
        .run(json!({"order": {"price": 5, "quantity": 3}, "noise": true}))
        .await
        .unwrap();
    assert_eq!(output, json!({"total": 15, "currency": "EUR"}));
}

#[tokio::test]
async fn test_task_output_schema_violation_names_the_task() {
    let source = r#"
document:
  dsl: "1.0.0"
  namespace: test
  name: output-schema
  version: "0.1.0"
do:
  - produce:
      set:
        count: many
      output:
        schema:
          document:
            type: object
            properties:
              count:
                type: integer
"#;
    let err = runner(source).run(json!({})).await.unwrap_err();
    assert!(err.is_category(ErrorCategory::Validation));
    assert_eq!(err.instance.as_deref(), Some("/do/0/produce"));
}

#[tokio::test]
async fn test_export_replaces_context_for_later_tasks() {
    let source = r#"
document:
  dsl: "1.0.0"
  namespace: test
  name: exporting
  version: "0.1.0"
do:
  - login:
      set:
        token: abc
      export:
        as: "${ {session: .token} }"
  - useSession:
      set:
        header: "${ \"Bearer \" + $context.session }"
"#;
    let runner = runner(source);
    let output = runner.run(json!({})).await.unwrap();
    assert_eq!(output["header"], json!("Bearer abc"));
    assert_eq!(runner.context().instance_ctx(), json!({"session": "abc"}));
}

#[tokio::test]
async fn test_export_schema_violation_is_validation_error() {
    let source = r#"
document:
  dsl: "1.0.0"
  namespace: test
  name: export-schema
  version: "0.1.0"
do:
  - login:
      set:
        token: abc
      export:
        as: .token
        schema:
          document:
            type: object
"#;
    let err = runner(source).run(json!({})).await.unwrap_err();
    assert!(err.is_category(ErrorCategory::Validation));
    assert_eq!(err.instance.as_deref(), Some("/do/0/login"));
}

#[tokio::test]
async fn test_failing_transform_is_expression_error() {
    let source = r#"
document:
  dsl: "1.0.0"
  namespace: test
  name: bad-transform
  version: "0.1.0"
do:
  - pick:
      input:
        from: ".items[10]"
      set:
        ok: true
"#;
    let err = runner(source)
        .run(json!({"items": [1]}))
        .await
        .unwrap_err();
    assert!(err.is_category(ErrorCategory::Expression));
    assert_eq!(err.instance.as_deref(), Some("/do/0/pick"));
}

#[tokio::test]
async fn test_alternative_operator_defaults_through_missing_parents() {
    let source = r#"
document:
  dsl: "1.0.0"
  namespace: test
  name: defaults
  version: "0.1.0"
do:
  - greet:
      set:
        name: "${ .user.name // \"anon\" }"
"#;
    let output = runner(source).run(json!({})).await.unwrap();
    assert_eq!(output, json!({"name": "anon"}));

    let named = runner(source)
        .run(json!({"user": {"name": "ada"}}))
        .await
        .unwrap();
    assert_eq!(named["name"], json!("ada"));
}
