use serde_json::json;
use swrunner::core::types::ErrorCategory;
use swrunner::core::{Workflow, WorkflowRunner};

fn runner(source: &str) -> WorkflowRunner {
    WorkflowRunner::new(Workflow::from_yaml_str(source).expect("workflow parses"))
        .expect("runner builds")
}

const SUM_WORKFLOW: &str = r#"
document:
  dsl: "1.0.0"
  namespace: test
  name: sum
  version: "0.1.0"
do:
  - accumulate:
      for:
        each: n
        in: "${ .numbers }"
      do:
        - add:
            set:
              sum: "${ ($context.sum // 0) + $n }"
            export:
              as: "${ {sum: .sum} }"
"#;

#[tokio::test]
async fn test_for_accumulates_into_context() {
    let runner = runner(SUM_WORKFLOW);
    let output = runner.run(json!({"numbers": [1, 2, 3]})).await.unwrap();

    assert_eq!(runner.context().instance_ctx(), json!({"sum": 6}));
    assert_eq!(output, json!({"numbers": [1, 2, 3], "sum": 6}));
}

#[tokio::test]
async fn test_each_run_starts_from_a_fresh_context() {
    let runner = runner(SUM_WORKFLOW);
    let first = runner.run(json!({"numbers": [1, 2, 3]})).await.unwrap();
    let first_id = runner.context().id();
    let second = runner.run(json!({"numbers": [1, 2, 3]})).await.unwrap();

    assert_eq!(first["sum"], json!(6));
    assert_eq!(second["sum"], json!(6));
    let ctx = runner.context();
    assert_eq!(ctx.instance_ctx(), json!({"sum": 6}));
    assert_ne!(ctx.id(), first_id);
    assert_eq!(
        ctx.status_history().len(),
        3,
        "pending, running and completed of a single run"
    );
}

#[tokio::test]
async fn test_loop_variables_do_not_leak() {
    let runner = runner(SUM_WORKFLOW);
    runner.run(json!({"numbers": [1, 2]})).await.unwrap();
    assert!(runner.context().local_expr_vars().is_empty());
}

#[tokio::test]
async fn test_scalar_collection_runs_body_once() {
    let source = r#"
document:
  dsl: "1.0.0"
  namespace: test
  name: scalar
  version: "0.1.0"
do:
  - once:
      for:
        in: .value
      do:
        - record:
            set:
              seen: "${ $item }"
              position: "${ $index }"
"#;
    let output = runner(source).run(json!({"value": 5})).await.unwrap();
    assert_eq!(output, json!({"value": 5, "seen": 5, "position": 0}));
}

#[tokio::test]
async fn test_empty_and_missing_collections_return_input() {
    let source = r#"
document:
  dsl: "1.0.0"
  namespace: test
  name: empty
  version: "0.1.0"
do:
  - loop:
      for:
        in: .items
      do:
        - touch:
            set:
              touched: true
"#;
    let runner = runner(source);
    let empty = runner.run(json!({"items": []})).await.unwrap();
    assert_eq!(empty, json!({"items": []}));

    let missing = runner.run(json!({"other": 1})).await.unwrap();
    assert_eq!(missing, json!({"other": 1}));
}

#[tokio::test]
async fn test_while_condition_stops_iteration() {
    let source = r#"
document:
  dsl: "1.0.0"
  namespace: test
  name: bounded
  version: "0.1.0"
do:
  - loop:
      for:
        each: item
        at: i
        in: .items
      while: "${ .count < 2 }"
      do:
        - bump:
            set:
              count: "${ (.count // 0) + 1 }"
              last: "${ $i }"
"#;
    let output = runner(source)
        .run(json!({"items": ["a", "b", "c", "d"]}))
        .await
        .unwrap();
    assert_eq!(output["count"], json!(2));
    assert_eq!(output["last"], json!(1));
}

#[tokio::test]
async fn test_body_error_aborts_loop_and_cleans_up() {
    let source = r#"
document:
  dsl: "1.0.0"
  namespace: test
  name: failing
  version: "0.1.0"
do:
  - loop:
      for:
        in: .items
      do:
        - check:
            if: "${ $item == 2 }"
            raise:
              error:
                type: https://serverlessworkflow.io/spec/1.0.0/errors/validation
                status: 400
                title: Bad Item
"#;
    let runner = runner(source);
    let err = runner.run(json!({"items": [1, 2, 3]})).await.unwrap_err();
    assert!(err.is_category(ErrorCategory::Validation));
    assert_eq!(err.instance.as_deref(), Some("/do/0/loop/do/0/check"));
    assert!(runner.context().local_expr_vars().is_empty());
}

#[tokio::test]
async fn test_nested_loops_shadow_and_restore_bindings() {
    let source = r#"
document:
  dsl: "1.0.0"
  namespace: test
  name: nested
  version: "0.1.0"
do:
  - outer:
      for:
        in: .rows
      do:
        - inner:
            for:
              in: "${ $item.cells }"
            do:
              - collect:
                  set:
                    pairs: "${ (.pairs // []) + [[$item, $index]] }"
        - afterInner:
            set:
              rows_seen: "${ (.rows_seen // []) + [$item.name] }"
"#;
    let runner = runner(source);
    let output = runner
        .run(json!({"rows": [
            {"name": "r0", "cells": ["a", "b"]},
            {"name": "r1", "cells": ["c"]}
        ]}))
        .await
        .unwrap();

    assert_eq!(output["pairs"], json!([["a", 0], ["b", 1], ["c", 0]]));
    assert_eq!(output["rows_seen"], json!(["r0", "r1"]));
    assert!(runner.context().local_expr_vars().is_empty());
}
