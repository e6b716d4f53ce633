//! Run-time state of one workflow execution.
//!
//! Instance-level state (input/output, `$context`, `$workflow`, status histories) is shared
//! by every clone of a [`WorkflowContext`]. Task-level state (`$task` and local expression
//! variables) lives in a scope which fork branches copy so that concurrent branches never
//! observe each other's `$task`.

use crate::core::expression::ExpressionVars;
use crate::core::types::StatusPhase;
use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

/// Timestamped status transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusPhaseLog {
    pub timestamp: DateTime<Utc>,
    pub status: StatusPhase,
}

impl StatusPhaseLog {
    fn now(status: StatusPhase) -> Self {
        StatusPhaseLog {
            timestamp: Utc::now(),
            status,
        }
    }
}

#[derive(Debug)]
struct SharedState {
    id: Uuid,
    definition: Value,
    runtime: Value,
    raw_input: Value,
    input: Value,
    output: Value,
    instance_ctx: Value,
    started_at: Option<DateTime<Utc>>,
    status: Vec<StatusPhaseLog>,
    task_status: IndexMap<String, Vec<StatusPhaseLog>>,
}

#[derive(Debug, Clone, Default)]
struct ScopeState {
    task_name: Option<String>,
    task_reference: Option<String>,
    task_definition: Value,
    task_input: Value,
    task_output: Value,
    task_started_at: Option<DateTime<Utc>>,
    local_vars: HashMap<String, Value>,
}

#[derive(Debug, Clone)]
pub struct WorkflowContext {
    shared: Arc<Mutex<SharedState>>,
    scope: Arc<Mutex<ScopeState>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn timestamp(value: Option<DateTime<Utc>>) -> Value {
    value
        .map(|t| Value::String(t.to_rfc3339_opts(SecondsFormat::Millis, true)))
        .unwrap_or(Value::Null)
}

impl WorkflowContext {
    /// Create a context for one execution of `definition`. `runtime` becomes `$runtime`.
    pub fn new(definition: Value, runtime: Value) -> Self {
        WorkflowContext {
            shared: Arc::new(Mutex::new(SharedState {
                id: Uuid::new_v4(),
                definition,
                runtime,
                raw_input: Value::Null,
                input: Value::Null,
                output: Value::Null,
                instance_ctx: Value::Object(Map::new()),
                started_at: None,
                status: vec![StatusPhaseLog::now(StatusPhase::Pending)],
                task_status: IndexMap::new(),
            })),
            scope: Arc::new(Mutex::new(ScopeState::default())),
        }
    }

    /// Clone sharing instance state but owning a private copy of the task scope.
    pub fn fork_scope(&self) -> Self {
        let scope = lock(&self.scope).clone();
        WorkflowContext {
            shared: Arc::clone(&self.shared),
            scope: Arc::new(Mutex::new(scope)),
        }
    }

    pub fn id(&self) -> Uuid {
        lock(&self.shared).id
    }

    pub fn set_raw_input(&self, input: Value) {
        lock(&self.shared).raw_input = input;
    }

    pub fn raw_input(&self) -> Value {
        lock(&self.shared).raw_input.clone()
    }

    pub fn set_input(&self, input: Value) {
        lock(&self.shared).input = input;
    }

    pub fn input(&self) -> Value {
        lock(&self.shared).input.clone()
    }

    pub fn set_output(&self, output: Value) {
        lock(&self.shared).output = output;
    }

    pub fn output(&self) -> Value {
        lock(&self.shared).output.clone()
    }

    pub fn set_started_at(&self, at: DateTime<Utc>) {
        lock(&self.shared).started_at = Some(at);
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        lock(&self.shared).started_at
    }

    pub fn set_status(&self, status: StatusPhase) {
        lock(&self.shared).status.push(StatusPhaseLog::now(status));
    }

    pub fn status(&self) -> StatusPhase {
        lock(&self.shared)
            .status
            .last()
            .map(|log| log.status)
            .unwrap_or_default()
    }

    pub fn status_history(&self) -> Vec<StatusPhaseLog> {
        lock(&self.shared).status.clone()
    }

    pub fn set_task_status(&self, reference: &str, status: StatusPhase) {
        lock(&self.shared)
            .task_status
            .entry(reference.to_string())
            .or_default()
            .push(StatusPhaseLog::now(status));
    }

    pub fn task_status(&self, reference: &str) -> Option<StatusPhase> {
        lock(&self.shared)
            .task_status
            .get(reference)
            .and_then(|logs| logs.last())
            .map(|log| log.status)
    }

    pub fn task_status_history(&self, reference: &str) -> Vec<StatusPhaseLog> {
        lock(&self.shared)
            .task_status
            .get(reference)
            .cloned()
            .unwrap_or_default()
    }

    /// Replace `$context`.
    pub fn set_instance_ctx(&self, value: Value) {
        lock(&self.shared).instance_ctx = value;
    }

    pub fn instance_ctx(&self) -> Value {
        lock(&self.shared).instance_ctx.clone()
    }

    pub fn set_task_def(&self, definition: Value) {
        lock(&self.scope).task_definition = definition;
    }

    pub fn set_task_name(&self, name: &str) {
        lock(&self.scope).task_name = Some(name.to_string());
    }

    pub fn set_task_reference(&self, reference: &str) {
        lock(&self.scope).task_reference = Some(reference.to_string());
    }

    /// Reference of the task currently running in this scope.
    pub fn task_reference(&self) -> Option<String> {
        lock(&self.scope).task_reference.clone()
    }

    pub fn set_task_raw_input(&self, input: Value) {
        lock(&self.scope).task_input = input;
    }

    pub fn set_task_raw_output(&self, output: Value) {
        lock(&self.scope).task_output = output;
    }

    pub fn set_task_started_at(&self, at: DateTime<Utc>) {
        lock(&self.scope).task_started_at = Some(at);
    }

    /// Reset `$task` once the root task list has completed.
    pub fn clear_task_context(&self) {
        let mut scope = lock(&self.scope);
        let locals = std::mem::take(&mut scope.local_vars);
        *scope = ScopeState {
            local_vars: locals,
            ..ScopeState::default()
        };
    }

    /// Bind local expression variables, leaving unrelated bindings in place.
    ///
    /// The returned guard restores whatever the names were bound to before (or removes them)
    /// when dropped, so bindings never outlive the block that introduced them.
    #[must_use = "local variables are removed when the guard is dropped"]
    pub fn add_local_expr_vars(&self, vars: HashMap<String, Value>) -> LocalVarsGuard {
        let mut scope = lock(&self.scope);
        let mut previous = Vec::with_capacity(vars.len());
        for (name, value) in vars {
            let name = name.trim_start_matches('$').to_string();
            let shadowed = scope.local_vars.insert(name.clone(), value);
            previous.push((name, shadowed));
        }
        LocalVarsGuard {
            context: self.clone(),
            previous,
        }
    }

    pub fn remove_local_expr_vars<S: AsRef<str>>(&self, names: &[S]) {
        let mut scope = lock(&self.scope);
        for name in names {
            scope
                .local_vars
                .remove(name.as_ref().trim_start_matches('$'));
        }
    }

    pub fn local_expr_vars(&self) -> HashMap<String, Value> {
        lock(&self.scope).local_vars.clone()
    }

    fn workflow_descriptor(&self) -> Value {
        let shared = lock(&self.shared);
        json!({
            "id": shared.id.to_string(),
            "definition": shared.definition,
            "input": shared.raw_input,
            "startedAt": timestamp(shared.started_at),
        })
    }

    fn task_descriptor(&self) -> Value {
        let scope = lock(&self.scope);
        json!({
            "name": scope.task_name,
            "reference": scope.task_reference,
            "definition": scope.task_definition,
            "input": scope.task_input,
            "output": scope.task_output,
            "startedAt": timestamp(scope.task_started_at),
        })
    }

    /// Variables exposed to expressions: `$context`, `$workflow`, `$task`, `$runtime` and
    /// the local bindings of this scope.
    pub fn expression_vars(&self) -> ExpressionVars {
        let mut vars = self.local_expr_vars();
        vars.insert("context".to_string(), self.instance_ctx());
        vars.insert("workflow".to_string(), self.workflow_descriptor());
        vars.insert("task".to_string(), self.task_descriptor());
        vars.insert(
            "runtime".to_string(),
            lock(&self.shared).runtime.clone(),
        );
        vars
    }
}

/// Restores shadowed local variables on drop.
#[derive(Debug)]
pub struct LocalVarsGuard {
    context: WorkflowContext,
    previous: Vec<(String, Option<Value>)>,
}

impl Drop for LocalVarsGuard {
    fn drop(&mut self) {
        let mut scope = lock(&self.context.scope);
        for (name, shadowed) in self.previous.drain(..).rev() {
            match shadowed {
                Some(value) => {
                    scope.local_vars.insert(name, value);
                }
                None => {
                    scope.local_vars.remove(&name);
                }
            }
        }
    }
}
