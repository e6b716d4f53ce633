//! Task runners.
//!
//! Every task kind has a runner implementing [`TaskRunner`]. Runners are built once, when the
//! [`WorkflowRunner`] is constructed, and are immutable afterwards; everything that changes
//! during an execution lives in the [`WorkflowContext`] reached through [`TaskSupport`].

pub mod call_http;
pub mod do_task;
pub mod for_task;
pub mod fork_task;
pub mod pipeline;
pub mod raise;
pub mod run_shell;
pub mod set;
pub mod workflow;

pub use call_http::HttpCallRunner;
pub use do_task::DoTaskRunner;
pub use for_task::ForTaskRunner;
pub use fork_task::ForkTaskRunner;
pub use raise::RaiseTaskRunner;
pub use run_shell::{
    CommandExecutionOutput, CommandExecutionRequest, CommandRunner, RunTaskRunner,
    TokioCommandRunner,
};
pub use set::SetTaskRunner;
pub use workflow::{WorkflowRunner, WorkflowRunnerBuilder};

use crate::core::config::EngineConfig;
use crate::core::context::WorkflowContext;
use crate::core::error::WorkflowError;
use crate::core::expression::{
    evaluate_transform, normalize_expr, traverse_and_evaluate, ExpressionError,
    ExpressionEvaluator,
};
use crate::core::model::{Schema, Task, Workflow};
use crate::core::schema::{SchemaError, SchemaValidator};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[async_trait]
pub trait TaskRunner: Send + Sync {
    /// Run the task against `input` and return its raw output (before the output pipeline).
    async fn run(&self, input: Value, support: &TaskSupport) -> Result<Value, WorkflowError>;

    /// Name of the task this runner executes.
    fn task_name(&self) -> &str;
}

/// Collaborators injected into every runner.
pub struct RuntimeServices {
    pub evaluator: Arc<dyn ExpressionEvaluator>,
    pub validator: Arc<dyn SchemaValidator>,
    pub command_runner: Arc<dyn CommandRunner>,
    pub http_client: reqwest::Client,
    pub config: EngineConfig,
}

/// Execution-time handle passed to runners: the run context, the injected services and the
/// cancellation scope the task runs under.
#[derive(Clone)]
pub struct TaskSupport {
    pub context: WorkflowContext,
    pub services: Arc<RuntimeServices>,
    cancel: CancellationToken,
}

impl TaskSupport {
    pub fn new(
        context: WorkflowContext,
        services: Arc<RuntimeServices>,
        cancel: CancellationToken,
    ) -> Self {
        TaskSupport {
            context,
            services,
            cancel,
        }
    }

    /// Support for a fork branch: private task scope, shared instance state, `cancel` scope.
    pub fn for_branch(&self, cancel: CancellationToken) -> Self {
        TaskSupport {
            context: self.context.fork_scope(),
            services: Arc::clone(&self.services),
            cancel,
        }
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Evaluate an expression, wrapped in `${ }` or not.
    pub fn evaluate(&self, expression: &str, input: &Value) -> Result<Value, ExpressionError> {
        let vars = self.context.expression_vars();
        self.services
            .evaluator
            .evaluate(&normalize_expr(expression), input, &vars)
    }

    pub fn evaluate_bool(&self, expression: &str, input: &Value) -> bool {
        let vars = self.context.expression_vars();
        self.services
            .evaluator
            .evaluate_bool(expression, input, &vars)
    }

    /// Substitute `${ }` strings nested anywhere in `node`.
    pub fn traverse(&self, node: &Value, input: &Value) -> Result<Value, ExpressionError> {
        let vars = self.context.expression_vars();
        traverse_and_evaluate(self.services.evaluator.as_ref(), node, input, &vars)
    }

    /// Evaluate a `from`/`as` transform.
    pub fn transform(&self, transform: &Value, input: &Value) -> Result<Value, ExpressionError> {
        let vars = self.context.expression_vars();
        evaluate_transform(self.services.evaluator.as_ref(), transform, input, &vars)
    }

    pub fn validate(&self, data: &Value, schema: Option<&Schema>) -> Result<(), SchemaError> {
        self.services.validator.validate(data, schema)
    }
}

/// Build the runner for one task. `reference` is the task's JSON-pointer style location.
///
/// `switch` tasks are resolved by the enclosing [`DoTaskRunner`] and have no runner.
pub fn new_task_runner(
    key: &str,
    task: &Task,
    reference: &str,
    workflow: &Workflow,
) -> Result<Box<dyn TaskRunner>, WorkflowError> {
    let runner: Box<dyn TaskRunner> = match task {
        Task::Call(call) => Box::new(HttpCallRunner::new(key, call, reference)?),
        Task::Do(do_task) => Box::new(DoTaskRunner::new(
            key,
            &do_task.do_,
            &format!("{}/do", reference),
            workflow,
        )?),
        Task::For(for_task) => Box::new(ForTaskRunner::new(key, for_task, reference, workflow)?),
        Task::Fork(fork) => Box::new(ForkTaskRunner::new(key, fork, reference, workflow)?),
        Task::Raise(raise) => Box::new(RaiseTaskRunner::new(key, raise, reference, workflow)?),
        Task::Run(run) => Box::new(RunTaskRunner::new(key, run, reference)?),
        Task::Set(set) => Box::new(SetTaskRunner::new(key, set)),
        Task::Switch(_) => {
            return Err(WorkflowError::configuration(
                format!("switch task '{}' can only run inside a task list", key),
                reference,
            ))
        }
    };
    Ok(runner)
}
