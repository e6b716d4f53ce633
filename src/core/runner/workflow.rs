use super::{
    pipeline, CommandRunner, DoTaskRunner, RuntimeServices, TaskRunner, TaskSupport,
    TokioCommandRunner,
};
use crate::core::config::EngineConfig;
use crate::core::context::WorkflowContext;
use crate::core::error::WorkflowError;
use crate::core::expression::{ExpressionEvaluator, RhaiEvaluator};
use crate::core::model::Workflow;
use crate::core::schema::{JsonSchemaValidator, SchemaValidator};
use crate::core::types::StatusPhase;
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Reference used for errors raised outside of any task.
const ROOT_REFERENCE: &str = "/";

/// Owns one workflow definition and its runner tree. Every [`WorkflowRunner::run`] gets a
/// fresh run context; the most recent one stays reachable through [`WorkflowRunner::context`].
pub struct WorkflowRunner {
    workflow: Arc<Workflow>,
    root: DoTaskRunner,
    services: Arc<RuntimeServices>,
    definition: Value,
    runtime: Value,
    last_context: Mutex<WorkflowContext>,
    timeout: Option<Duration>,
}

/// Builder for [`WorkflowRunner`] to override the default services.
pub struct WorkflowRunnerBuilder {
    workflow: Workflow,
    config: EngineConfig,
    evaluator: Option<Arc<dyn ExpressionEvaluator>>,
    validator: Option<Arc<dyn SchemaValidator>>,
    command_runner: Option<Arc<dyn CommandRunner>>,
    http_client: Option<reqwest::Client>,
}

impl WorkflowRunnerBuilder {
    pub fn new(workflow: Workflow) -> Self {
        WorkflowRunnerBuilder {
            workflow,
            config: EngineConfig::default(),
            evaluator: None,
            validator: None,
            command_runner: None,
            http_client: None,
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_evaluator(mut self, evaluator: Arc<dyn ExpressionEvaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    pub fn with_validator(mut self, validator: Arc<dyn SchemaValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn with_command_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.command_runner = Some(runner);
        self
    }

    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Build the runner tree. Every reference, jump target and task configuration is
    /// checked here, before anything runs.
    pub fn build(self) -> Result<WorkflowRunner, WorkflowError> {
        let config = self.config;
        let http_client = match self.http_client {
            Some(client) => client,
            None => reqwest::Client::builder()
                .timeout(Duration::from_secs(config.http.timeout_seconds))
                .user_agent(config.http.user_agent.clone())
                .build()
                .map_err(|err| {
                    WorkflowError::configuration(
                        format!("failed to build http client: {}", err),
                        ROOT_REFERENCE,
                    )
                })?,
        };

        let workflow = self.workflow;
        let root = DoTaskRunner::new(&workflow.document.name, &workflow.do_, "/do", &workflow)?;
        let timeout = workflow
            .timeout
            .as_ref()
            .map(|timeout| timeout.duration())
            .transpose()
            .map_err(|err| WorkflowError::validation(err, ROOT_REFERENCE))?;

        let runtime = json!({
            "name": config.runtime.name,
            "version": crate::VERSION,
            "metadata": config.runtime.metadata,
        });
        let definition = workflow.to_value();
        let context = WorkflowContext::new(definition.clone(), runtime.clone());

        let services = RuntimeServices {
            evaluator: self
                .evaluator
                .unwrap_or_else(|| {
                    Arc::new(RhaiEvaluator::new(&config.expression)) as Arc<dyn ExpressionEvaluator>
                }),
            validator: self
                .validator
                .unwrap_or_else(|| Arc::new(JsonSchemaValidator) as Arc<dyn SchemaValidator>),
            command_runner: self
                .command_runner
                .unwrap_or_else(|| Arc::new(TokioCommandRunner) as Arc<dyn CommandRunner>),
            http_client,
            config,
        };

        Ok(WorkflowRunner {
            workflow: Arc::new(workflow),
            root,
            services: Arc::new(services),
            definition,
            runtime,
            last_context: Mutex::new(context),
            timeout,
        })
    }
}

impl WorkflowRunner {
    /// Runner with the default services and configuration.
    pub fn new(workflow: Workflow) -> Result<Self, WorkflowError> {
        WorkflowRunnerBuilder::new(workflow).build()
    }

    pub fn builder(workflow: Workflow) -> WorkflowRunnerBuilder {
        WorkflowRunnerBuilder::new(workflow)
    }

    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    /// Context of the latest execution, or an empty one before the first run.
    pub fn context(&self) -> WorkflowContext {
        self.last_context
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Execute the workflow. Returns the final output or a single typed error whose
    /// `instance` points at the failing task.
    pub async fn run(&self, input: Value) -> Result<Value, WorkflowError> {
        let ctx = WorkflowContext::new(self.definition.clone(), self.runtime.clone());
        *self
            .last_context
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = ctx.clone();
        let document = &self.workflow.document;
        tracing::info!(
            workflow = %document.name,
            namespace = %document.namespace,
            version = %document.version,
            instance = %ctx.id(),
            "workflow started"
        );

        ctx.set_raw_input(input.clone());
        ctx.set_started_at(Utc::now());
        let cancel = CancellationToken::new();
        let _cancel_on_return = cancel.clone().drop_guard();
        let support = TaskSupport::new(ctx.clone(), Arc::clone(&self.services), cancel);

        match self.execute(input, &support).await {
            Ok(output) => {
                ctx.set_output(output.clone());
                ctx.set_status(StatusPhase::Completed);
                tracing::info!(workflow = %document.name, "workflow completed");
                Ok(output)
            }
            Err(err) => {
                let reference = ctx.task_reference().unwrap_or_default();
                ctx.set_status(StatusPhase::Faulted);
                let err = err.with_instance_ref(&reference);
                tracing::warn!(workflow = %document.name, error = %err, "workflow faulted");
                Err(err)
            }
        }
    }

    async fn execute(&self, input: Value, support: &TaskSupport) -> Result<Value, WorkflowError> {
        let ctx = &support.context;
        let input =
            pipeline::process_input(self.workflow.input.as_ref(), input, support, ROOT_REFERENCE)?;
        ctx.set_input(input.clone());
        ctx.set_status(StatusPhase::Running);

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.root.run(input, support))
                .await
                .map_err(|_| {
                    WorkflowError::timeout(
                        format!(
                            "workflow timed out after {}",
                            humantime::format_duration(limit)
                        ),
                        ROOT_REFERENCE,
                    )
                })??,
            None => self.root.run(input, support).await?,
        };

        ctx.clear_task_context();
        pipeline::process_output(self.workflow.output.as_ref(), output, support, ROOT_REFERENCE)
    }
}
