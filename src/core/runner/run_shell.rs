use super::{TaskRunner, TaskSupport};
use crate::core::error::WorkflowError;
use crate::core::model::{ProcessReturnType, RunTask, ShellSpec};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::process::Stdio;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// Fully resolved shell invocation.
#[derive(Clone, Debug)]
pub struct CommandExecutionRequest {
    /// Shell program, e.g. `sh`.
    pub program: String,
    /// Arguments passed to the shell before the script, e.g. `-c`.
    pub shell_args: Vec<String>,
    /// Command line handed to the shell.
    pub script: String,
    pub env: HashMap<String, String>,
}

#[derive(Clone, Debug)]
pub struct CommandExecutionOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: i32,
}

#[async_trait]
pub trait CommandRunner: Send + Sync + 'static {
    /// Run to completion, or until `cancel` fires (the process is killed).
    async fn run(
        &self,
        request: &CommandExecutionRequest,
        cancel: &CancellationToken,
    ) -> Result<CommandExecutionOutput, WorkflowError>;

    /// Start the process and return without waiting for it.
    fn spawn_detached(&self, request: &CommandExecutionRequest) -> Result<(), WorkflowError>;
}

/// Runs shell commands as tokio child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioCommandRunner;

impl TokioCommandRunner {
    fn command(request: &CommandExecutionRequest) -> Command {
        let mut command = Command::new(&request.program);
        command
            .args(&request.shell_args)
            .arg(&request.script)
            .envs(&request.env)
            .stdin(Stdio::null());
        command
    }
}

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(
        &self,
        request: &CommandExecutionRequest,
        cancel: &CancellationToken,
    ) -> Result<CommandExecutionOutput, WorkflowError> {
        let mut command = Self::command(request);
        command
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command.spawn().map_err(|err| {
            WorkflowError::runtime(format!("failed to spawn '{}': {}", request.program, err), "")
        })?;

        let output = tokio::select! {
            output = child.wait_with_output() => output.map_err(|err| {
                WorkflowError::runtime(format!("failed to wait for command: {}", err), "")
            })?,
            _ = cancel.cancelled() => {
                return Err(WorkflowError::runtime("command cancelled", ""));
            }
        };

        Ok(CommandExecutionOutput {
            stdout: output.stdout,
            stderr: output.stderr,
            exit_code: output.status.code().unwrap_or(-1),
        })
    }

    fn spawn_detached(&self, request: &CommandExecutionRequest) -> Result<(), WorkflowError> {
        let mut command = Self::command(request);
        command.stdout(Stdio::null()).stderr(Stdio::null());
        let mut child = command.spawn().map_err(|err| {
            WorkflowError::runtime(format!("failed to spawn '{}': {}", request.program, err), "")
        })?;
        // Reap the process in the background so it does not linger as a zombie.
        tokio::spawn(async move {
            if let Err(err) = child.wait().await {
                tracing::debug!(error = %err, "detached command wait failed");
            }
        });
        Ok(())
    }
}

/// Runs `run: shell` tasks through the configured [`CommandRunner`].
#[derive(Debug)]
pub struct RunTaskRunner {
    name: String,
    shell: ShellSpec,
    await_: bool,
    return_: ProcessReturnType,
}

impl RunTaskRunner {
    pub fn new(name: &str, task: &RunTask, reference: &str) -> Result<Self, WorkflowError> {
        let Some(shell) = task.run.shell.clone() else {
            let kinds: Vec<&str> = task.run.other.keys().map(String::as_str).collect();
            return Err(WorkflowError::configuration(
                format!(
                    "run task '{}' uses an unsupported process type ({}); only shell is supported",
                    name,
                    if kinds.is_empty() { "none".to_string() } else { kinds.join(", ") }
                ),
                reference,
            ));
        };
        if shell.command.trim().is_empty() {
            return Err(WorkflowError::validation(
                format!("run task '{}' requires a non-empty shell command", name),
                reference,
            ));
        }
        Ok(RunTaskRunner {
            name: name.to_string(),
            shell,
            await_: task.run.await_,
            return_: task.run.return_,
        })
    }

    fn resolve(
        &self,
        input: &Value,
        support: &TaskSupport,
        reference: &str,
    ) -> Result<CommandExecutionRequest, WorkflowError> {
        let command = match support
            .traverse(&Value::String(self.shell.command.clone()), input)
            .map_err(|err| WorkflowError::expression(err, reference))?
        {
            Value::String(command) => command,
            other => other.to_string(),
        };

        let mut script = command;
        if let Some(arguments) = &self.shell.arguments {
            let arguments = support
                .traverse(arguments, input)
                .map_err(|err| WorkflowError::expression(err, reference))?;
            for argument in render_arguments(&arguments) {
                script.push(' ');
                script.push_str(&argument);
            }
        }

        let mut env = HashMap::new();
        if let Some(environment) = &self.shell.environment {
            let resolved = support
                .traverse(&Value::Object(environment.clone()), input)
                .map_err(|err| WorkflowError::expression(err, reference))?;
            if let Value::Object(vars) = resolved {
                for (key, value) in vars {
                    env.insert(key, scalar_text(&value));
                }
            }
        }

        let shell = &support.services.config.shell;
        Ok(CommandExecutionRequest {
            program: shell.program.clone(),
            shell_args: shell.args.clone(),
            script,
            env,
        })
    }
}

/// Shell arguments: list items as they are, `name: value` pairs as `name value`.
fn render_arguments(arguments: &Value) -> Vec<String> {
    match arguments {
        Value::Array(items) => items.iter().map(scalar_text).collect(),
        Value::Object(map) => map
            .iter()
            .map(|(key, value)| match value {
                Value::Null => key.clone(),
                value => format!("{} {}", key, scalar_text(value)),
            })
            .collect(),
        Value::Null => Vec::new(),
        other => vec![scalar_text(other)],
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn limit_bytes(bytes: &[u8], limit: usize) -> String {
    let end = bytes.len().min(limit);
    String::from_utf8_lossy(&bytes[..end]).trim_end().to_string()
}

#[async_trait]
impl TaskRunner for RunTaskRunner {
    async fn run(&self, input: Value, support: &TaskSupport) -> Result<Value, WorkflowError> {
        let reference = support.context.task_reference().unwrap_or_default();
        let request = self.resolve(&input, support, &reference)?;
        let runner = &support.services.command_runner;

        tracing::debug!(
            task = %reference,
            program = %request.program,
            script = %request.script,
            await_process = self.await_,
            "executing shell command"
        );

        if !self.await_ {
            runner
                .spawn_detached(&request)
                .map_err(|err| err.with_instance_ref(&reference))?;
            return Ok(input);
        }

        let output = runner
            .run(&request, support.cancellation())
            .await
            .map_err(|err| err.with_instance_ref(&reference))?;

        let limit = support.services.config.shell.output_capture_limit_bytes;
        let stdout = limit_bytes(&output.stdout, limit);
        let stderr = limit_bytes(&output.stderr, limit);
        tracing::debug!(task = %reference, exit_code = output.exit_code, "shell command finished");

        Ok(match self.return_ {
            ProcessReturnType::Stdout => Value::String(stdout),
            ProcessReturnType::Stderr => Value::String(stderr),
            ProcessReturnType::Code => json!(output.exit_code),
            ProcessReturnType::All => {
                let mut all = Map::new();
                all.insert("stdout".to_string(), Value::String(stdout));
                all.insert("stderr".to_string(), Value::String(stderr));
                all.insert("code".to_string(), json!(output.exit_code));
                Value::Object(all)
            }
            ProcessReturnType::None => Value::Null,
        })
    }

    fn task_name(&self) -> &str {
        &self.name
    }
}
