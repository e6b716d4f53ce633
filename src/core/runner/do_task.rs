use super::{new_task_runner, pipeline, TaskRunner, TaskSupport};
use crate::core::error::WorkflowError;
use crate::core::model::{FlowDirective, SwitchTask, Task, TaskItem, TaskList, Workflow};
use crate::core::types::StatusPhase;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::time::Duration;

struct TaskEntry {
    reference: String,
    definition: Value,
    timeout: Option<Duration>,
    /// `None` for switch tasks, which are resolved in place.
    runner: Option<Box<dyn TaskRunner>>,
}

/// Runs an ordered task list: `if` guards, `switch` jumps, `then` directives and the
/// input/output/export pipeline around each task.
pub struct DoTaskRunner {
    name: String,
    tasks: TaskList,
    entries: Vec<TaskEntry>,
}

impl std::fmt::Debug for DoTaskRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DoTaskRunner")
            .field("name", &self.name)
            .field("tasks", &self.tasks.len())
            .finish()
    }
}

impl DoTaskRunner {
    /// Runner over `tasks`, whose entries are referenced as `{list_reference}/{index}/{key}`.
    pub fn new(
        name: &str,
        tasks: &TaskList,
        list_reference: &str,
        workflow: &Workflow,
    ) -> Result<Self, WorkflowError> {
        let references = tasks
            .iter()
            .enumerate()
            .map(|(index, item)| format!("{}/{}/{}", list_reference, index, item.key))
            .collect();
        Self::with_references(name, tasks.clone(), references, workflow)
    }

    /// Runner over a single task with an explicit reference (fork branches).
    pub fn single(
        item: &TaskItem,
        reference: String,
        workflow: &Workflow,
    ) -> Result<Self, WorkflowError> {
        Self::with_references(
            &item.key,
            TaskList::new(vec![item.clone()]),
            vec![reference],
            workflow,
        )
    }

    fn with_references(
        name: &str,
        tasks: TaskList,
        references: Vec<String>,
        workflow: &Workflow,
    ) -> Result<Self, WorkflowError> {
        let mut entries = Vec::with_capacity(tasks.len());
        for (item, reference) in tasks.iter().zip(references) {
            let base = item.task.base();

            if let Some(then) = &base.then {
                check_target(&tasks, then, &reference)?;
            }
            if let Task::Switch(switch) = &item.task {
                // A case without `then` only fails once it is selected.
                for then in switch.cases().filter_map(|(_, case)| case.then.as_ref()) {
                    check_target(&tasks, then, &reference)?;
                }
            }

            let timeout = base
                .timeout
                .as_ref()
                .map(|timeout| timeout.duration())
                .transpose()
                .map_err(|err| WorkflowError::validation(err, &reference))?;

            let runner = match &item.task {
                Task::Switch(_) => None,
                task => Some(new_task_runner(&item.key, task, &reference, workflow)?),
            };

            entries.push(TaskEntry {
                definition: item.task.to_value(),
                reference,
                timeout,
                runner,
            });
        }

        Ok(DoTaskRunner {
            name: name.to_string(),
            tasks,
            entries,
        })
    }

    /// Publish the task at `index` as `$task`.
    fn enter(&self, index: usize, input: Option<&Value>, support: &TaskSupport) {
        let entry = &self.entries[index];
        let ctx = &support.context;
        if let Some(item) = self.tasks.get(index) {
            ctx.set_task_name(&item.key);
        }
        ctx.set_task_reference(&entry.reference);
        ctx.set_task_def(entry.definition.clone());
        if let Some(input) = input {
            ctx.set_task_raw_input(input.clone());
            ctx.set_task_raw_output(Value::Null);
            ctx.set_task_started_at(Utc::now());
        }
    }

    /// Index of the task following a resolved jump directive.
    fn jump(&self, index: usize, directive: &FlowDirective) -> Option<usize> {
        if directive.is_termination() {
            None
        } else if directive.is_continue() {
            (index + 1 < self.tasks.len()).then_some(index + 1)
        } else {
            self.tasks
                .key_and_index(directive.as_str())
                .map(|(target, _)| target)
        }
    }

    fn resolve_switch(
        &self,
        switch: &SwitchTask,
        input: &Value,
        support: &TaskSupport,
        reference: &str,
    ) -> Result<FlowDirective, WorkflowError> {
        let mut default = None;
        for (case_name, case) in switch.cases() {
            let Some(when) = &case.when else {
                default.get_or_insert((case_name, case));
                continue;
            };
            let matched = support.evaluate(when, input).map_err(|err| {
                WorkflowError::expression(
                    format!("switch case '{}': {}", case_name, err),
                    reference,
                )
            })?;
            if matched == Value::Bool(true) {
                tracing::debug!(task = %reference, case = %case_name, "switch case matched");
                return case.then.clone().ok_or_else(|| {
                    WorkflowError::expression(
                        format!("switch case '{}' has no 'then' directive", case_name),
                        reference,
                    )
                });
            }
        }

        match default {
            Some((case_name, case)) => {
                tracing::debug!(task = %reference, case = %case_name, "switch default case");
                case.then.clone().ok_or_else(|| {
                    WorkflowError::expression(
                        format!("switch case '{}' has no 'then' directive", case_name),
                        reference,
                    )
                })
            }
            None => Err(WorkflowError::expression("no matching switch case", reference)),
        }
    }

    async fn run_entry(
        &self,
        index: usize,
        input: Value,
        support: &TaskSupport,
    ) -> Result<Value, WorkflowError> {
        let entry = &self.entries[index];
        let ctx = &support.context;
        let Some(item) = self.tasks.get(index) else {
            return Ok(input);
        };
        let Some(runner) = entry.runner.as_ref() else {
            return Ok(input);
        };
        let base = item.task.base();

        ctx.set_task_status(&entry.reference, StatusPhase::Pending);
        self.enter(index, Some(&input), support);
        ctx.set_task_status(&entry.reference, StatusPhase::Running);
        tracing::debug!(task = %entry.reference, kind = item.task.kind(), "task started");

        let result: Result<Value, WorkflowError> = async {
            let task_input =
                pipeline::process_input(base.input.as_ref(), input, support, &entry.reference)?;

            let output = match entry.timeout {
                Some(limit) => tokio::time::timeout(limit, runner.run(task_input, support))
                    .await
                    .map_err(|_| {
                        WorkflowError::timeout(
                            format!(
                                "task '{}' timed out after {}",
                                item.key,
                                humantime::format_duration(limit)
                            ),
                            &entry.reference,
                        )
                    })??,
                None => runner.run(task_input, support).await?,
            };

            // Nested runners publish their own tasks; restore this one for the pipeline.
            self.enter(index, None, support);
            ctx.set_task_raw_output(output.clone());

            let output =
                pipeline::process_output(base.output.as_ref(), output, support, &entry.reference)?;
            pipeline::process_export(base.export.as_ref(), &output, support, &entry.reference)?;
            Ok(output)
        }
        .await;

        match &result {
            Ok(_) => {
                ctx.set_task_status(&entry.reference, StatusPhase::Completed);
                tracing::debug!(task = %entry.reference, "task completed");
            }
            Err(err) if support.is_cancelled() => {
                ctx.set_task_status(&entry.reference, StatusPhase::Cancelled);
                tracing::debug!(task = %entry.reference, error = %err, "task cancelled");
            }
            Err(err) => {
                ctx.set_task_status(&entry.reference, StatusPhase::Faulted);
                tracing::warn!(task = %entry.reference, error = %err, "task faulted");
            }
        }
        result
    }
}

fn check_target(
    tasks: &TaskList,
    directive: &FlowDirective,
    reference: &str,
) -> Result<(), WorkflowError> {
    if directive.is_task_target() && tasks.key_and_index(directive.as_str()).is_none() {
        return Err(WorkflowError::validation(
            format!(
                "flow directive '{}' does not name a task in the enclosing list",
                directive.as_str()
            ),
            reference,
        ));
    }
    Ok(())
}

#[async_trait]
impl TaskRunner for DoTaskRunner {
    async fn run(&self, input: Value, support: &TaskSupport) -> Result<Value, WorkflowError> {
        let mut output = input;
        if self.tasks.is_empty() {
            return Ok(output);
        }

        let mut index = 0;
        loop {
            let (Some(item), Some(entry)) = (self.tasks.get(index), self.entries.get(index))
            else {
                break;
            };
            if support.is_cancelled() {
                return Err(WorkflowError::runtime(
                    format!("task list '{}' was cancelled", self.name),
                    &entry.reference,
                ));
            }

            let base = item.task.base();
            if let Some(guard) = &base.if_ {
                self.enter(index, Some(&output), support);
                if !support.evaluate_bool(guard, &output) {
                    tracing::debug!(task = %entry.reference, "task skipped by if guard");
                    match self.tasks.next(index) {
                        Some((next, _)) => {
                            index = next;
                            continue;
                        }
                        None => break,
                    }
                }
            }

            if let Task::Switch(switch) = &item.task {
                self.enter(index, Some(&output), support);
                let directive = self.resolve_switch(switch, &output, support, &entry.reference)?;
                match self.jump(index, &directive) {
                    Some(next) => {
                        index = next;
                        continue;
                    }
                    None if directive.is_task_target() => {
                        return Err(WorkflowError::expression(
                            format!("switch target '{}' not found", directive.as_str()),
                            &entry.reference,
                        ));
                    }
                    None => break,
                }
            }

            output = self.run_entry(index, output, support).await?;

            match self.tasks.next(index) {
                Some((next, _)) => index = next,
                None => break,
            }
        }
        Ok(output)
    }

    fn task_name(&self) -> &str {
        &self.name
    }
}
