use super::{DoTaskRunner, TaskRunner, TaskSupport};
use crate::core::error::WorkflowError;
use crate::core::model::{ForkTask, Workflow};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::task::{JoinError, JoinSet};

/// Runs every branch concurrently under a child cancellation scope.
///
/// Without `compete` the output is the list of branch outputs in declaration order and the
/// first branch error cancels the remaining branches. With `compete` the first branch to
/// succeed wins and the others are cancelled.
#[derive(Debug)]
pub struct ForkTaskRunner {
    name: String,
    compete: bool,
    branches: Vec<Arc<DoTaskRunner>>,
}

impl ForkTaskRunner {
    pub fn new(
        name: &str,
        task: &ForkTask,
        reference: &str,
        workflow: &Workflow,
    ) -> Result<Self, WorkflowError> {
        let branches = task
            .fork
            .branches
            .iter()
            .enumerate()
            .map(|(index, item)| {
                let branch_ref = format!("{}/fork/branches/{}/{}", reference, index, item.key);
                DoTaskRunner::single(item, branch_ref, workflow).map(Arc::new)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ForkTaskRunner {
            name: name.to_string(),
            compete: task.fork.compete,
            branches,
        })
    }

    fn join_failure(&self, err: JoinError, reference: &str) -> WorkflowError {
        WorkflowError::runtime(
            format!("fork '{}' branch terminated abnormally: {}", self.name, err),
            reference,
        )
    }
}

#[async_trait]
impl TaskRunner for ForkTaskRunner {
    async fn run(&self, input: Value, support: &TaskSupport) -> Result<Value, WorkflowError> {
        if self.branches.is_empty() {
            return Ok(if self.compete {
                Value::Null
            } else {
                Value::Array(Vec::new())
            });
        }

        let reference = support.context.task_reference().unwrap_or_default();
        let scope = support.cancellation().child_token();
        let _cancel_on_return = scope.clone().drop_guard();

        let mut branches = JoinSet::new();
        for (index, branch) in self.branches.iter().enumerate() {
            let branch = Arc::clone(branch);
            let branch_support = support.for_branch(scope.clone());
            let branch_input = input.clone();
            branches.spawn(async move {
                let result = branch.run(branch_input, &branch_support).await;
                (index, result)
            });
        }
        tracing::debug!(
            task = %reference,
            branches = self.branches.len(),
            compete = self.compete,
            "fork started"
        );

        if self.compete {
            while let Some(joined) = branches.join_next().await {
                let (index, result) = joined.map_err(|err| self.join_failure(err, &reference))?;
                scope.cancel();
                match result {
                    Ok(output) => {
                        tracing::debug!(task = %reference, branch = index, "fork branch won");
                        branches.abort_all();
                        return Ok(output);
                    }
                    Err(err) => return Err(err),
                }
            }
            return Err(WorkflowError::runtime(
                format!("fork '{}' finished without a winning branch", self.name),
                &reference,
            ));
        }

        let mut outputs: Vec<Value> = vec![Value::Null; self.branches.len()];
        let mut first_error: Option<WorkflowError> = None;
        while let Some(joined) = branches.join_next().await {
            let failure = match joined {
                Ok((index, Ok(output))) => {
                    outputs[index] = output;
                    continue;
                }
                Ok((_, Err(err))) => err,
                Err(err) => self.join_failure(err, &reference),
            };
            if first_error.is_none() {
                tracing::debug!(
                    task = %reference,
                    error = %failure,
                    "fork branch failed, cancelling siblings"
                );
                scope.cancel();
                first_error = Some(failure);
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(Value::Array(outputs)),
        }
    }

    fn task_name(&self) -> &str {
        &self.name
    }
}
