//! Sequential step execution for one pipeline task

use std::sync::Arc;

use tracing::{info, warn};

use crate::core::task::Task;
use crate::error::EngineResult;
use crate::execution::{ActiveUnits, CancelFlag, StepExecutor};
use crate::runtime::ContainerRuntime;

/// How a task execution resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Every step ran, or a step exited non-zero and stopped the task;
    /// carries the last observed status code.
    Completed(i64),
    /// The batch was cancelled before this task ran all its steps.
    Aborted,
}

/// Runs a task's steps strictly in order, stopping at the first non-zero
/// exit and between steps when the batch has been cancelled.
pub struct TaskRunner<R> {
    executor: StepExecutor<R>,
    cancel: CancelFlag,
}

impl<R: ContainerRuntime + 'static> TaskRunner<R> {
    pub fn new(runtime: Arc<R>, active: ActiveUnits, cancel: CancelFlag) -> Self {
        Self {
            executor: StepExecutor::new(runtime, active),
            cancel,
        }
    }

    /// Run `task` under the pipeline node name `node_name`.
    pub async fn run(&self, node_name: &str, task: &Task) -> EngineResult<TaskOutcome> {
        info!(task = %node_name, "running task");

        for step in &task.spec.steps {
            if self.cancel.is_cancelled() {
                info!(task = %node_name, "batch cancelled, stopping before next step");
                return Ok(TaskOutcome::Aborted);
            }

            info!(task = %node_name, step = %step.name, "running step");
            let status_code = self.executor.execute(node_name, step).await?;

            if status_code != 0 {
                warn!(
                    task = %node_name,
                    step = %step.name,
                    status_code,
                    "step exited non-zero, remaining steps skipped"
                );
                return Ok(TaskOutcome::Completed(status_code));
            }
        }

        Ok(TaskOutcome::Completed(0))
    }
}
