//! Wavefront scheduling loop
//!
//! The orchestrator owns the run: it provisions resources, resolves every
//! task reference, builds the dependency graph, then repeatedly asks the
//! graph for the schedulable batch and dispatches it. A batch is always
//! fully resolved, success or not, before the next one is computed.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::core::pipeline::Pipeline;
use crate::core::task::Task;
use crate::core::{CrdSet, ExecutionState, TaskGraph};
use crate::error::{EngineError, EngineResult};
use crate::execution::{ActiveUnits, CancelFlag, TaskOutcome, TaskRunner};
use crate::resources::ProvisionerRegistry;
use crate::runtime::ContainerRuntime;

/// How one dispatched batch resolved.
enum BatchVerdict {
    Success,
    Failed(i64),
}

pub struct Orchestrator<R> {
    runtime: Arc<R>,
    provisioners: ProvisionerRegistry,
    max_parallel: Option<usize>,
}

impl<R: ContainerRuntime + 'static> Orchestrator<R> {
    pub fn new(runtime: Arc<R>) -> Self {
        Self {
            runtime,
            provisioners: ProvisionerRegistry::with_defaults(),
            max_parallel: None,
        }
    }

    /// Cap the number of tasks running concurrently within a batch. By
    /// default a whole batch runs at once.
    pub fn with_max_parallel(mut self, limit: usize) -> Self {
        self.max_parallel = Some(limit);
        self
    }

    pub fn with_provisioners(mut self, provisioners: ProvisionerRegistry) -> Self {
        self.provisioners = provisioners;
        self
    }

    /// Execute `pipeline` to a terminal state.
    ///
    /// Returns the run state for a pipeline that ran to completion, whether
    /// it succeeded or a task failed with a non-zero status. Configuration
    /// and runtime errors are returned as `Err`.
    pub async fn run(&self, pipeline: &Pipeline, crds: &CrdSet) -> EngineResult<ExecutionState> {
        info!(pipeline = %pipeline.name(), "starting pipeline run");

        self.provisioners
            .provision_all(&pipeline.spec.resources, crds)
            .await?;

        // Resolve every task reference up front; a dangling reference fails
        // the run before any unit is created.
        let mut definitions: HashMap<&str, &Task> = HashMap::new();
        for node in &pipeline.spec.tasks {
            let task = crds.task(&node.task_ref.name).ok_or_else(|| {
                EngineError::Configuration(format!(
                    "pipeline task '{}' references unknown Task '{}'",
                    node.name, node.task_ref.name
                ))
            })?;
            definitions.insert(node.name.as_str(), task);
        }

        let graph = TaskGraph::build(&pipeline.spec.tasks)?;
        let mut state = ExecutionState::new(graph.len());
        state.start();

        loop {
            let batch = graph.schedulable(&state.completed);
            if batch.is_empty() {
                if state.all_completed() {
                    state.succeed();
                    info!(run_id = %state.run_id, "pipeline succeeded");
                    return Ok(state);
                }
                // With fail-fast semantics an incomplete pipeline always has
                // schedulable work; reaching here means the graph invariant
                // was violated.
                state.error();
                return Err(EngineError::Execution(format!(
                    "no schedulable tasks but only {} of {} completed",
                    state.completed.len(),
                    graph.len()
                )));
            }

            debug!(run_id = %state.run_id, ?batch, "dispatching batch");

            match self.dispatch_batch(&batch, &definitions).await {
                Ok(BatchVerdict::Success) => state.record_batch(batch),
                Ok(BatchVerdict::Failed(status_code)) => {
                    state.fail(status_code);
                    warn!(run_id = %state.run_id, status_code, "pipeline failed");
                    return Ok(state);
                }
                Err(e) => {
                    state.error();
                    error!(run_id = %state.run_id, error = %e, "pipeline errored");
                    return Err(e);
                }
            }
        }
    }

    /// Run one batch to full resolution.
    ///
    /// Tasks are spawned concurrently, bounded by `max_parallel`. On the
    /// first failure the remaining members are cancelled and their live
    /// units force-removed, but every spawned task is still joined before
    /// the verdict is returned.
    async fn dispatch_batch(
        &self,
        batch: &[String],
        definitions: &HashMap<&str, &Task>,
    ) -> EngineResult<BatchVerdict> {
        let limit = self.max_parallel.unwrap_or(batch.len()).max(1);
        let semaphore = Arc::new(Semaphore::new(limit));
        let cancel = CancelFlag::default();
        let active = ActiveUnits::default();

        let mut join_set = JoinSet::new();
        for name in batch {
            let task = match definitions.get(name.as_str()) {
                Some(&task) => task.clone(),
                None => {
                    // References were resolved before scheduling started.
                    return Err(EngineError::Execution(format!(
                        "no definition for scheduled task '{}'",
                        name
                    )));
                }
            };

            let runner = TaskRunner::new(self.runtime.clone(), active.clone(), cancel.clone());
            let name = name.clone();
            let semaphore = semaphore.clone();
            let cancel = cancel.clone();

            join_set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                if cancel.is_cancelled() {
                    return (name, Ok(TaskOutcome::Aborted));
                }
                let result = runner.run(&name, &task).await;
                (name, result)
            });
        }

        let mut first_failure: Option<EngineResult<BatchVerdict>> = None;
        while let Some(joined) = join_set.join_next().await {
            let failure = match joined {
                Ok((name, Ok(TaskOutcome::Completed(0)))) => {
                    info!(task = %name, "task completed");
                    continue;
                }
                Ok((name, Ok(TaskOutcome::Aborted))) => {
                    debug!(task = %name, "task aborted");
                    continue;
                }
                Ok((name, Ok(TaskOutcome::Completed(status_code)))) => {
                    warn!(task = %name, status_code, "task failed");
                    Ok(BatchVerdict::Failed(status_code))
                }
                Ok((name, Err(e))) => {
                    error!(task = %name, error = %e, "task errored");
                    Err(e)
                }
                Err(join_err) => Err(EngineError::Execution(format!(
                    "task execution panicked: {}",
                    join_err
                ))),
            };

            // Only the first failure decides the verdict; later ones were
            // induced by the abort and are logged above.
            if first_failure.is_none() {
                first_failure = Some(failure);
                self.abort_in_flight(&cancel, &active).await;
            }
        }

        first_failure.unwrap_or(Ok(BatchVerdict::Success))
    }

    /// Cancel the batch and force-remove every unit still registered.
    async fn abort_in_flight(&self, cancel: &CancelFlag, active: &ActiveUnits) {
        cancel.cancel();
        for (task, unit) in active.drain().await {
            debug!(task = %task, unit = %unit.id, "removing in-flight unit");
            if let Err(e) = self.runtime.remove(&unit).await {
                warn!(task = %task, unit = %unit.id, error = %e, "can't remove unit");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use futures::{stream, StreamExt};

    use super::*;
    use crate::core::PipelineStatus;
    use crate::runtime::{
        ImagePresence, OutputChunks, PullEvents, RuntimeError, UnitHandle, UnitSpec,
    };

    /// Always-succeeding runtime; integration scenarios use the scripted
    /// mock under tests/.
    struct NullRuntime;

    #[async_trait]
    impl ContainerRuntime for NullRuntime {
        async fn inspect_image(&self, _image: &str) -> Result<ImagePresence, RuntimeError> {
            Ok(ImagePresence::Present)
        }

        async fn pull_image(&self, _image: &str) -> Result<PullEvents, RuntimeError> {
            Ok(stream::empty().boxed())
        }

        async fn create_unit(&self, _spec: &UnitSpec) -> Result<UnitHandle, RuntimeError> {
            Ok(UnitHandle {
                id: "unit".to_string(),
            })
        }

        async fn attach(&self, _unit: &UnitHandle) -> Result<OutputChunks, RuntimeError> {
            Ok(stream::empty().boxed())
        }

        async fn start(&self, _unit: &UnitHandle) -> Result<(), RuntimeError> {
            Ok(())
        }

        async fn wait(&self, _unit: &UnitHandle) -> Result<i64, RuntimeError> {
            Ok(0)
        }

        async fn remove(&self, _unit: &UnitHandle) -> Result<(), RuntimeError> {
            Ok(())
        }
    }

    const MANIFESTS: &str = r#"
kind: Task
metadata:
  name: echo
spec:
  steps:
    - name: say
      image: alpine
      command: ["echo", "hi"]
---
kind: Pipeline
metadata:
  name: demo
spec:
  tasks:
    - name: first
      taskRef: { name: echo }
    - name: second
      taskRef: { name: echo }
      runAfter: ["first"]
"#;

    #[tokio::test]
    async fn test_run_records_wavefronts_in_order() {
        let crds = CrdSet::from_yaml(MANIFESTS).unwrap();
        let pipeline = crds.pipeline("demo").unwrap();
        let orchestrator = Orchestrator::new(Arc::new(NullRuntime));

        let state = orchestrator.run(pipeline, &crds).await.unwrap();
        assert_eq!(state.status, PipelineStatus::Succeeded);
        assert_eq!(
            state.wavefronts,
            vec![vec!["first".to_string()], vec!["second".to_string()]]
        );
    }

    #[tokio::test]
    async fn test_unknown_task_ref_fails_before_execution() {
        let yaml = r#"
kind: Pipeline
metadata:
  name: broken
spec:
  tasks:
    - name: only
      taskRef: { name: ghost }
"#;
        let crds = CrdSet::from_yaml(yaml).unwrap();
        let pipeline = crds.pipeline("broken").unwrap();
        let orchestrator = Orchestrator::new(Arc::new(NullRuntime));

        let err = orchestrator.run(pipeline, &crds).await.unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("ghost"));
    }

    #[tokio::test]
    async fn test_empty_pipeline_succeeds_immediately() {
        let yaml = r#"
kind: Pipeline
metadata:
  name: empty
spec:
  tasks: []
"#;
        let crds = CrdSet::from_yaml(yaml).unwrap();
        let pipeline = crds.pipeline("empty").unwrap();
        let orchestrator = Orchestrator::new(Arc::new(NullRuntime));

        let state = orchestrator.run(pipeline, &crds).await.unwrap();
        assert_eq!(state.status, PipelineStatus::Succeeded);
        assert!(state.wavefronts.is_empty());
    }
}
