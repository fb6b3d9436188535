//! Step execution against the container runtime
//!
//! One step maps to one ephemeral unit: resolve the image per its pull
//! policy, create the unit, attach before starting so no output is lost,
//! stream prefixed logs while waiting, then join the drain before reading
//! the exit code. A non-zero exit is a result, not an error.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::core::task::{PullPolicy, Step};
use crate::error::{EngineError, EngineResult};
use crate::execution::ActiveUnits;
use crate::runtime::{ContainerRuntime, ImagePresence, OutputChunks, RuntimeError, UnitSpec};

/// How long to wait for the output drain after the unit has exited. Past
/// this, the exit code is reported and any trailing output is dropped.
const DRAIN_GRACE: Duration = Duration::from_secs(5);

/// Runs a single step to completion and returns its exit code.
pub struct StepExecutor<R> {
    runtime: Arc<R>,
    active: ActiveUnits,
    drain_grace: Duration,
}

impl<R: ContainerRuntime + 'static> StepExecutor<R> {
    pub fn new(runtime: Arc<R>, active: ActiveUnits) -> Self {
        Self {
            runtime,
            active,
            drain_grace: DRAIN_GRACE,
        }
    }

    /// Execute one step of `task_name` and return its exit code.
    pub async fn execute(&self, task_name: &str, step: &Step) -> EngineResult<i64> {
        let command = step.resolved_command();
        if command.is_empty() {
            return Err(EngineError::Configuration(format!(
                "step '{}' has no command",
                step.name
            )));
        }

        self.ensure_image(step).await?;

        let spec = UnitSpec {
            image: step.image.clone(),
            command,
        };
        let unit = self
            .runtime
            .create_unit(&spec)
            .await
            .map_err(runtime_err)?;
        self.active.insert(task_name, unit.clone()).await;

        let result = async {
            // Attach before start so the first bytes of output are captured.
            let output = self
                .runtime
                .attach(&unit)
                .await
                .map_err(runtime_err)?;
            let drain = spawn_drain(output, format!("[{}:{}] ", task_name, step.name));

            if let Err(e) = self.runtime.start(&unit).await {
                drain.abort();
                return Err(runtime_err(e));
            }

            let status_code = match self.runtime.wait(&unit).await {
                Ok(code) => code,
                Err(e) => {
                    drain.abort();
                    return Err(runtime_err(e));
                }
            };

            // The unit has exited but buffered output may still be in
            // flight; join the drain so logs are complete before the exit
            // code is reported.
            match tokio::time::timeout(self.drain_grace, drain).await {
                Ok(Ok(Ok(()))) => {}
                Ok(Ok(Err(e))) => {
                    return Err(EngineError::Execution(format!(
                        "output stream failed for step '{}': {}",
                        step.name, e
                    )));
                }
                Ok(Err(join_err)) => {
                    return Err(EngineError::Execution(format!(
                        "output drain for step '{}' did not finish: {}",
                        step.name, join_err
                    )));
                }
                Err(_) => {
                    warn!(
                        step = %step.name,
                        "output stream did not end within the drain grace period"
                    );
                }
            }

            Ok(status_code)
        }
        .await;

        self.active.remove(task_name).await;
        result
    }

    /// Make the step's image available per its pull policy.
    async fn ensure_image(&self, step: &Step) -> EngineResult<()> {
        match step.image_pull_policy {
            PullPolicy::Always => self.pull(&step.image).await,
            PullPolicy::Never => match self.runtime.inspect_image(&step.image).await {
                Ok(ImagePresence::Present) => Ok(()),
                Ok(ImagePresence::Absent) => Err(EngineError::ImagePull {
                    image: step.image.clone(),
                    reason: "image not present locally and pull policy is Never".to_string(),
                }),
                Err(e) => Err(runtime_err(e)),
            },
            PullPolicy::IfNotPresent => match self.runtime.inspect_image(&step.image).await {
                Ok(ImagePresence::Present) => Ok(()),
                Ok(ImagePresence::Absent) => self.pull(&step.image).await,
                Err(e) => Err(runtime_err(e)),
            },
        }
    }

    /// Pull an image, consuming its progress stream to completion.
    async fn pull(&self, image: &str) -> EngineResult<()> {
        info!(image, "pulling image");

        let pull_error = |reason: String| EngineError::ImagePull {
            image: image.to_string(),
            reason,
        };

        let mut events = self
            .runtime
            .pull_image(image)
            .await
            .map_err(|e| pull_error(e.to_string()))?;

        while let Some(event) = events.next().await {
            let progress = event.map_err(|e| pull_error(e.to_string()))?;
            if let Some(error) = progress.error {
                return Err(pull_error(error));
            }
            if let Some(message) = progress.message {
                debug!(image, "{}", message);
            }
        }

        Ok(())
    }
}

fn runtime_err(e: RuntimeError) -> EngineError {
    EngineError::Execution(e.to_string())
}

/// Copy unit output to stdout line by line, each line carrying the
/// `[task:step] ` prefix. Chunks are not line-aligned, so partial lines are
/// buffered until their newline arrives; a trailing partial line is flushed
/// when the stream ends.
fn spawn_drain(mut output: OutputChunks, prefix: String) -> JoinHandle<Result<(), RuntimeError>> {
    tokio::spawn(async move {
        let mut pending = String::new();
        while let Some(chunk) = output.next().await {
            pending.push_str(&chunk?);
            while let Some(pos) = pending.find('\n') {
                let line: String = pending.drain(..=pos).collect();
                println!("{}{}", prefix, line.trim_end_matches(['\r', '\n']));
            }
        }
        if !pending.is_empty() {
            println!("{}{}", prefix, pending.trim_end_matches('\r'));
        }
        Ok(())
    })
}
