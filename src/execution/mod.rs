//! Pipeline execution engine

pub mod orchestrator;
pub mod step;
pub mod task_runner;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::runtime::UnitHandle;

pub use orchestrator::Orchestrator;
pub use step::StepExecutor;
pub use task_runner::{TaskOutcome, TaskRunner};

/// Cooperative abort signal shared by one batch of task executions.
///
/// Set once by the orchestrator on the first observed failure; task runners
/// check it between steps and stop without starting new units.
#[derive(Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Registry of units currently running, keyed by pipeline task name.
///
/// The step executor registers a unit after creation and deregisters it once
/// the step resolves; on batch abort the orchestrator drains the registry
/// and asks the runtime to remove whatever is still live.
#[derive(Clone, Default)]
pub struct ActiveUnits(Arc<Mutex<HashMap<String, UnitHandle>>>);

impl ActiveUnits {
    pub async fn insert(&self, task: &str, unit: UnitHandle) {
        self.0.lock().await.insert(task.to_string(), unit);
    }

    pub async fn remove(&self, task: &str) -> Option<UnitHandle> {
        self.0.lock().await.remove(task)
    }

    /// Take every registered unit, leaving the registry empty.
    pub async fn drain(&self) -> Vec<(String, UnitHandle)> {
        self.0.lock().await.drain().collect()
    }
}
