//! Execution state models

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Aggregate status of a pipeline run.
///
/// Transitions are monotone: Pending -> Running -> one terminal state, after
/// which the status never changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineStatus {
    /// Run has not started.
    Pending,
    /// Scheduling loop is active.
    Running,
    /// Every task node completed with status 0.
    Succeeded,
    /// A step exited non-zero; carries the first observed status code.
    Failed(i64),
    /// A configuration or runtime error aborted the run.
    Errored,
}

impl PipelineStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineStatus::Succeeded | PipelineStatus::Failed(_) | PipelineStatus::Errored
        )
    }
}

/// Mutable state of one pipeline run, owned exclusively by the orchestrator.
///
/// `completed` only grows and is always a subset of the node set; workers
/// never touch this directly, they report results back over the batch join.
#[derive(Debug, Clone)]
pub struct ExecutionState {
    pub run_id: Uuid,
    pub status: PipelineStatus,

    /// Names of fully-completed task nodes.
    pub completed: HashSet<String>,

    /// Completed batches in scheduling order; each inner vec is one
    /// wavefront in declaration order.
    pub wavefronts: Vec<Vec<String>>,

    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,

    total_tasks: usize,
}

impl ExecutionState {
    pub fn new(total_tasks: usize) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            status: PipelineStatus::Pending,
            completed: HashSet::new(),
            wavefronts: Vec::new(),
            started_at: None,
            completed_at: None,
            total_tasks,
        }
    }

    pub fn start(&mut self) {
        if self.status == PipelineStatus::Pending {
            self.status = PipelineStatus::Running;
            self.started_at = Some(Utc::now());
        }
    }

    /// Merge a fully-successful batch into the completed set.
    pub fn record_batch(&mut self, batch: Vec<String>) {
        self.completed.extend(batch.iter().cloned());
        self.wavefronts.push(batch);
    }

    pub fn all_completed(&self) -> bool {
        self.completed.len() == self.total_tasks
    }

    pub fn succeed(&mut self) {
        self.finish(PipelineStatus::Succeeded);
    }

    pub fn fail(&mut self, status_code: i64) {
        self.finish(PipelineStatus::Failed(status_code));
    }

    pub fn error(&mut self) {
        self.finish(PipelineStatus::Errored);
    }

    fn finish(&mut self, status: PipelineStatus) {
        // Terminal states never change.
        if self.status.is_terminal() {
            return;
        }
        self.status = status;
        self.completed_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions_are_monotone() {
        let mut state = ExecutionState::new(2);
        assert_eq!(state.status, PipelineStatus::Pending);

        state.start();
        assert_eq!(state.status, PipelineStatus::Running);

        state.fail(42);
        assert_eq!(state.status, PipelineStatus::Failed(42));

        // Terminal once reached.
        state.succeed();
        assert_eq!(state.status, PipelineStatus::Failed(42));
        state.error();
        assert_eq!(state.status, PipelineStatus::Failed(42));
    }

    #[test]
    fn test_completed_grows_and_tracks_wavefronts() {
        let mut state = ExecutionState::new(3);
        state.start();

        state.record_batch(vec!["a".to_string()]);
        state.record_batch(vec!["b".to_string(), "c".to_string()]);

        assert!(state.all_completed());
        assert_eq!(state.wavefronts.len(), 2);
        assert!(state.completed.contains("a"));
        assert!(state.completed.contains("c"));
    }
}
