//! tekrun - run Tekton-style pipelines on a local container runtime

pub mod cli;
pub mod core;
pub mod error;
pub mod execution;
pub mod resources;
pub mod runtime;

// Re-export commonly used types
pub use crate::core::{CrdSet, ExecutionState, Pipeline, PipelineStatus};
pub use crate::error::{EngineError, EngineResult};
pub use crate::execution::{Orchestrator, StepExecutor, TaskOutcome, TaskRunner};
pub use crate::runtime::{ContainerRuntime, DockerRuntime};
