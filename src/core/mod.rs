//! Definitions, dependency graph and run state

pub mod config;
pub mod graph;
pub mod pipeline;
pub mod resource;
pub mod state;
pub mod task;

pub use config::CrdSet;
pub use graph::TaskGraph;
pub use pipeline::{Pipeline, PipelineRun, PipelineTask};
pub use resource::PipelineResource;
pub use state::{ExecutionState, PipelineStatus};
pub use task::{PullPolicy, Step, Task};
