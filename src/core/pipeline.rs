//! Pipeline, pipeline-task and pipeline-run manifests

use serde::{Deserialize, Serialize};

use crate::core::config::Metadata;

/// A `Pipeline` manifest: an ordered list of task nodes plus the resources
/// they bind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    pub metadata: Metadata,
    pub spec: PipelineSpec,
}

impl Pipeline {
    pub fn name(&self) -> &str {
        &self.metadata.name
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSpec {
    /// Resources the pipeline declares; each must resolve to a loaded
    /// `PipelineResource` before scheduling starts.
    #[serde(default)]
    pub resources: Vec<ResourceDecl>,

    pub tasks: Vec<PipelineTask>,
}

/// Pipeline-level resource declaration, `{ name, type }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDecl {
    pub name: String,

    #[serde(rename = "type")]
    pub resource_type: String,
}

/// A node in the pipeline: a reference to a task plus its ordering
/// constraints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineTask {
    /// Unique within the pipeline.
    pub name: String,

    pub task_ref: NameRef,

    /// Explicit predecessors.
    #[serde(default)]
    pub run_after: Vec<String>,

    /// Resource inputs/outputs; `inputs[].from` names implicit predecessors.
    #[serde(default)]
    pub resources: Option<TaskResources>,
}

impl PipelineTask {
    /// All predecessor node names this task declares, explicit (`runAfter`)
    /// then implicit (resource `from` producers). May contain duplicates;
    /// the graph builder deduplicates.
    pub fn predecessors(&self) -> impl Iterator<Item = &str> {
        let from = self
            .resources
            .iter()
            .flat_map(|r| r.inputs.iter())
            .flat_map(|i| i.from.iter());
        self.run_after.iter().chain(from).map(String::as_str)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NameRef {
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskResources {
    #[serde(default)]
    pub inputs: Vec<ResourceInput>,

    #[serde(default)]
    pub outputs: Vec<ResourceOutput>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceInput {
    pub name: String,

    /// The pipeline-level resource this input binds.
    pub resource: String,

    /// Producer task nodes. Consuming a resource `from` a task makes that
    /// task a predecessor.
    #[serde(default)]
    pub from: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceOutput {
    pub name: String,
    pub resource: String,
}

/// A `PipelineRun` manifest selecting which pipeline to execute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub metadata: Metadata,
    pub spec: PipelineRunSpec,
}

impl PipelineRun {
    pub fn name(&self) -> &str {
        &self.metadata.name
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRunSpec {
    pub pipeline_ref: NameRef,
}
