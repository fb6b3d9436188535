//! CRD document loading
//!
//! Pipelines are defined as a multi-document YAML stream of Tekton-style
//! manifests (`Task`, `Pipeline`, `PipelineResource`, `PipelineRun`). This
//! module parses the stream into a name-indexed [`CrdSet`]; deeper semantic
//! validation (task references, cycles, resource bindings) happens when the
//! orchestrator builds the run.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::core::pipeline::{Pipeline, PipelineRun};
use crate::core::resource::PipelineResource;
use crate::core::task::Task;

/// Manifest metadata; only the name matters to the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    pub name: String,
}

/// The set of loaded definitions, indexed by name per kind.
///
/// Loaded once, immutable for the run. Lookups are O(1) map reads.
#[derive(Debug, Clone, Default)]
pub struct CrdSet {
    pub pipelines: HashMap<String, Pipeline>,
    pub tasks: HashMap<String, Task>,
    pub resources: HashMap<String, PipelineResource>,
    pub runs: HashMap<String, PipelineRun>,
}

impl CrdSet {
    /// Load a CRD set from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("can't open file {}", path.display()))?;
        Self::from_yaml(&content)
    }

    /// Parse a multi-document YAML stream into a CRD set.
    pub fn from_yaml(input: &str) -> Result<Self> {
        let mut crds = CrdSet::default();

        for document in serde_yaml::Deserializer::from_str(input) {
            let value =
                Value::deserialize(document).context("failed to parse yaml document")?;

            // Blank documents between `---` separators are fine.
            if value.is_null() {
                continue;
            }

            let kind = value
                .get("kind")
                .and_then(Value::as_str)
                .context("document has no 'kind' field")?
                .to_string();

            match kind.as_str() {
                "Task" => {
                    let task: Task =
                        serde_yaml::from_value(value).context("failed to parse Task")?;
                    let name = task.name().to_string();
                    if crds.tasks.insert(name.clone(), task).is_some() {
                        bail!("duplicate Task '{}'", name);
                    }
                }
                "Pipeline" => {
                    let pipe: Pipeline =
                        serde_yaml::from_value(value).context("failed to parse Pipeline")?;
                    let name = pipe.name().to_string();
                    if crds.pipelines.insert(name.clone(), pipe).is_some() {
                        bail!("duplicate Pipeline '{}'", name);
                    }
                }
                "PipelineResource" => {
                    let resource: PipelineResource = serde_yaml::from_value(value)
                        .context("failed to parse PipelineResource")?;
                    let name = resource.name().to_string();
                    if crds.resources.insert(name.clone(), resource).is_some() {
                        bail!("duplicate PipelineResource '{}'", name);
                    }
                }
                "PipelineRun" => {
                    let run: PipelineRun =
                        serde_yaml::from_value(value).context("failed to parse PipelineRun")?;
                    let name = run.name().to_string();
                    if crds.runs.insert(name.clone(), run).is_some() {
                        bail!("duplicate PipelineRun '{}'", name);
                    }
                }
                other => bail!("unsupported CRD kind '{}'", other),
            }
        }

        Ok(crds)
    }

    pub fn task(&self, name: &str) -> Option<&Task> {
        self.tasks.get(name)
    }

    pub fn pipeline(&self, name: &str) -> Option<&Pipeline> {
        self.pipelines.get(name)
    }

    pub fn resource(&self, name: &str) -> Option<&PipelineResource> {
        self.resources.get(name)
    }

    /// Select the pipeline to execute.
    ///
    /// Order of preference: the explicitly named pipeline; the pipeline
    /// referenced by the single loaded `PipelineRun`; the single loaded
    /// `Pipeline`. Anything else is ambiguous and rejected.
    pub fn select_pipeline(&self, name: Option<&str>) -> Result<&Pipeline> {
        if let Some(name) = name {
            return self
                .pipelines
                .get(name)
                .with_context(|| format!("no Pipeline with name '{}'", name));
        }

        let mut runs = self.runs.values();
        if let (Some(run), None) = (runs.next(), runs.next()) {
            let pref = &run.spec.pipeline_ref.name;
            return self
                .pipelines
                .get(pref)
                .with_context(|| format!("no Pipeline found for pipelineRef '{}'", pref));
        }

        let mut pipelines = self.pipelines.values();
        if let (Some(pipeline), None) = (pipelines.next(), pipelines.next()) {
            return Ok(pipeline);
        }

        bail!(
            "can't choose a pipeline: {} defined, none selected (use --pipeline)",
            self.pipelines.len()
        )
    }
}
