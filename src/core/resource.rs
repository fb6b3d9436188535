//! PipelineResource manifests

use serde::{Deserialize, Serialize};

use crate::core::config::Metadata;

/// A `PipelineResource` manifest: an externally-sourced input such as a git
/// repository or a pre-staged image. The engine treats the params as opaque;
/// they are consumed by the matching resource provisioner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResource {
    pub metadata: Metadata,
    pub spec: PipelineResourceSpec,
}

impl PipelineResource {
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Look up a param value by name.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.spec
            .params
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResourceSpec {
    /// Resource type, e.g. `git` or `image`; selects the provisioner.
    #[serde(rename = "type")]
    pub resource_type: String,

    #[serde(default)]
    pub params: Vec<Param>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub value: String,
}
