//! Resource provisioning
//!
//! Every resource a pipeline declares is provisioned once before scheduling
//! starts, through a capability trait keyed by resource type. The engine
//! never inspects what a provisioner actually does; the built-in `git` and
//! `image` provisioners are stubs that acknowledge the resource and leave
//! the real work to an external implementation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::core::pipeline::ResourceDecl;
use crate::core::resource::PipelineResource;
use crate::core::CrdSet;
use crate::error::{EngineError, EngineResult};

/// Provisions one kind of externally-sourced resource.
#[async_trait]
pub trait ResourceProvisioner: Send + Sync {
    /// The resource `type` this provisioner handles.
    fn resource_type(&self) -> &str;

    async fn provision(&self, resource: &PipelineResource) -> anyhow::Result<()>;
}

/// Registry of provisioners, consulted per declared resource.
pub struct ProvisionerRegistry {
    by_type: HashMap<String, Arc<dyn ResourceProvisioner>>,
}

impl ProvisionerRegistry {
    pub fn new() -> Self {
        Self {
            by_type: HashMap::new(),
        }
    }

    /// Registry with the built-in `git` and `image` stubs.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(GitProvisioner));
        registry.register(Arc::new(ImageProvisioner));
        registry
    }

    pub fn register(&mut self, provisioner: Arc<dyn ResourceProvisioner>) {
        self.by_type
            .insert(provisioner.resource_type().to_string(), provisioner);
    }

    /// Resolve and provision every resource the pipeline declares.
    ///
    /// A declaration with no matching `PipelineResource`, an unknown
    /// resource type, or a provisioner failure is a configuration error.
    pub async fn provision_all(
        &self,
        declared: &[ResourceDecl],
        crds: &CrdSet,
    ) -> EngineResult<()> {
        for decl in declared {
            let resource = crds.resource(&decl.name).ok_or_else(|| {
                EngineError::Configuration(format!("no resource with name '{}'", decl.name))
            })?;

            let provisioner =
                self.by_type
                    .get(&resource.spec.resource_type)
                    .ok_or_else(|| {
                        EngineError::Configuration(format!(
                            "no provisioner for resource type '{}' (resource '{}')",
                            resource.spec.resource_type, decl.name
                        ))
                    })?;

            provisioner.provision(resource).await.map_err(|e| {
                EngineError::Configuration(format!(
                    "failed to provision resource '{}': {}",
                    decl.name, e
                ))
            })?;
        }

        Ok(())
    }
}

impl Default for ProvisionerRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Stub for `git` resources.
// TODO: shallow-clone the repository into a per-run workspace directory.
struct GitProvisioner;

#[async_trait]
impl ResourceProvisioner for GitProvisioner {
    fn resource_type(&self) -> &str {
        "git"
    }

    async fn provision(&self, resource: &PipelineResource) -> anyhow::Result<()> {
        info!(
            resource = %resource.name(),
            url = resource.param("url").unwrap_or("<unset>"),
            "init git resource (checkout left to an external provisioner)"
        );
        Ok(())
    }
}

/// Stub for `image` resources.
struct ImageProvisioner;

#[async_trait]
impl ResourceProvisioner for ImageProvisioner {
    fn resource_type(&self) -> &str {
        "image"
    }

    async fn provision(&self, resource: &PipelineResource) -> anyhow::Result<()> {
        info!(
            resource = %resource.name(),
            "init image resource (staging left to an external provisioner)"
        );
        Ok(())
    }
}
