//! Container runtime collaborator
//!
//! The engine only ever talks to the runtime through [`ContainerRuntime`],
//! which keeps the scheduler and executors testable against scripted
//! implementations. The production implementation lives in [`docker`].

pub mod docker;

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

pub use docker::DockerRuntime;

/// Opaque runtime-level failure, converted to an engine error at the seam.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct RuntimeError(pub String);

impl RuntimeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Result of a local image inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImagePresence {
    Present,
    Absent,
}

/// One event from an in-flight image pull.
///
/// An event carrying an `error` payload aborts the pull; normal termination
/// of the stream means the pull succeeded.
#[derive(Debug, Clone, Default)]
pub struct PullProgress {
    pub message: Option<String>,
    pub error: Option<String>,
}

/// What to run inside an ephemeral unit.
#[derive(Debug, Clone)]
pub struct UnitSpec {
    pub image: String,
    pub command: Vec<String>,
}

/// Handle to a created unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitHandle {
    pub id: String,
}

pub type PullEvents = BoxStream<'static, Result<PullProgress, RuntimeError>>;

/// Combined stdout/stderr chunks, in arrival order. Chunks are not
/// necessarily line-aligned.
pub type OutputChunks = BoxStream<'static, Result<String, RuntimeError>>;

/// The container runtime surface the step executor consumes.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Is the image available locally?
    async fn inspect_image(&self, image: &str) -> Result<ImagePresence, RuntimeError>;

    /// Start pulling an image, yielding progress events.
    async fn pull_image(&self, image: &str) -> Result<PullEvents, RuntimeError>;

    /// Create an ephemeral unit configured for automatic cleanup on
    /// termination and combined stdout/stderr capture.
    async fn create_unit(&self, spec: &UnitSpec) -> Result<UnitHandle, RuntimeError>;

    /// Attach to the unit's combined output stream. Must be called before
    /// `start` so no output is missed.
    async fn attach(&self, unit: &UnitHandle) -> Result<OutputChunks, RuntimeError>;

    async fn start(&self, unit: &UnitHandle) -> Result<(), RuntimeError>;

    /// Wait for the unit to leave the running state; returns its exit code.
    async fn wait(&self, unit: &UnitHandle) -> Result<i64, RuntimeError>;

    /// Best-effort stop-and-remove, used when aborting a batch.
    async fn remove(&self, unit: &UnitHandle) -> Result<(), RuntimeError>;
}
