//! Scripted container runtime for deterministic, fast scenario tests

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::{stream, StreamExt};
use tekrun::runtime::{
    ContainerRuntime, ImagePresence, OutputChunks, PullEvents, PullProgress, RuntimeError,
    UnitHandle, UnitSpec,
};

/// One recorded runtime call, identified by the step's image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Inspect(String),
    Pull(String),
    Create(String),
    Start(String),
    Wait(String),
    Remove(String),
    /// The attached output stream reached end-of-stream.
    Drained(String),
}

/// Scripted runtime keyed by image name.
///
/// Every behavior defaults to "succeed immediately": images are present,
/// units exit 0 with a single line of output. Tests override per image.
pub struct MockRuntime {
    absent: HashSet<String>,
    exit_codes: HashMap<String, i64>,
    pull_errors: HashMap<String, String>,
    create_failures: HashSet<String>,
    outputs: HashMap<String, Vec<String>>,
    output_errors: HashMap<String, String>,
    wait_failures: HashMap<String, String>,
    wait_delays: HashMap<String, Duration>,

    calls: Arc<Mutex<Vec<Call>>>,
    units: Mutex<HashMap<String, String>>,
    next_unit: AtomicUsize,
}

impl MockRuntime {
    pub fn new() -> Self {
        Self {
            absent: HashSet::new(),
            exit_codes: HashMap::new(),
            pull_errors: HashMap::new(),
            create_failures: HashSet::new(),
            outputs: HashMap::new(),
            output_errors: HashMap::new(),
            wait_failures: HashMap::new(),
            wait_delays: HashMap::new(),
            calls: Arc::new(Mutex::new(Vec::new())),
            units: Mutex::new(HashMap::new()),
            next_unit: AtomicUsize::new(0),
        }
    }

    /// Mark an image as not present locally.
    pub fn absent(mut self, image: &str) -> Self {
        self.absent.insert(image.to_string());
        self
    }

    /// Script the exit code for units of this image.
    pub fn exit_code(mut self, image: &str, code: i64) -> Self {
        self.exit_codes.insert(image.to_string(), code);
        self
    }

    /// Script a pull failure: the progress stream ends with an error event.
    pub fn pull_error(mut self, image: &str, message: &str) -> Self {
        self.pull_errors
            .insert(image.to_string(), message.to_string());
        self
    }

    /// Script a unit creation failure for this image.
    pub fn fail_create(mut self, image: &str) -> Self {
        self.create_failures.insert(image.to_string());
        self
    }

    /// Script the output chunks units of this image produce.
    pub fn output(mut self, image: &str, chunks: &[&str]) -> Self {
        self.outputs.insert(
            image.to_string(),
            chunks.iter().map(|c| c.to_string()).collect(),
        );
        self
    }

    /// Script the output stream to fail after the scripted chunks.
    pub fn output_error(mut self, image: &str, message: &str) -> Self {
        self.output_errors
            .insert(image.to_string(), message.to_string());
        self
    }

    /// Script `wait` to fail for units of this image.
    pub fn fail_wait(mut self, image: &str, message: &str) -> Self {
        self.wait_failures
            .insert(image.to_string(), message.to_string());
        self
    }

    /// Delay `wait` for units of this image, to exercise overlap.
    pub fn wait_delay(mut self, image: &str, delay: Duration) -> Self {
        self.wait_delays.insert(image.to_string(), delay);
        self
    }

    /// Every recorded call, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Images passed to `create_unit`, in order.
    pub fn created_images(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Create(image) => Some(image),
                _ => None,
            })
            .collect()
    }

    /// How many times this image was pulled.
    pub fn pulls_of(&self, image: &str) -> usize {
        self.calls()
            .into_iter()
            .filter(|c| *c == Call::Pull(image.to_string()))
            .count()
    }

    /// Position of the first matching call, if any.
    pub fn position(&self, call: &Call) -> Option<usize> {
        self.calls().iter().position(|c| c == call)
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn image_of(&self, unit: &UnitHandle) -> String {
        self.units
            .lock()
            .unwrap()
            .get(&unit.id)
            .cloned()
            .unwrap_or_else(|| unit.id.clone())
    }
}

impl Default for MockRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContainerRuntime for MockRuntime {
    async fn inspect_image(&self, image: &str) -> Result<ImagePresence, RuntimeError> {
        self.record(Call::Inspect(image.to_string()));
        Ok(if self.absent.contains(image) {
            ImagePresence::Absent
        } else {
            ImagePresence::Present
        })
    }

    async fn pull_image(&self, image: &str) -> Result<PullEvents, RuntimeError> {
        self.record(Call::Pull(image.to_string()));
        let events: Vec<Result<PullProgress, RuntimeError>> = vec![Ok(PullProgress {
            message: Some(format!("Pulling from {}", image)),
            error: self.pull_errors.get(image).cloned(),
        })];
        Ok(stream::iter(events).boxed())
    }

    async fn create_unit(&self, spec: &UnitSpec) -> Result<UnitHandle, RuntimeError> {
        self.record(Call::Create(spec.image.clone()));
        if self.create_failures.contains(&spec.image) {
            return Err(RuntimeError::new("daemon unavailable"));
        }

        let id = format!("unit-{}", self.next_unit.fetch_add(1, Ordering::SeqCst));
        self.units
            .lock()
            .unwrap()
            .insert(id.clone(), spec.image.clone());
        Ok(UnitHandle { id })
    }

    async fn attach(&self, unit: &UnitHandle) -> Result<OutputChunks, RuntimeError> {
        let image = self.image_of(unit);
        let mut chunks: Vec<Result<String, RuntimeError>> = self
            .outputs
            .get(&image)
            .cloned()
            .unwrap_or_else(|| vec!["hello\n".to_string()])
            .into_iter()
            .map(Ok)
            .collect();
        if let Some(message) = self.output_errors.get(&image) {
            chunks.push(Err(RuntimeError::new(message.clone())));
        }

        // Record end-of-stream in the call log so tests can order the drain
        // against later runtime calls.
        let calls = self.calls.clone();
        let drained = stream::once(async move {
            calls.lock().unwrap().push(Call::Drained(image));
            None
        })
        .filter_map(|marker: Option<Result<String, RuntimeError>>| async move { marker });

        Ok(stream::iter(chunks).chain(drained).boxed())
    }

    async fn start(&self, unit: &UnitHandle) -> Result<(), RuntimeError> {
        self.record(Call::Start(self.image_of(unit)));
        Ok(())
    }

    async fn wait(&self, unit: &UnitHandle) -> Result<i64, RuntimeError> {
        let image = self.image_of(unit);
        if let Some(delay) = self.wait_delays.get(&image) {
            tokio::time::sleep(*delay).await;
        }
        self.record(Call::Wait(image.clone()));
        if let Some(message) = self.wait_failures.get(&image) {
            return Err(RuntimeError::new(message.clone()));
        }
        Ok(self.exit_codes.get(&image).copied().unwrap_or(0))
    }

    async fn remove(&self, unit: &UnitHandle) -> Result<(), RuntimeError> {
        self.record(Call::Remove(self.image_of(unit)));
        Ok(())
    }
}
