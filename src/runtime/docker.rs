//! Docker implementation of the container runtime

use async_trait::async_trait;
use bollard::container::{
    AttachContainerOptions, Config, CreateContainerOptions, RemoveContainerOptions,
    StartContainerOptions, WaitContainerOptions,
};
use bollard::errors::Error as DockerError;
use bollard::image::CreateImageOptions;
use bollard::Docker;
use futures::StreamExt;
use tracing::debug;
use uuid::Uuid;

use crate::runtime::{
    ContainerRuntime, ImagePresence, OutputChunks, PullEvents, PullProgress, RuntimeError,
    UnitHandle, UnitSpec,
};

/// Runtime backed by the local Docker daemon.
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connect using the environment's defaults (DOCKER_HOST or the local
    /// socket).
    pub fn connect() -> Result<Self, RuntimeError> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| RuntimeError::new(format!("failed to connect to Docker: {}", e)))?;
        Ok(Self { docker })
    }

    /// Wrap an existing client.
    pub fn with_docker(docker: Docker) -> Self {
        Self { docker }
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn inspect_image(&self, image: &str) -> Result<ImagePresence, RuntimeError> {
        match self.docker.inspect_image(image).await {
            Ok(_) => Ok(ImagePresence::Present),
            Err(DockerError::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(ImagePresence::Absent),
            Err(e) => Err(RuntimeError::new(format!(
                "can't inspect image '{}': {}",
                image, e
            ))),
        }
    }

    async fn pull_image(&self, image: &str) -> Result<PullEvents, RuntimeError> {
        let options = CreateImageOptions {
            from_image: image.to_string(),
            ..Default::default()
        };

        let stream = self
            .docker
            .create_image(Some(options), None, None)
            .map(|item| match item {
                Ok(info) => {
                    let message = match (info.status, info.progress) {
                        (Some(status), Some(progress)) => Some(format!("{} {}", status, progress)),
                        (status, progress) => status.or(progress),
                    };
                    Ok(PullProgress {
                        message,
                        error: info.error,
                    })
                }
                Err(e) => Err(RuntimeError::new(e.to_string())),
            });

        Ok(stream.boxed())
    }

    async fn create_unit(&self, spec: &UnitSpec) -> Result<UnitHandle, RuntimeError> {
        let name = format!("tekrun-{}", Uuid::new_v4());

        let config = Config {
            image: Some(spec.image.clone()),
            cmd: Some(spec.command.clone()),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            // A tty merges stdout/stderr into one stream; open stdin keeps
            // the unit alive until the command finishes.
            tty: Some(true),
            open_stdin: Some(true),
            host_config: Some(bollard::models::HostConfig {
                auto_remove: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        };

        let options = CreateContainerOptions {
            name: name.as_str(),
            platform: None,
        };

        let response = self
            .docker
            .create_container(Some(options), config)
            .await
            .map_err(|e| RuntimeError::new(format!("can't create container: {}", e)))?;

        debug!(container = %response.id, image = %spec.image, "created container");
        Ok(UnitHandle { id: response.id })
    }

    async fn attach(&self, unit: &UnitHandle) -> Result<OutputChunks, RuntimeError> {
        let options = AttachContainerOptions::<String> {
            stream: Some(true),
            stdout: Some(true),
            stderr: Some(true),
            ..Default::default()
        };

        let results = self
            .docker
            .attach_container(&unit.id, Some(options))
            .await
            .map_err(|e| RuntimeError::new(format!("can't attach container: {}", e)))?;

        let output = results.output.map(|chunk| match chunk {
            Ok(log) => Ok(String::from_utf8_lossy(&log.into_bytes()).into_owned()),
            Err(e) => Err(RuntimeError::new(e.to_string())),
        });

        Ok(output.boxed())
    }

    async fn start(&self, unit: &UnitHandle) -> Result<(), RuntimeError> {
        self.docker
            .start_container(&unit.id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| RuntimeError::new(format!("can't start container: {}", e)))
    }

    async fn wait(&self, unit: &UnitHandle) -> Result<i64, RuntimeError> {
        let options = WaitContainerOptions {
            condition: "not-running",
        };

        match self.docker.wait_container(&unit.id, Some(options)).next().await {
            Some(Ok(response)) => Ok(response.status_code),
            // bollard reports non-zero exits as a wait error; that is a
            // normal step result, not a runtime failure.
            Some(Err(DockerError::DockerContainerWaitError { code, .. })) => Ok(code),
            Some(Err(e)) => Err(RuntimeError::new(format!("container wait failed: {}", e))),
            None => Err(RuntimeError::new("container wait returned no result")),
        }
    }

    async fn remove(&self, unit: &UnitHandle) -> Result<(), RuntimeError> {
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };

        self.docker
            .remove_container(&unit.id, Some(options))
            .await
            .map_err(|e| RuntimeError::new(format!("can't remove container: {}", e)))
    }
}
