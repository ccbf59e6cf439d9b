//! conter-runtime — container runtime adapter.
//!
//! Abstracts the container/network/volume/image primitives the reconciler
//! needs. The production implementation talks to a local Docker daemon
//! through [bollard]; the [`ContainerRuntime`] trait exists so the
//! reconciler can be exercised against an in-memory runtime in tests.

pub mod docker;
pub mod helpers;

use async_trait::async_trait;
use thiserror::Error;

use conter_core::Service;

pub use docker::DockerRuntime;

/// Result type alias for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("container API error: {0}")]
    Api(#[from] bollard::errors::Error),

    #[error("failed to pull image {image}: {reason}")]
    ImagePull { image: String, reason: String },

    #[error("no more available ports to assign")]
    PortsExhausted,

    #[error("network error: {0}")]
    Network(String),

    #[error("volume error: {0}")]
    Volume(String),
}

/// A project-scoped container network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Network {
    pub id: String,
    pub name: String,
}

/// Observed state of a managed container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInfo {
    pub id: String,
    pub name: String,
    /// Runtime status string (`running`, `exited`, `created`, ...).
    pub state: String,
    /// First published `host:port` pair, empty when nothing is exposed.
    pub endpoint: String,
    /// Configuration hash recorded on the container's labels.
    pub config_hash: String,
}

impl ContainerInfo {
    pub fn is_running(&self) -> bool {
        self.state == "running"
    }
}

/// Container runtime operations consumed by the reconciler.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Idempotently create the project network.
    async fn ensure_network(&self, project: &str) -> RuntimeResult<Network>;

    /// Delete the project network. Callers treat a failure here as
    /// non-fatal.
    async fn delete_network(&self, project: &str) -> RuntimeResult<()>;

    /// Look up a container by its canonical name. Returns `None` when the
    /// runtime does not know it.
    async fn find_container(&self, name: &str) -> Option<ContainerInfo>;

    /// Create a container for the service, pulling the image and creating
    /// volumes on demand. The container is not started.
    async fn create_container(
        &self,
        service: &Service,
        network: &Network,
    ) -> RuntimeResult<ContainerInfo>;

    async fn start_container(&self, id: &str) -> RuntimeResult<()>;

    /// Force-remove a container. Volumes are retained.
    async fn remove_container(&self, id: &str) -> RuntimeResult<()>;

    /// Delete every container carrying the project label whose name is not
    /// listed in `keep`. Returns the number removed.
    async fn remove_unused_containers(
        &self,
        project: &str,
        keep: &[String],
    ) -> RuntimeResult<usize>;

    /// Purge all containers linked to the project.
    async fn remove_all_containers_for_project(&self, project: &str) -> RuntimeResult<usize> {
        self.remove_unused_containers(project, &[]).await
    }
}
