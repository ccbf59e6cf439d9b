//! conter-deploy — the project reconciler.
//!
//! Turns declarative project requests into runtime state: containers on the
//! local Docker daemon, ingress routes in the store, and certificate
//! requests for exposed domains. Re-applying the same request is idempotent;
//! partial failures are recovered by applying again.

pub mod builder;
pub mod reconciler;
pub mod source;
pub mod validate;

use thiserror::Error;

pub use reconciler::{
    ApplyProjectRequest, ApplyServiceRequest, ProjectStatus, Reconciler, RemovalOutcome,
    ServiceState,
};
pub use validate::ValidationError;

pub type DeployResult<T> = Result<T, DeployError>;

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("project {0} does not exist")]
    ProjectNotFound(String),

    #[error("failed to resolve image for service {service}: {reason}")]
    Source { service: String, reason: String },

    #[error(transparent)]
    Runtime(#[from] conter_runtime::RuntimeError),

    #[error(transparent)]
    Ingress(#[from] conter_proxy::IngressError),

    #[error(transparent)]
    Store(#[from] conter_state::StoreError),
}
