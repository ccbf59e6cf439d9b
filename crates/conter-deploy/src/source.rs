//! Source executor — resolves a service source to a container image.

use conter_core::{Service, SOURCE_DOCKER, SOURCE_GIT};

use crate::builder::{Builder, BuildError};

/// Return the container image to use when creating the service.
///
/// A `docker` source already names an image. A `git` source is cloned and
/// built into one.
pub async fn image_from_source(service: &Service) -> Result<String, BuildError> {
    match service.source.kind.as_str() {
        SOURCE_DOCKER => Ok(service.source.uri.clone()),
        SOURCE_GIT => Builder::new().build(service).await,
        other => Err(BuildError::UnsupportedSource(other.to_string())),
    }
}
