//! Docker implementation of the runtime adapter.

use std::collections::HashMap;

use async_trait::async_trait;
use bollard::auth::DockerCredentials;
use bollard::container::{
    Config, CreateContainerOptions, ListContainersOptions, RemoveContainerOptions,
    StartContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::models::{HostConfig, Mount, MountTypeEnum, PortBinding, RestartPolicy,
    RestartPolicyNameEnum};
use bollard::network::{CreateNetworkOptions, InspectNetworkOptions};
use bollard::volume::{CreateVolumeOptions, ListVolumesOptions};
use bollard::Docker;
use futures_util::StreamExt;
use tracing::{debug, trace, warn};

use conter_core::Service;

use crate::helpers::{
    default_labels, get_available_port, project_filter, service_labels, to_bytes,
    transform_environment, volume_name, LABEL_HASH, PORT_END_RANGE, PORT_START_RANGE,
};
use crate::{ContainerInfo, ContainerRuntime, Network, RuntimeError, RuntimeResult};

/// Source option keys carrying registry credentials for private images.
pub const SOURCE_USERNAME_OPTION: &str = "docker_username";
pub const SOURCE_PASSWORD_OPTION: &str = "docker_password";

/// Docker-backed runtime adapter.
#[derive(Clone)]
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connect to the local Docker daemon using the standard environment
    /// (DOCKER_HOST or the default socket).
    pub fn connect() -> RuntimeResult<Self> {
        let docker = Docker::connect_with_local_defaults()?;
        debug!("connected to docker daemon");
        Ok(Self { docker })
    }

    /// Pull the image when the daemon does not already have it. Credentials
    /// are taken from the service source options when present.
    async fn pull_image_if_missing(
        &self,
        image: &str,
        opts: &std::collections::BTreeMap<String, String>,
    ) -> RuntimeResult<()> {
        if self.docker.inspect_image(image).await.is_ok() {
            trace!(%image, "image already present, not pulling");
            return Ok(());
        }

        let credentials = registry_credentials(opts);
        if credentials.is_some() {
            trace!(%image, "authenticating with registry");
        }

        let options = CreateImageOptions::<String> {
            from_image: image.to_string(),
            ..Default::default()
        };

        let mut stream = self.docker.create_image(Some(options), None, credentials);
        while let Some(progress) = stream.next().await {
            progress.map_err(|e| RuntimeError::ImagePull {
                image: image.to_string(),
                reason: e.to_string(),
            })?;
        }

        debug!(%image, "image pulled");
        Ok(())
    }

    /// Create the service's named volume when it does not exist yet.
    async fn ensure_volume(&self, service: &Service, logical: &str) -> RuntimeResult<String> {
        let name = volume_name(&service.ingress.target_project, &service.name, logical);

        let filters = HashMap::from([("name".to_string(), vec![name.clone()])]);
        let existing = self
            .docker
            .list_volumes(Some(ListVolumesOptions { filters }))
            .await
            .map_err(|e| RuntimeError::Volume(e.to_string()))?;

        if let Some(volumes) = existing.volumes {
            if let Some(volume) = volumes.into_iter().next() {
                trace!(volume = %volume.name, "volume already exists, not creating");
                return Ok(volume.name);
            }
        }

        let created = self
            .docker
            .create_volume(CreateVolumeOptions {
                name: name.clone(),
                labels: service_labels(service),
                ..Default::default()
            })
            .await
            .map_err(|e| RuntimeError::Volume(e.to_string()))?;

        debug!(volume = %created.name, service = %service.name, "volume created");
        Ok(created.name)
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn ensure_network(&self, project: &str) -> RuntimeResult<Network> {
        if let Ok(inspect) = self
            .docker
            .inspect_network(project, None::<InspectNetworkOptions<String>>)
            .await
        {
            debug!(%project, "network already exists");
            return Ok(Network {
                id: inspect.id.unwrap_or_default(),
                name: project.to_string(),
            });
        }

        trace!(%project, "creating network");
        let created = self
            .docker
            .create_network(CreateNetworkOptions {
                name: project.to_string(),
                labels: default_labels(),
                ..Default::default()
            })
            .await
            .map_err(|e| RuntimeError::Network(e.to_string()))?;

        Ok(Network {
            id: created.id.unwrap_or_default(),
            name: project.to_string(),
        })
    }

    async fn delete_network(&self, project: &str) -> RuntimeResult<()> {
        trace!(%project, "removing network");
        self.docker
            .remove_network(project)
            .await
            .map_err(|e| RuntimeError::Network(e.to_string()))
    }

    async fn find_container(&self, name: &str) -> Option<ContainerInfo> {
        let inspect = self.docker.inspect_container(name, None).await.ok()?;

        // Find the first exposed port, if any. Docker reports bindings in a
        // map, so "first" means the first entry with a non-empty binding
        // list.
        let mut endpoint = String::new();
        if let Some(bindings) = inspect
            .host_config
            .as_ref()
            .and_then(|hc| hc.port_bindings.as_ref())
        {
            for binding_list in bindings.values() {
                if let Some(binding) = binding_list.as_ref().and_then(|l| l.first()) {
                    endpoint = format!(
                        "{}:{}",
                        binding.host_ip.clone().unwrap_or_default(),
                        binding.host_port.clone().unwrap_or_default()
                    );
                    break;
                }
            }
        }

        let config_hash = inspect
            .config
            .as_ref()
            .and_then(|c| c.labels.as_ref())
            .and_then(|l| l.get(LABEL_HASH))
            .cloned()
            .unwrap_or_default();

        Some(ContainerInfo {
            id: inspect.id.unwrap_or_default(),
            name: inspect.name.unwrap_or_default(),
            state: inspect
                .state
                .and_then(|s| s.status)
                .map(|s| s.to_string())
                .unwrap_or_default(),
            endpoint,
            config_hash,
        })
    }

    async fn create_container(
        &self,
        service: &Service,
        network: &Network,
    ) -> RuntimeResult<ContainerInfo> {
        self.pull_image_if_missing(&service.container_image, &service.source.opts)
            .await?;

        let mut config = Config::<String> {
            image: Some(service.container_image.clone()),
            labels: Some(service_labels(service)),
            env: Some(transform_environment(&service.environment)),
            hostname: Some(service.name.clone()),
            ..Default::default()
        };

        let mut host_config = HostConfig {
            network_mode: Some(network.id.clone()),
            restart_policy: Some(RestartPolicy {
                name: Some(RestartPolicyNameEnum::ALWAYS),
                maximum_retry_count: None,
            }),
            // Default ceiling of 128 MB unless a quota raises it.
            memory: Some(to_bytes(128)),
            ..Default::default()
        };

        if !service.volumes.is_empty() {
            let mut mounts = Vec::with_capacity(service.volumes.len());
            for volume in &service.volumes {
                let source = self.ensure_volume(service, &volume.name).await?;
                mounts.push(Mount {
                    target: Some(volume.path.clone()),
                    source: Some(source),
                    typ: Some(MountTypeEnum::VOLUME),
                    ..Default::default()
                });
            }
            host_config.mounts = Some(mounts);
        }

        if service.quota.memory_mb > 0 {
            host_config.memory = Some(to_bytes(service.quota.memory_mb));
        }

        let mut endpoint = String::new();
        if service.ingress.container_port > 0 {
            let internal = format!("{}/tcp", service.ingress.container_port);
            let exposed = get_available_port(PORT_START_RANGE, PORT_END_RANGE);
            if exposed == 0 {
                return Err(RuntimeError::PortsExhausted);
            }

            endpoint = format!("127.0.0.1:{exposed}");
            host_config.port_bindings = Some(HashMap::from([(
                internal.clone(),
                Some(vec![PortBinding {
                    host_ip: Some("127.0.0.1".to_string()),
                    host_port: Some(exposed.to_string()),
                }]),
            )]));
            config.exposed_ports = Some(HashMap::from([(internal, HashMap::new())]));
        }

        config.host_config = Some(host_config);

        trace!(
            name = %service.container_name,
            image = %service.container_image,
            "creating container"
        );
        let response = self
            .docker
            .create_container(
                Some(CreateContainerOptions {
                    name: service.container_name.clone(),
                    platform: None,
                }),
                config,
            )
            .await?;

        for warning in &response.warnings {
            warn!(name = %service.container_name, %warning, "container create warning");
        }

        Ok(ContainerInfo {
            id: response.id,
            name: service.container_name.clone(),
            state: "created".to_string(),
            endpoint,
            config_hash: service.hash.clone(),
        })
    }

    async fn start_container(&self, id: &str) -> RuntimeResult<()> {
        trace!(%id, "starting container");
        self.docker
            .start_container(id, None::<StartContainerOptions<String>>)
            .await?;
        Ok(())
    }

    async fn remove_container(&self, id: &str) -> RuntimeResult<()> {
        trace!(%id, "removing container");
        self.docker
            .remove_container(
                id,
                Some(RemoveContainerOptions {
                    force: true,
                    v: false,
                    ..Default::default()
                }),
            )
            .await?;
        Ok(())
    }

    async fn remove_unused_containers(
        &self,
        project: &str,
        keep: &[String],
    ) -> RuntimeResult<usize> {
        let containers = self
            .docker
            .list_containers(Some(ListContainersOptions {
                all: true,
                filters: project_filter(project),
                ..Default::default()
            }))
            .await?;

        let mut removed = 0;
        for container in containers {
            let names = container.names.unwrap_or_default();
            let keep_it = names
                .iter()
                .map(|n| n.trim_start_matches('/'))
                .any(|n| keep.iter().any(|k| k == n));
            if keep_it {
                continue;
            }

            if let Some(id) = container.id {
                self.remove_container(&id).await?;
                removed += 1;
            }
        }

        Ok(removed)
    }
}

/// Build registry credentials from the service source options, if both parts
/// are present.
fn registry_credentials(
    opts: &std::collections::BTreeMap<String, String>,
) -> Option<DockerCredentials> {
    let username = opts.get(SOURCE_USERNAME_OPTION)?;
    let password = opts.get(SOURCE_PASSWORD_OPTION)?;
    if username.is_empty() || password.is_empty() {
        return None;
    }

    Some(DockerCredentials {
        username: Some(username.clone()),
        password: Some(password.clone()),
        ..Default::default()
    })
}
