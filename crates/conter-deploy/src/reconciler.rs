//! Project reconciliation — converge runtime state onto a declared project.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use conter_core::{config_hash, ChallengeType, Ingress, Quota, Service, Source, Volume};
use conter_proxy::IngressRouter;
use conter_runtime::{ContainerRuntime, Network};
use conter_state::Store;

use crate::source::image_from_source;
use crate::{DeployError, DeployResult};

/// Declarative project description accepted by the management API.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApplyProjectRequest {
    #[serde(default)]
    pub project_name: String,
    #[serde(default)]
    pub services: Vec<ApplyServiceRequest>,
}

/// One service within an apply request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApplyServiceRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub source: Source,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
    #[serde(default)]
    pub ingress_domains: Vec<String>,
    #[serde(default)]
    pub container_port: u16,
    #[serde(default)]
    pub volumes: Vec<Volume>,
    #[serde(default)]
    pub challenge_type: ChallengeType,
    #[serde(default)]
    pub quota: Quota,
}

/// Live state of a single service's container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    Running,
    Stopped,
    NotAvailable,
}

impl ServiceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceState::Running => "running",
            ServiceState::Stopped => "stopped",
            ServiceState::NotAvailable => "not_available",
        }
    }
}

/// Stored services of a project plus their observed container states.
#[derive(Debug, Clone)]
pub struct ProjectStatus {
    pub services: Vec<Service>,
    statuses: BTreeMap<String, ServiceState>,
}

impl ProjectStatus {
    /// Observed state for a service, `not_available` when the runtime does
    /// not know its container.
    pub fn get_state(&self, service: &str) -> ServiceState {
        self.statuses
            .get(service)
            .copied()
            .unwrap_or(ServiceState::NotAvailable)
    }
}

/// Counts reported by a project removal, informational only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemovalOutcome {
    pub routes: usize,
    pub containers: usize,
}

/// Translates declarative project requests into runtime actions.
#[derive(Clone)]
pub struct Reconciler {
    store: Store,
    runtime: Arc<dyn ContainerRuntime>,
    router: IngressRouter,
    /// Serializes apply/remove per project so concurrent calls for the same
    /// name cannot interleave on the services list.
    locks: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl Reconciler {
    pub fn new(store: Store, runtime: Arc<dyn ContainerRuntime>, router: IngressRouter) -> Self {
        Self {
            store,
            runtime,
            router,
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn project_lock(&self, project: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().expect("project locks");
        locks.entry(project.to_string()).or_default().clone()
    }

    /// Whether the project has stored state.
    pub fn project_exists(&self, project: &str) -> bool {
        matches!(self.store.get_project_services(project), Ok(Some(services)) if !services.is_empty())
    }

    /// All projects currently known, with their stored services.
    pub fn find_all_projects(&self) -> DeployResult<BTreeMap<String, Vec<Service>>> {
        Ok(self.store.get_all_projects()?)
    }

    /// Apply the configuration changes for the project: create what is
    /// missing, restart what stopped, rebuild what changed, and prune what
    /// is no longer referenced.
    pub async fn apply_project(&self, request: &ApplyProjectRequest) -> DeployResult<Vec<Service>> {
        request.validate()?;

        let lock = self.project_lock(&request.project_name);
        let _guard = lock.lock().await;

        // Materialize the desired service records.
        let mut domains = Vec::new();
        let mut container_names = Vec::with_capacity(request.services.len());
        let mut services = Vec::with_capacity(request.services.len());

        for spec in &request.services {
            let mut service = Service {
                name: spec.name.clone(),
                hash: String::new(),
                container_name: format!("{}_{}", request.project_name, spec.name),
                container_image: String::new(),
                source: spec.source.clone(),
                environment: spec.environment.clone(),
                quota: spec.quota,
                ingress: Ingress {
                    domains: spec.ingress_domains.clone(),
                    container_port: spec.container_port,
                    target_endpoint: String::new(),
                    target_service: spec.name.clone(),
                    target_project: request.project_name.clone(),
                    challenge_type: spec.challenge_type,
                },
                volumes: spec.volumes.clone(),
            };

            domains.extend(spec.ingress_domains.iter().cloned());
            container_names.push(service.container_name.clone());

            service.container_image =
                image_from_source(&service)
                    .await
                    .map_err(|e| DeployError::Source {
                        service: spec.name.clone(),
                        reason: e.to_string(),
                    })?;
            service.hash = config_hash(&service);
            services.push(service);
        }

        info!(
            project = %request.project_name,
            services = services.len(),
            "preparing to apply project"
        );

        let network = self.runtime.ensure_network(&request.project_name).await?;

        let removed = self
            .router
            .remove_unused_routes(&request.project_name, &domains)?;
        if removed > 0 {
            debug!(project = %request.project_name, removed, "removed unused routes");
        }

        let removed = self
            .runtime
            .remove_unused_containers(&request.project_name, &container_names)
            .await?;
        if removed > 0 {
            debug!(project = %request.project_name, removed, "removed unused containers");
        }

        let mut applied = Vec::with_capacity(services.len());
        for service in services {
            let service = self.apply_service(service, &network).await?;
            applied.push(service);
        }

        self.store.save_project(&request.project_name, &applied)?;
        info!(project = %request.project_name, "project applied");
        Ok(applied)
    }

    /// Converge a single service onto its declared configuration.
    async fn apply_service(&self, mut service: Service, network: &Network) -> DeployResult<Service> {
        if let Some(container) = self.runtime.find_container(&service.container_name).await {
            debug!(
                service = %service.name,
                container = %container.id,
                "container already exists, checking status"
            );

            // The runtime decided the host endpoint when the container was
            // created; carry it over.
            service.ingress.target_endpoint = container.endpoint.clone();

            if container.config_hash != service.hash {
                warn!(
                    service = %service.name,
                    container = %container.id,
                    "configuration hash does not match, rebuilding"
                );
                self.runtime.remove_container(&container.id).await?;
                // The endpoint died with the container.
                service.ingress.target_endpoint.clear();
            } else {
                if container.is_running() {
                    trace!(service = %service.name, "service is already running, no action required");
                } else {
                    warn!(
                        service = %service.name,
                        container = %container.id,
                        "container is not running, restarting"
                    );
                    self.runtime.start_container(&container.id).await?;
                }

                self.router.register(&service.ingress)?;
                return Ok(service);
            }
        }

        let container = self.runtime.create_container(&service, network).await?;
        self.runtime.start_container(&container.id).await?;

        service.ingress.target_endpoint = container.endpoint;
        self.router.register(&service.ingress)?;

        debug!(
            service = %service.name,
            container = %container.id,
            project = %service.ingress.target_project,
            "container created"
        );
        Ok(service)
    }

    /// Remove the project and everything attached to it. Route and container
    /// removal failures abort; a network removal failure is only logged.
    pub async fn remove_project(&self, project: &str) -> DeployResult<RemovalOutcome> {
        let lock = self.project_lock(project);
        let _guard = lock.lock().await;

        let routes = self.router.remove_all_routes(project)?;
        let containers = self.runtime.remove_all_containers_for_project(project).await?;

        if let Err(e) = self.runtime.delete_network(project).await {
            warn!(error = %e, %project, "failed to remove network");
        }

        self.store.remove_project(project)?;
        info!(%project, containers, routes, "project removed");
        Ok(RemovalOutcome { routes, containers })
    }

    /// Stored services plus the observed container state per service.
    pub async fn get_project_status(&self, project: &str) -> DeployResult<ProjectStatus> {
        let services = self
            .store
            .get_project_services(project)?
            .filter(|services| !services.is_empty())
            .ok_or_else(|| DeployError::ProjectNotFound(project.to_string()))?;

        let mut statuses = BTreeMap::new();
        for service in &services {
            if let Some(container) = self.runtime.find_container(&service.container_name).await {
                let state = if container.is_running() {
                    ServiceState::Running
                } else {
                    ServiceState::Stopped
                };
                statuses.insert(service.name.clone(), state);
            }
        }

        Ok(ProjectStatus { services, statuses })
    }

    /// Whether every service of the project reports `running`.
    pub async fn is_project_running(&self, project: &str) -> bool {
        let Ok(status) = self.get_project_status(project).await else {
            return false;
        };

        status
            .services
            .iter()
            .all(|service| status.get_state(&service.name) == ServiceState::Running)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use conter_certs::{AcmeSettings, CertificateManager};
    use conter_runtime::{ContainerInfo, RuntimeError, RuntimeResult};
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockState {
        containers: HashMap<String, MockContainer>,
        networks: Vec<String>,
        next_port: u16,
        next_id: usize,
        creates: usize,
        fail_network_delete: bool,
    }

    struct MockContainer {
        info: ContainerInfo,
        project: String,
    }

    /// In-memory stand-in for the Docker adapter.
    #[derive(Default)]
    struct MockRuntime {
        state: Mutex<MockState>,
    }

    impl MockRuntime {
        fn with_failing_network_delete() -> Self {
            let runtime = Self::default();
            runtime.state.lock().unwrap().fail_network_delete = true;
            runtime
        }

        fn container_count(&self, project: &str) -> usize {
            self.state
                .lock()
                .unwrap()
                .containers
                .values()
                .filter(|c| c.project == project)
                .count()
        }

        fn creates(&self) -> usize {
            self.state.lock().unwrap().creates
        }

        fn set_state(&self, name: &str, state: &str) {
            let mut guard = self.state.lock().unwrap();
            guard.containers.get_mut(name).unwrap().info.state = state.to_string();
        }
    }

    #[async_trait]
    impl ContainerRuntime for MockRuntime {
        async fn ensure_network(&self, project: &str) -> RuntimeResult<Network> {
            let mut guard = self.state.lock().unwrap();
            if !guard.networks.contains(&project.to_string()) {
                guard.networks.push(project.to_string());
            }
            Ok(Network {
                id: format!("net-{project}"),
                name: project.to_string(),
            })
        }

        async fn delete_network(&self, project: &str) -> RuntimeResult<()> {
            let mut guard = self.state.lock().unwrap();
            if guard.fail_network_delete {
                return Err(RuntimeError::Network("endpoint still attached".to_string()));
            }
            guard.networks.retain(|n| n != project);
            Ok(())
        }

        async fn find_container(&self, name: &str) -> Option<ContainerInfo> {
            self.state
                .lock()
                .unwrap()
                .containers
                .get(name)
                .map(|c| c.info.clone())
        }

        async fn create_container(
            &self,
            service: &Service,
            _network: &Network,
        ) -> RuntimeResult<ContainerInfo> {
            let mut guard = self.state.lock().unwrap();
            guard.creates += 1;
            guard.next_id += 1;

            let endpoint = if service.ingress.container_port > 0 {
                guard.next_port += 1;
                format!("127.0.0.1:{}", 30000 + guard.next_port)
            } else {
                String::new()
            };

            let info = ContainerInfo {
                id: format!("cid-{}", guard.next_id),
                name: service.container_name.clone(),
                state: "created".to_string(),
                endpoint,
                config_hash: service.hash.clone(),
            };
            guard.containers.insert(
                service.container_name.clone(),
                MockContainer {
                    info: info.clone(),
                    project: service.ingress.target_project.clone(),
                },
            );
            Ok(info)
        }

        async fn start_container(&self, id: &str) -> RuntimeResult<()> {
            let mut guard = self.state.lock().unwrap();
            for container in guard.containers.values_mut() {
                if container.info.id == id {
                    container.info.state = "running".to_string();
                    return Ok(());
                }
            }
            Err(RuntimeError::Network(format!("no such container {id}")))
        }

        async fn remove_container(&self, id: &str) -> RuntimeResult<()> {
            let mut guard = self.state.lock().unwrap();
            guard.containers.retain(|_, c| c.info.id != id);
            Ok(())
        }

        async fn remove_unused_containers(
            &self,
            project: &str,
            keep: &[String],
        ) -> RuntimeResult<usize> {
            let mut guard = self.state.lock().unwrap();
            let before = guard.containers.len();
            guard
                .containers
                .retain(|name, c| c.project != project || keep.contains(name));
            Ok(before - guard.containers.len())
        }
    }

    fn test_setup(runtime: MockRuntime) -> (Reconciler, Arc<MockRuntime>, IngressRouter) {
        let store = Store::open_in_memory().unwrap();
        let certs = CertificateManager::new(
            store.clone(),
            AcmeSettings {
                email: String::new(),
                directory_url: "https://acme.invalid/directory".to_string(),
                insecure: false,
            },
        );
        let router = IngressRouter::new(store.clone(), certs);
        let runtime = Arc::new(runtime);
        let reconciler = Reconciler::new(store, runtime.clone(), router.clone());
        (reconciler, runtime, router)
    }

    fn web_request() -> ApplyProjectRequest {
        ApplyProjectRequest {
            project_name: "demo".to_string(),
            services: vec![
                ApplyServiceRequest {
                    name: "web".to_string(),
                    source: Source {
                        kind: "docker".to_string(),
                        uri: "nginx:latest".to_string(),
                        opts: BTreeMap::new(),
                    },
                    ingress_domains: vec!["www.example.com".to_string()],
                    container_port: 80,
                    challenge_type: ChallengeType::None,
                    ..ApplyServiceRequest::default()
                },
                ApplyServiceRequest {
                    name: "database".to_string(),
                    source: Source {
                        kind: "docker".to_string(),
                        uri: "postgresql:latest".to_string(),
                        opts: BTreeMap::new(),
                    },
                    ..ApplyServiceRequest::default()
                },
            ],
        }
    }

    #[tokio::test]
    async fn apply_rejects_invalid_request() {
        let (reconciler, _, _) = test_setup(MockRuntime::default());
        let request = ApplyProjectRequest::default();

        let err = reconciler.apply_project(&request).await.unwrap_err();
        assert!(matches!(err, DeployError::Validation(_)));
    }

    #[tokio::test]
    async fn apply_creates_containers_routes_and_state() {
        let (reconciler, runtime, router) = test_setup(MockRuntime::default());

        let applied = reconciler.apply_project(&web_request()).await.unwrap();

        assert_eq!(applied.len(), 2);
        let web = &applied[0];
        assert_eq!(web.container_name, "demo_web");
        assert_eq!(web.container_image, "nginx:latest");
        assert!(!web.hash.is_empty());
        assert!(web.ingress.target_endpoint.starts_with("127.0.0.1:"));

        // Unexposed services get no endpoint.
        assert_eq!(applied[1].ingress.target_endpoint, "");

        // Both containers were created and started.
        assert_eq!(runtime.container_count("demo"), 2);
        assert_eq!(runtime.creates(), 2);

        // The route points at the web container's endpoint.
        let route = router.match_domain("www.example.com").unwrap().unwrap();
        assert_eq!(route.target_endpoint, web.ingress.target_endpoint);
        assert_eq!(route.target_project, "demo");
        assert_eq!(route.target_service, "web");

        // The service list was persisted.
        assert!(reconciler.project_exists("demo"));
    }

    #[tokio::test]
    async fn apply_twice_is_idempotent() {
        let (reconciler, runtime, _) = test_setup(MockRuntime::default());

        let first = reconciler.apply_project(&web_request()).await.unwrap();
        let second = reconciler.apply_project(&web_request()).await.unwrap();

        // No container was rebuilt and the stored services are identical.
        assert_eq!(runtime.creates(), 2);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn apply_rebuilds_on_config_change() {
        let (reconciler, runtime, router) = test_setup(MockRuntime::default());
        reconciler.apply_project(&web_request()).await.unwrap();

        let mut changed = web_request();
        changed.services[0]
            .environment
            .insert("MODE".to_string(), "fancy".to_string());

        let applied = reconciler.apply_project(&changed).await.unwrap();

        // The web container was recycled, the database was untouched.
        assert_eq!(runtime.creates(), 3);
        assert_eq!(runtime.container_count("demo"), 2);

        // The route follows the replacement container's endpoint.
        let route = router.match_domain("www.example.com").unwrap().unwrap();
        assert_eq!(route.target_endpoint, applied[0].ingress.target_endpoint);
    }

    #[tokio::test]
    async fn apply_restarts_stopped_container() {
        let (reconciler, runtime, _) = test_setup(MockRuntime::default());
        reconciler.apply_project(&web_request()).await.unwrap();

        runtime.set_state("demo_web", "exited");
        reconciler.apply_project(&web_request()).await.unwrap();

        // Restarted in place, not recreated.
        assert_eq!(runtime.creates(), 2);
        let container = runtime.find_container("demo_web").await.unwrap();
        assert!(container.is_running());
    }

    #[tokio::test]
    async fn apply_prunes_dropped_services() {
        let (reconciler, runtime, router) = test_setup(MockRuntime::default());
        reconciler.apply_project(&web_request()).await.unwrap();

        // Re-apply with only the database service.
        let mut trimmed = web_request();
        trimmed.services.remove(0);
        reconciler.apply_project(&trimmed).await.unwrap();

        assert_eq!(runtime.container_count("demo"), 1);
        assert!(runtime.find_container("demo_web").await.is_none());
        assert!(router.match_domain("www.example.com").unwrap().is_none());

        let stored = reconciler.find_all_projects().unwrap();
        assert_eq!(stored["demo"].len(), 1);
        assert_eq!(stored["demo"][0].name, "database");
    }

    #[tokio::test]
    async fn remove_project_clears_everything() {
        let (reconciler, runtime, router) = test_setup(MockRuntime::default());
        reconciler.apply_project(&web_request()).await.unwrap();

        let outcome = reconciler.remove_project("demo").await.unwrap();

        assert_eq!(outcome.routes, 1);
        assert_eq!(outcome.containers, 2);
        assert_eq!(runtime.container_count("demo"), 0);
        assert!(router.match_domain("www.example.com").unwrap().is_none());
        assert!(!reconciler.project_exists("demo"));
    }

    #[tokio::test]
    async fn remove_project_survives_network_failure() {
        let (reconciler, _, _) = test_setup(MockRuntime::with_failing_network_delete());
        reconciler.apply_project(&web_request()).await.unwrap();

        // Network removal fails, but the project still goes away.
        reconciler.remove_project("demo").await.unwrap();
        assert!(!reconciler.project_exists("demo"));
    }

    #[tokio::test]
    async fn status_reports_live_container_states() {
        let (reconciler, runtime, _) = test_setup(MockRuntime::default());
        reconciler.apply_project(&web_request()).await.unwrap();

        let status = reconciler.get_project_status("demo").await.unwrap();
        assert_eq!(status.get_state("web"), ServiceState::Running);
        assert_eq!(status.get_state("database"), ServiceState::Running);
        assert!(reconciler.is_project_running("demo").await);

        runtime.set_state("demo_web", "exited");
        let status = reconciler.get_project_status("demo").await.unwrap();
        assert_eq!(status.get_state("web"), ServiceState::Stopped);
        assert!(!reconciler.is_project_running("demo").await);

        // A service whose container vanished is reported as not available.
        let id = runtime.find_container("demo_web").await.unwrap().id;
        runtime.remove_container(&id).await.unwrap();
        let status = reconciler.get_project_status("demo").await.unwrap();
        assert_eq!(status.get_state("web"), ServiceState::NotAvailable);
    }

    #[tokio::test]
    async fn status_unknown_project_errors() {
        let (reconciler, _, _) = test_setup(MockRuntime::default());
        let err = reconciler.get_project_status("ghost").await.unwrap_err();
        assert!(matches!(err, DeployError::ProjectNotFound(_)));
        assert!(!reconciler.is_project_running("ghost").await);
    }
}
