//! Ingress route registration and dispatch.
//!
//! Routes live in the state store; the router layers ownership validation
//! and certificate scheduling on top of the raw table.

use tracing::{debug, info, trace, warn};

use conter_certs::CertificateManager;
use conter_core::Ingress;
use conter_state::Store;

use crate::{IngressError, IngressResult};

/// Maintains the {domain → backend} mapping consumed by the proxy listeners.
#[derive(Clone)]
pub struct IngressRouter {
    store: Store,
    certs: CertificateManager,
}

impl IngressRouter {
    pub fn new(store: Store, certs: CertificateManager) -> Self {
        Self { store, certs }
    }

    /// Register an ingress route and schedule certificates for its domains.
    ///
    /// Every listed domain must be unbound or already bound to the same
    /// (project, service) pair; anything else is a conflict. A registration
    /// that changes nothing is a no-op and does not re-request certificates.
    pub fn register(&self, ingress: &Ingress) -> IngressResult<()> {
        if ingress.domains.is_empty() {
            trace!(
                service = %ingress.target_service,
                "service has no ingress domains, nothing to register"
            );
            return Ok(());
        }

        debug!(
            domains = ?ingress.domains,
            endpoint = %ingress.target_endpoint,
            challenge = %ingress.challenge_type,
            "registering ingress route"
        );

        let mut unchanged = true;
        for domain in &ingress.domains {
            match self.store.get_ingress(domain)? {
                Some(existing) => {
                    if existing.target_project != ingress.target_project
                        || existing.target_service != ingress.target_service
                    {
                        return Err(IngressError::Conflict {
                            domain: domain.clone(),
                            project: existing.target_project,
                            service: existing.target_service,
                        });
                    }
                    if existing != *ingress {
                        unchanged = false;
                    }
                }
                None => unchanged = false,
            }
        }

        if unchanged {
            trace!(domains = ?ingress.domains, "route already registered, no action required");
            return Ok(());
        }

        self.store.save_ingress(ingress)?;

        // Certificates are requested asynchronously; a scheduling failure
        // leaves the route functional behind the self-signed fallback.
        if let Err(e) = self
            .certs
            .obtain_for_domains(&ingress.domains, ingress.challenge_type)
        {
            warn!(error = %e, domains = ?ingress.domains, "could not schedule certificate request");
        }

        Ok(())
    }

    /// Remove every stored route of the project whose domain is not listed
    /// in `keep`. Returns the number removed.
    pub fn remove_unused_routes(&self, project: &str, keep: &[String]) -> IngressResult<usize> {
        trace!(%project, ?keep, "removing unused routes");

        let routes = self.store.get_ingresses_by_project(project)?;
        let mut removed = 0;
        for domain in routes.keys() {
            if !keep.contains(domain) {
                debug!(%domain, %project, "removing unused route");
                self.store.remove_ingress(domain)?;
                removed += 1;
            }
        }

        if removed > 0 {
            info!(%project, removed, "pruned unused routes");
        }
        Ok(removed)
    }

    /// Remove all routes linked to the project.
    pub fn remove_all_routes(&self, project: &str) -> IngressResult<usize> {
        self.remove_unused_routes(project, &[])
    }

    /// Retrieve the ingress route for a domain.
    pub fn match_domain(&self, domain: &str) -> IngressResult<Option<Ingress>> {
        Ok(self.store.get_ingress(domain)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conter_certs::AcmeSettings;
    use conter_core::ChallengeType;

    fn test_router() -> IngressRouter {
        let store = Store::open_in_memory().unwrap();
        let certs = CertificateManager::new(
            store.clone(),
            AcmeSettings {
                email: String::new(),
                directory_url: "https://acme.invalid/directory".to_string(),
                insecure: false,
            },
        );
        IngressRouter::new(store, certs)
    }

    fn test_ingress(project: &str, service: &str, domains: &[&str]) -> Ingress {
        Ingress {
            domains: domains.iter().map(|d| d.to_string()).collect(),
            container_port: 80,
            target_endpoint: "127.0.0.1:30001".to_string(),
            target_service: service.to_string(),
            target_project: project.to_string(),
            challenge_type: ChallengeType::None,
        }
    }

    #[tokio::test]
    async fn register_and_match() {
        let router = test_router();
        let ingress = test_ingress("demo", "web", &["www.example.com"]);

        router.register(&ingress).unwrap();

        let matched = router.match_domain("www.example.com").unwrap().unwrap();
        assert_eq!(matched, ingress);
        assert!(router.match_domain("unknown.test").unwrap().is_none());
    }

    #[tokio::test]
    async fn register_empty_domains_is_noop() {
        let router = test_router();
        router.register(&test_ingress("demo", "web", &[])).unwrap();
    }

    #[tokio::test]
    async fn register_conflict_with_other_project() {
        let router = test_router();
        router
            .register(&test_ingress("demo", "web", &["www.example.com"]))
            .unwrap();

        let err = router
            .register(&test_ingress("other", "web", &["www.example.com"]))
            .unwrap_err();
        assert!(matches!(err, IngressError::Conflict { .. }));

        // The original owner keeps the route.
        let matched = router.match_domain("www.example.com").unwrap().unwrap();
        assert_eq!(matched.target_project, "demo");
    }

    #[tokio::test]
    async fn register_conflict_with_other_service() {
        let router = test_router();
        router
            .register(&test_ingress("demo", "web", &["www.example.com"]))
            .unwrap();

        let err = router
            .register(&test_ingress("demo", "api", &["www.example.com"]))
            .unwrap_err();
        assert!(matches!(err, IngressError::Conflict { .. }));
    }

    #[tokio::test]
    async fn register_same_owner_updates_endpoint() {
        let router = test_router();
        router
            .register(&test_ingress("demo", "web", &["www.example.com"]))
            .unwrap();

        let mut updated = test_ingress("demo", "web", &["www.example.com"]);
        updated.target_endpoint = "127.0.0.1:30002".to_string();
        router.register(&updated).unwrap();

        let matched = router.match_domain("www.example.com").unwrap().unwrap();
        assert_eq!(matched.target_endpoint, "127.0.0.1:30002");
    }

    #[tokio::test]
    async fn register_is_idempotent() {
        let router = test_router();
        let ingress = test_ingress("demo", "web", &["www.example.com"]);

        router.register(&ingress).unwrap();
        router.register(&ingress).unwrap();

        let matched = router.match_domain("www.example.com").unwrap().unwrap();
        assert_eq!(matched, ingress);
    }

    #[tokio::test]
    async fn prune_unused_routes() {
        let router = test_router();
        router
            .register(&test_ingress("demo", "web", &["a.test", "b.test"]))
            .unwrap();
        router
            .register(&test_ingress("demo", "api", &["c.test"]))
            .unwrap();
        router
            .register(&test_ingress("other", "web", &["d.test"]))
            .unwrap();

        let removed = router
            .remove_unused_routes("demo", &["a.test".to_string()])
            .unwrap();
        assert_eq!(removed, 2);

        assert!(router.match_domain("a.test").unwrap().is_some());
        assert!(router.match_domain("b.test").unwrap().is_none());
        assert!(router.match_domain("c.test").unwrap().is_none());
        // Other projects are untouched.
        assert!(router.match_domain("d.test").unwrap().is_some());
    }

    #[tokio::test]
    async fn remove_all_routes() {
        let router = test_router();
        router
            .register(&test_ingress("demo", "web", &["a.test", "b.test"]))
            .unwrap();

        let removed = router.remove_all_routes("demo").unwrap();
        assert_eq!(removed, 2);
        assert!(router.match_domain("a.test").unwrap().is_none());
    }
}
