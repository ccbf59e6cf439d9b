//! Store — redb-backed persistence for projects, routes, challenges, and
//! certificates.
//!
//! Database file: `<data_dir>/app.db`.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;

use conter_core::{AcmeChallenge, Certificate, Ingress, Service};

use crate::error::{StoreError, StoreResult};
use crate::tables::*;

/// Database file name inside the data directory.
pub const DATA_FILE_NAME: &str = "app.db";

/// Convert any `Display` error into a `StoreError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StoreError::$variant(e.to_string())
    };
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct Store {
    db: Arc<Database>,
}

impl Store {
    /// Open (or create) the store inside the given data directory.
    pub fn open(data_dir: &Path) -> StoreResult<Self> {
        let path = data_dir.join(DATA_FILE_NAME);
        let db = Database::create(&path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory store (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StoreResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(PROJECTS).map_err(map_err!(Table))?;
        txn.open_table(ROUTES).map_err(map_err!(Table))?;
        txn.open_table(CONFIG).map_err(map_err!(Table))?;
        txn.open_table(CHALLENGES).map_err(map_err!(Table))?;
        txn.open_table(CERTIFICATES).map_err(map_err!(Table))?;
        txn.open_table(CERTIFICATE_MAPPINGS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Projects ───────────────────────────────────────────────────

    /// Persist the service list for a project.
    pub fn save_project(&self, project: &str, services: &[Service]) -> StoreResult<()> {
        let value = serde_json::to_vec(services).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(PROJECTS).map_err(map_err!(Table))?;
            table
                .insert(project, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%project, services = services.len(), "project stored");
        Ok(())
    }

    /// Remove a project record. Returns true if it existed.
    pub fn remove_project(&self, project: &str) -> StoreResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(PROJECTS).map_err(map_err!(Table))?;
            existed = table.remove(project).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(existed)
    }

    /// Get the stored services for a project, or `None` when unknown.
    pub fn get_project_services(&self, project: &str) -> StoreResult<Option<Vec<Service>>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(PROJECTS).map_err(map_err!(Table))?;
        match table.get(project).map_err(map_err!(Read))? {
            Some(guard) => {
                let services =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(services))
            }
            None => Ok(None),
        }
    }

    /// All projects with their services, keyed by project name.
    pub fn get_all_projects(&self) -> StoreResult<BTreeMap<String, Vec<Service>>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(PROJECTS).map_err(map_err!(Table))?;
        let mut output = BTreeMap::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            let services: Vec<Service> =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            output.insert(key.value().to_string(), services);
        }
        Ok(output)
    }

    // ── Ingress routes ─────────────────────────────────────────────

    /// Persist an ingress record under each of its domains, atomically.
    pub fn save_ingress(&self, ingress: &Ingress) -> StoreResult<()> {
        let value = serde_json::to_vec(ingress).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(ROUTES).map_err(map_err!(Table))?;
            for domain in &ingress.domains {
                table
                    .insert(domain.as_str(), value.as_slice())
                    .map_err(map_err!(Write))?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(domains = ?ingress.domains, project = %ingress.target_project, "ingress stored");
        Ok(())
    }

    /// Look up the ingress record for a domain.
    pub fn get_ingress(&self, domain: &str) -> StoreResult<Option<Ingress>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(ROUTES).map_err(map_err!(Table))?;
        match table.get(domain).map_err(map_err!(Read))? {
            Some(guard) => {
                let ingress =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(ingress))
            }
            None => Ok(None),
        }
    }

    /// All ingress records belonging to a project, keyed by domain.
    pub fn get_ingresses_by_project(
        &self,
        project: &str,
    ) -> StoreResult<BTreeMap<String, Ingress>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(ROUTES).map_err(map_err!(Table))?;
        let mut output = BTreeMap::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            let ingress: Ingress =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            if ingress.target_project == project {
                output.insert(key.value().to_string(), ingress);
            }
        }
        Ok(output)
    }

    /// Remove the ingress entry for a single domain. Returns true if it existed.
    pub fn remove_ingress(&self, domain: &str) -> StoreResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(ROUTES).map_err(map_err!(Table))?;
            existed = table.remove(domain).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(existed)
    }

    // ── ACME challenges ────────────────────────────────────────────

    /// Latest known challenge for a domain, if any.
    pub fn get_challenge(&self, domain: &str) -> StoreResult<Option<AcmeChallenge>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(CHALLENGES).map_err(map_err!(Table))?;
        match table.get(domain).map_err(map_err!(Read))? {
            Some(guard) => {
                let challenge =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(challenge))
            }
            None => Ok(None),
        }
    }

    /// Record a pending challenge for a domain, replacing any previous one.
    pub fn set_challenge(&self, domain: &str, token: &str, auth: &str) -> StoreResult<()> {
        let challenge = AcmeChallenge {
            token: token.to_string(),
            auth: auth.to_string(),
        };
        let value = serde_json::to_vec(&challenge).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(CHALLENGES).map_err(map_err!(Table))?;
            table
                .insert(domain, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Remove the challenge for a domain, but only when both token and
    /// authorization still match. A stale cleanup is a no-op.
    pub fn remove_challenge(&self, domain: &str, token: &str, auth: &str) -> StoreResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(CHALLENGES).map_err(map_err!(Table))?;
            let matches = match table.get(domain).map_err(map_err!(Read))? {
                Some(guard) => {
                    let stored: AcmeChallenge =
                        serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                    stored.token == token && stored.auth == auth
                }
                None => false,
            };
            if matches {
                table.remove(domain).map_err(map_err!(Write))?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Certificates ───────────────────────────────────────────────

    /// Persist a certificate and one mapping entry per domain, atomically.
    pub fn save_certificate(&self, cert: &Certificate) -> StoreResult<()> {
        let value = serde_json::to_vec(cert).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut certs = txn.open_table(CERTIFICATES).map_err(map_err!(Table))?;
            certs
                .insert(cert.id.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;

            let mut mappings = txn
                .open_table(CERTIFICATE_MAPPINGS)
                .map_err(map_err!(Table))?;
            for domain in &cert.domains {
                mappings
                    .insert(domain.as_str(), cert.id.as_bytes())
                    .map_err(map_err!(Write))?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(id = %cert.id, domains = ?cert.domains, "certificate stored");
        Ok(())
    }

    /// Dereference the domain mapping and return the certificate, if any.
    pub fn get_certificate(&self, domain: &str) -> StoreResult<Option<Certificate>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let mappings = txn
            .open_table(CERTIFICATE_MAPPINGS)
            .map_err(map_err!(Table))?;
        let id = match mappings.get(domain).map_err(map_err!(Read))? {
            Some(guard) => String::from_utf8_lossy(guard.value()).into_owned(),
            None => return Ok(None),
        };

        let certs = txn.open_table(CERTIFICATES).map_err(map_err!(Table))?;
        match certs.get(id.as_str()).map_err(map_err!(Read))? {
            Some(guard) => {
                let cert = serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(cert))
            }
            None => Ok(None),
        }
    }

    /// Fetch a certificate directly by id.
    pub fn get_certificate_by_id(&self, id: &str) -> StoreResult<Option<Certificate>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(CERTIFICATES).map_err(map_err!(Table))?;
        match table.get(id).map_err(map_err!(Read))? {
            Some(guard) => {
                let cert = serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(cert))
            }
            None => Ok(None),
        }
    }

    /// All certificates known to the system.
    pub fn get_all_certificates(&self) -> StoreResult<Vec<Certificate>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(CERTIFICATES).map_err(map_err!(Table))?;
        let mut output = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let cert: Certificate =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            output.push(cert);
        }
        Ok(output)
    }

    /// Whether any domain mapping still references the certificate id.
    pub fn is_certificate_in_use(&self, id: &str) -> StoreResult<bool> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn
            .open_table(CERTIFICATE_MAPPINGS)
            .map_err(map_err!(Table))?;
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            if value.value() == id.as_bytes() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Delete a certificate by id. Refused while any mapping references it.
    pub fn remove_certificate_by_id(&self, id: &str) -> StoreResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mappings = txn
                .open_table(CERTIFICATE_MAPPINGS)
                .map_err(map_err!(Table))?;
            for entry in mappings.iter().map_err(map_err!(Read))? {
                let (_, value) = entry.map_err(map_err!(Read))?;
                if value.value() == id.as_bytes() {
                    return Err(StoreError::CertificateInUse(id.to_string()));
                }
            }

            let mut certs = txn.open_table(CERTIFICATES).map_err(map_err!(Table))?;
            certs.remove(id).map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Config ─────────────────────────────────────────────────────

    /// Raw value from the config table.
    pub fn get_config(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(CONFIG).map_err(map_err!(Table))?;
        match table.get(key).map_err(map_err!(Read))? {
            Some(guard) => Ok(Some(guard.value().to_vec())),
            None => Ok(None),
        }
    }

    /// Set a raw value in the config table.
    pub fn set_config(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(CONFIG).map_err(map_err!(Table))?;
            table.insert(key, value).map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Remove a value from the config table.
    pub fn remove_config(&self, key: &str) -> StoreResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(CONFIG).map_err(map_err!(Table))?;
            table.remove(key).map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conter_core::{ChallengeType, Quota, Source};

    fn test_service(name: &str) -> Service {
        Service {
            name: name.to_string(),
            hash: format!("hash-{name}"),
            container_name: format!("demo_{name}"),
            container_image: "nginx:latest".to_string(),
            source: Source {
                kind: "docker".to_string(),
                uri: "nginx:latest".to_string(),
                opts: BTreeMap::new(),
            },
            environment: BTreeMap::new(),
            quota: Quota::default(),
            ingress: Ingress {
                target_service: name.to_string(),
                target_project: "demo".to_string(),
                ..Ingress::default()
            },
            volumes: Vec::new(),
        }
    }

    fn test_ingress(project: &str, service: &str, domains: &[&str]) -> Ingress {
        Ingress {
            domains: domains.iter().map(|d| d.to_string()).collect(),
            container_port: 80,
            target_endpoint: "127.0.0.1:30001".to_string(),
            target_service: service.to_string(),
            target_project: project.to_string(),
            challenge_type: ChallengeType::Http01,
        }
    }

    fn test_certificate(id: &str, domains: &[&str]) -> Certificate {
        Certificate::from_pem(
            id.to_string(),
            b"cert-pem",
            b"key-pem",
            ChallengeType::Http01,
            domains.iter().map(|d| d.to_string()).collect(),
        )
    }

    // ── Projects ───────────────────────────────────────────────────

    #[test]
    fn project_save_and_get() {
        let store = Store::open_in_memory().unwrap();
        let services = vec![test_service("web"), test_service("db")];

        store.save_project("demo", &services).unwrap();
        let loaded = store.get_project_services("demo").unwrap();

        assert_eq!(loaded, Some(services));
    }

    #[test]
    fn project_get_unknown_returns_none() {
        let store = Store::open_in_memory().unwrap();
        assert!(store.get_project_services("nope").unwrap().is_none());
    }

    #[test]
    fn project_remove() {
        let store = Store::open_in_memory().unwrap();
        store.save_project("demo", &[test_service("web")]).unwrap();

        assert!(store.remove_project("demo").unwrap());
        assert!(!store.remove_project("demo").unwrap());
        assert!(store.get_project_services("demo").unwrap().is_none());
    }

    #[test]
    fn project_list_all() {
        let store = Store::open_in_memory().unwrap();
        store.save_project("a", &[test_service("one")]).unwrap();
        store.save_project("b", &[test_service("two")]).unwrap();

        let all = store.get_all_projects().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all["a"][0].name, "one");
        assert_eq!(all["b"][0].name, "two");
    }

    // ── Ingress ────────────────────────────────────────────────────

    #[test]
    fn ingress_multi_domain_resolves_same_record() {
        let store = Store::open_in_memory().unwrap();
        let ingress = test_ingress("demo", "web", &["www.example.com", "example.com"]);

        store.save_ingress(&ingress).unwrap();

        let first = store.get_ingress("www.example.com").unwrap().unwrap();
        let second = store.get_ingress("example.com").unwrap().unwrap();
        assert_eq!(first, second);
        assert_eq!(first, ingress);
    }

    #[test]
    fn ingress_by_project_filters() {
        let store = Store::open_in_memory().unwrap();
        store
            .save_ingress(&test_ingress("demo", "web", &["a.test"]))
            .unwrap();
        store
            .save_ingress(&test_ingress("demo", "api", &["b.test"]))
            .unwrap();
        store
            .save_ingress(&test_ingress("other", "web", &["c.test"]))
            .unwrap();

        let routes = store.get_ingresses_by_project("demo").unwrap();
        assert_eq!(routes.len(), 2);
        assert!(routes.contains_key("a.test"));
        assert!(routes.contains_key("b.test"));
        assert!(!routes.contains_key("c.test"));
    }

    #[test]
    fn ingress_remove_single_domain() {
        let store = Store::open_in_memory().unwrap();
        store
            .save_ingress(&test_ingress("demo", "web", &["a.test", "b.test"]))
            .unwrap();

        assert!(store.remove_ingress("a.test").unwrap());
        assert!(store.get_ingress("a.test").unwrap().is_none());
        // Sibling domain keeps its entry.
        assert!(store.get_ingress("b.test").unwrap().is_some());
    }

    // ── Challenges ─────────────────────────────────────────────────

    #[test]
    fn challenge_set_and_get() {
        let store = Store::open_in_memory().unwrap();
        store.set_challenge("www.example.com", "tok", "auth").unwrap();

        let challenge = store.get_challenge("www.example.com").unwrap().unwrap();
        assert_eq!(challenge.token, "tok");
        assert_eq!(challenge.auth, "auth");
    }

    #[test]
    fn challenge_remove_requires_exact_match() {
        let store = Store::open_in_memory().unwrap();
        store.set_challenge("www.example.com", "tok", "auth").unwrap();

        // Stale cleanup with a different token is a no-op.
        store
            .remove_challenge("www.example.com", "other", "auth")
            .unwrap();
        assert!(store.get_challenge("www.example.com").unwrap().is_some());

        // Mismatched auth is also a no-op.
        store
            .remove_challenge("www.example.com", "tok", "other")
            .unwrap();
        assert!(store.get_challenge("www.example.com").unwrap().is_some());

        // Exact match removes.
        store
            .remove_challenge("www.example.com", "tok", "auth")
            .unwrap();
        assert!(store.get_challenge("www.example.com").unwrap().is_none());
    }

    #[test]
    fn challenge_remove_unknown_domain_is_noop() {
        let store = Store::open_in_memory().unwrap();
        store.remove_challenge("unknown.test", "tok", "auth").unwrap();
    }

    // ── Certificates ───────────────────────────────────────────────

    #[test]
    fn certificate_save_and_resolve_by_domain() {
        let store = Store::open_in_memory().unwrap();
        let cert = test_certificate("id-1", &["www.example.com"]);

        store.save_certificate(&cert).unwrap();
        let loaded = store.get_certificate("www.example.com").unwrap();

        assert_eq!(loaded, Some(cert));
    }

    #[test]
    fn certificate_multi_domain_mappings() {
        let store = Store::open_in_memory().unwrap();
        let cert = test_certificate("id-1", &["a.test", "b.test"]);
        store.save_certificate(&cert).unwrap();

        assert_eq!(store.get_certificate("a.test").unwrap(), Some(cert.clone()));
        assert_eq!(store.get_certificate("b.test").unwrap(), Some(cert));
    }

    #[test]
    fn certificate_in_use_tracking() {
        let store = Store::open_in_memory().unwrap();
        let cert = test_certificate("id-1", &["a.test"]);
        store.save_certificate(&cert).unwrap();

        assert!(store.is_certificate_in_use("id-1").unwrap());
        assert!(!store.is_certificate_in_use("id-2").unwrap());
    }

    #[test]
    fn certificate_remove_refused_while_mapped() {
        let store = Store::open_in_memory().unwrap();
        store
            .save_certificate(&test_certificate("id-1", &["a.test"]))
            .unwrap();

        let err = store.remove_certificate_by_id("id-1").unwrap_err();
        assert!(matches!(err, StoreError::CertificateInUse(_)));
        assert!(store.get_certificate_by_id("id-1").unwrap().is_some());
    }

    #[test]
    fn certificate_remove_after_mapping_replaced() {
        let store = Store::open_in_memory().unwrap();
        store
            .save_certificate(&test_certificate("id-1", &["a.test"]))
            .unwrap();
        // A renewal stores a new certificate for the same domain, taking over
        // the mapping.
        store
            .save_certificate(&test_certificate("id-2", &["a.test"]))
            .unwrap();

        assert!(!store.is_certificate_in_use("id-1").unwrap());
        store.remove_certificate_by_id("id-1").unwrap();
        assert!(store.get_certificate_by_id("id-1").unwrap().is_none());

        // The replacement stays resolvable.
        let current = store.get_certificate("a.test").unwrap().unwrap();
        assert_eq!(current.id, "id-2");
    }

    #[test]
    fn certificate_list_all() {
        let store = Store::open_in_memory().unwrap();
        store
            .save_certificate(&test_certificate("id-1", &["a.test"]))
            .unwrap();
        store
            .save_certificate(&test_certificate("id-2", &["b.test"]))
            .unwrap();

        assert_eq!(store.get_all_certificates().unwrap().len(), 2);
    }

    // ── Config ─────────────────────────────────────────────────────

    #[test]
    fn config_round_trip() {
        let store = Store::open_in_memory().unwrap();

        assert!(store.get_config("acme.email").unwrap().is_none());
        store.set_config("acme.email", b"a@b.test").unwrap();
        assert_eq!(
            store.get_config("acme.email").unwrap(),
            Some(b"a@b.test".to_vec())
        );

        store.remove_config("acme.email").unwrap();
        assert!(store.get_config("acme.email").unwrap().is_none());
    }

    // ── Persistence ────────────────────────────────────────────────

    #[test]
    fn persistence_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();

        {
            let store = Store::open(dir.path()).unwrap();
            store.save_project("demo", &[test_service("web")]).unwrap();
        }

        let store = Store::open(dir.path()).unwrap();
        let services = store.get_project_services("demo").unwrap().unwrap();
        assert_eq!(services[0].name, "web");
    }

    #[test]
    fn empty_store_operations() {
        let store = Store::open_in_memory().unwrap();

        assert!(store.get_all_projects().unwrap().is_empty());
        assert!(store.get_all_certificates().unwrap().is_empty());
        assert!(store.get_ingresses_by_project("any").unwrap().is_empty());
        assert!(store.get_ingress("any").unwrap().is_none());
        assert!(!store.remove_ingress("any").unwrap());
        assert!(!store.remove_project("any").unwrap());
    }
}
