//! Certificate manager — obtains, stores, serves, and renews certificates.

use std::time::Duration;

use instant_acme::{
    Account, AuthorizationStatus, ChallengeType as AcmeChallengeType, Identifier, NewOrder,
    OrderStatus,
};
use rcgen::{CertificateParams, KeyPair};
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use conter_core::{Certificate, ChallengeType};
use conter_state::Store;

use crate::account::{resolve_account, AcmeSettings};
use crate::error::{CertError, CertResult};
use crate::info::{parse_certificate, CertificateInfo};
use crate::RENEWAL_WINDOW_DAYS;

/// How often the order/certificate is polled before giving up.
const POLL_ATTEMPTS: u32 = 10;
const POLL_INITIAL_DELAY: Duration = Duration::from_millis(500);
const POLL_MAX_DELAY: Duration = Duration::from_secs(8);

/// Result of a batch sweep over all known certificates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct BatchOutcome {
    /// Renewals scheduled this sweep.
    pub renewed: usize,
    /// Expired, unreferenced certificates deleted this sweep.
    pub removed: usize,
}

/// Owns the ACME account and the certificate lifecycle.
///
/// Cheap to clone; the underlying store handle and account cache are shared.
#[derive(Clone)]
pub struct CertificateManager {
    store: Store,
    settings: AcmeSettings,
    account: std::sync::Arc<Mutex<Option<Account>>>,
}

impl CertificateManager {
    pub fn new(store: Store, settings: AcmeSettings) -> Self {
        if settings.email.is_empty() {
            warn!("no ACME email address set, certificates cannot be requested until configured");
        }

        Self {
            store,
            settings,
            account: std::sync::Arc::new(Mutex::new(None)),
        }
    }

    /// Resolve the cached ACME account, registering on first use.
    async fn account(&self) -> CertResult<Account> {
        let mut slot = self.account.lock().await;
        if let Some(account) = slot.as_ref() {
            return Ok(account.clone());
        }

        let account = resolve_account(&self.store, &self.settings).await?;
        *slot = Some(account.clone());
        Ok(account)
    }

    // ── HTTP-01 provider contract ──────────────────────────────────

    /// Store a pending challenge so the proxy can serve it.
    pub fn present(&self, domain: &str, token: &str, auth: &str) -> CertResult<()> {
        trace!(%domain, %token, "presenting ACME challenge");
        self.store.set_challenge(domain, token, auth)?;
        Ok(())
    }

    /// Remove a challenge, but only while it still matches (token, auth).
    pub fn cleanup(&self, domain: &str, token: &str, auth: &str) -> CertResult<()> {
        trace!(%domain, %token, "cleaning up ACME challenge");
        self.store.remove_challenge(domain, token, auth)?;
        Ok(())
    }

    /// Key authorization for a pending challenge, used by the proxy to
    /// answer the CA's validation request.
    pub fn authorize(&self, domain: &str, token: &str) -> CertResult<String> {
        let challenge = self
            .store
            .get_challenge(domain)?
            .ok_or(CertError::NoChallenge)?;

        if challenge.token != token {
            return Err(CertError::InvalidToken);
        }

        Ok(challenge.auth)
    }

    // ── Obtain / renew ─────────────────────────────────────────────

    /// Request certificates for the given domains.
    ///
    /// Returns immediately; the actual ACME conversation runs on a
    /// background task. Domains with an in-flight challenge are skipped so
    /// concurrent requests never double-order.
    pub fn obtain_for_domains(
        &self,
        domains: &[String],
        challenge_type: ChallengeType,
    ) -> CertResult<()> {
        if domains.is_empty() {
            return Ok(());
        }

        // NONE is a deliberate opt-out, never an error.
        if challenge_type == ChallengeType::None {
            trace!(?domains, "challenge type NONE, skipping certificate request");
            return Ok(());
        }

        if challenge_type != ChallengeType::Http01 {
            error!(%challenge_type, "challenge type is not supported");
            return Err(CertError::UnsupportedChallenge(challenge_type));
        }

        if self.settings.email.is_empty() {
            error!("unable to request certificate, ACME email is not configured");
            return Err(CertError::EmailNotConfigured);
        }

        let mut pending = Vec::with_capacity(domains.len());
        for domain in domains {
            if self.store.get_challenge(domain)?.is_some() {
                info!(%domain, "challenge already in flight, skipping");
            } else {
                pending.push(domain.clone());
            }
        }

        if pending.is_empty() {
            warn!("all requested domains already have challenges in flight, no action required");
            return Ok(());
        }

        let manager = self.clone();
        tokio::spawn(async move {
            info!(domains = %pending.join(","), "requesting certificate bundle");
            match manager.obtain(&pending, challenge_type).await {
                Ok(cert) => {
                    info!(id = %cert.id, domains = %pending.join(","), "certificate bundle obtained");
                }
                Err(e) => {
                    error!(error = %e, domains = %pending.join(","), "failed to obtain certificate");
                }
            }
        });

        Ok(())
    }

    /// Drive a full ACME order for the domains and persist the result.
    async fn obtain(
        &self,
        domains: &[String],
        challenge_type: ChallengeType,
    ) -> CertResult<Certificate> {
        let account = self.account().await?;

        let identifiers: Vec<Identifier> = domains
            .iter()
            .map(|d| Identifier::Dns(d.clone()))
            .collect();
        let mut order = account
            .new_order(&NewOrder {
                identifiers: &identifiers,
            })
            .await?;

        // Present one HTTP-01 challenge per pending authorization. Keep what
        // we presented so cleanup stays conditional on our own tokens.
        let mut presented: Vec<(String, String, String)> = Vec::new();
        let result = self.drive_order(&mut order, &mut presented).await;

        // Challenges are removed whether the order succeeded or not; the
        // conditional removal keeps a racing re-present intact.
        for (domain, token, auth) in &presented {
            if let Err(e) = self.cleanup(domain, token, auth) {
                warn!(error = %e, %domain, "failed to clean up challenge");
            }
        }

        let (chain_pem, key_pem) = result?;

        let cert = Certificate::from_pem(
            Uuid::new_v4().to_string(),
            chain_pem.as_bytes(),
            key_pem.as_bytes(),
            challenge_type,
            domains.to_vec(),
        );
        self.store.save_certificate(&cert)?;
        Ok(cert)
    }

    /// Run the order through authorization, readiness, and finalization.
    async fn drive_order(
        &self,
        order: &mut instant_acme::Order,
        presented: &mut Vec<(String, String, String)>,
    ) -> CertResult<(String, String)> {
        let authorizations = order.authorizations().await?;
        let mut domains = Vec::with_capacity(authorizations.len());

        for authz in &authorizations {
            let domain = match &authz.identifier {
                Identifier::Dns(domain) => domain.clone(),
                _ => continue,
            };
            domains.push(domain.clone());

            match authz.status {
                AuthorizationStatus::Valid => continue,
                AuthorizationStatus::Pending => {}
                status => {
                    return Err(CertError::OrderFailed {
                        domains: domain,
                        status: format!("{status:?}"),
                    });
                }
            }

            let challenge = authz
                .challenges
                .iter()
                .find(|c| c.r#type == AcmeChallengeType::Http01)
                .ok_or_else(|| CertError::MissingHttp01(domain.clone()))?;

            let key_auth = order.key_authorization(challenge);
            self.present(&domain, &challenge.token, key_auth.as_str())?;
            presented.push((
                domain,
                challenge.token.clone(),
                key_auth.as_str().to_string(),
            ));

            order.set_challenge_ready(&challenge.url).await?;
        }

        // Wait for the CA to validate the challenges.
        let mut delay = POLL_INITIAL_DELAY;
        let mut attempts = 0;
        loop {
            tokio::time::sleep(delay).await;
            let state = order.refresh().await?;
            match state.status {
                OrderStatus::Ready | OrderStatus::Valid => break,
                OrderStatus::Invalid => {
                    return Err(CertError::OrderFailed {
                        domains: domains.join(","),
                        status: "invalid".to_string(),
                    });
                }
                _ => {
                    attempts += 1;
                    if attempts >= POLL_ATTEMPTS {
                        return Err(CertError::OrderTimeout);
                    }
                    delay = (delay * 2).min(POLL_MAX_DELAY);
                }
            }
        }

        // Finalize with a fresh key pair and fetch the issued chain.
        let key_pair = KeyPair::generate()?;
        let params = CertificateParams::new(domains.clone())?;
        let csr = params.serialize_request(&key_pair)?;
        order.finalize(csr.der()).await?;

        let mut delay = POLL_INITIAL_DELAY;
        let mut attempts = 0;
        let chain_pem = loop {
            match order.certificate().await? {
                Some(chain) => break chain,
                None => {
                    attempts += 1;
                    if attempts >= POLL_ATTEMPTS {
                        return Err(CertError::OrderTimeout);
                    }
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(POLL_MAX_DELAY);
                }
            }
        };

        Ok((chain_pem, key_pair.serialize_pem()))
    }

    // ── Lookup ─────────────────────────────────────────────────────

    /// Active certificate for a domain, if any.
    pub fn get(&self, domain: &str) -> Option<Certificate> {
        match self.store.get_certificate(domain) {
            Ok(cert) => cert,
            Err(e) => {
                warn!(error = %e, %domain, "failed to retrieve certificate");
                None
            }
        }
    }

    /// All certificates currently known to the system.
    pub fn get_all(&self) -> Vec<Certificate> {
        match self.store.get_all_certificates() {
            Ok(certs) => certs,
            Err(e) => {
                warn!(error = %e, "failed to list certificates");
                Vec::new()
            }
        }
    }

    /// Parsed metadata of a stored certificate bundle.
    pub fn inspect(&self, cert: &Certificate) -> CertResult<CertificateInfo> {
        parse_certificate(cert)
    }

    /// Whether every domain has a parseable, unexpired certificate.
    pub fn has_valid_certificate(&self, domains: &[String]) -> bool {
        let now = OffsetDateTime::now_utc();
        for domain in domains {
            let Some(cert) = self.get(domain) else {
                return false;
            };
            match parse_certificate(&cert) {
                Ok(info) if !info.is_expired_at(now) => {}
                _ => return false,
            }
        }
        true
    }

    // ── Batch sweep ────────────────────────────────────────────────

    /// Sweep every known certificate: schedule renewal for anything inside
    /// the 30-day expiry window and delete bundles that are expired and no
    /// longer referenced by any domain mapping.
    pub fn batch(&self) -> CertResult<BatchOutcome> {
        let now = OffsetDateTime::now_utc();
        let mut outcome = BatchOutcome::default();

        for cert in self.store.get_all_certificates()? {
            let info = match parse_certificate(&cert) {
                Ok(info) => info,
                Err(e) => {
                    warn!(error = %e, id = %cert.id, "skipping unparseable certificate");
                    continue;
                }
            };

            if !info.expires_within_days(now, RENEWAL_WINDOW_DAYS) {
                continue;
            }

            if info.is_expired_at(now) && !self.store.is_certificate_in_use(&cert.id)? {
                debug!(id = %cert.id, "removing expired, unreferenced certificate");
                self.store.remove_certificate_by_id(&cert.id)?;
                outcome.removed += 1;
                continue;
            }

            info!(id = %cert.id, domains = ?cert.domains, "certificate inside renewal window");
            match self.obtain_for_domains(&cert.domains, cert.challenge_type) {
                Ok(()) => outcome.renewed += 1,
                Err(e) => {
                    warn!(error = %e, id = %cert.id, "failed to schedule renewal");
                }
            }
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcgen::{CertificateParams, KeyPair};

    fn test_manager(email: &str) -> CertificateManager {
        let store = Store::open_in_memory().unwrap();
        CertificateManager::new(
            store,
            AcmeSettings {
                email: email.to_string(),
                directory_url: "https://acme.invalid/directory".to_string(),
                insecure: false,
            },
        )
    }

    fn self_signed(id: &str, domain: &str, valid_for: time::Duration) -> Certificate {
        let key_pair = KeyPair::generate().unwrap();
        let mut params = CertificateParams::new(vec![domain.to_string()]).unwrap();
        params.not_before = OffsetDateTime::now_utc() - time::Duration::hours(1);
        params.not_after = OffsetDateTime::now_utc() + valid_for;
        let cert = params.self_signed(&key_pair).unwrap();

        Certificate::from_pem(
            id.to_string(),
            cert.pem().as_bytes(),
            key_pair.serialize_pem().as_bytes(),
            ChallengeType::Http01,
            vec![domain.to_string()],
        )
    }

    #[test]
    fn authorize_requires_matching_token() {
        let manager = test_manager("a@b.test");
        manager.present("www.example.com", "tok", "tok.auth").unwrap();

        assert_eq!(
            manager.authorize("www.example.com", "tok").unwrap(),
            "tok.auth"
        );
        assert!(matches!(
            manager.authorize("www.example.com", "wrong"),
            Err(CertError::InvalidToken)
        ));
        assert!(matches!(
            manager.authorize("other.example.com", "tok"),
            Err(CertError::NoChallenge)
        ));
    }

    #[test]
    fn cleanup_is_conditional() {
        let manager = test_manager("a@b.test");
        manager.present("www.example.com", "tok", "auth").unwrap();

        // A stale cleanup leaves the live challenge untouched.
        manager.cleanup("www.example.com", "tok", "stale").unwrap();
        assert!(manager.authorize("www.example.com", "tok").is_ok());

        manager.cleanup("www.example.com", "tok", "auth").unwrap();
        assert!(manager.authorize("www.example.com", "tok").is_err());
    }

    #[tokio::test]
    async fn obtain_skips_none_challenge() {
        let manager = test_manager("a@b.test");
        let domains = vec!["www.example.com".to_string()];
        manager
            .obtain_for_domains(&domains, ChallengeType::None)
            .unwrap();
        // Nothing was scheduled, so no challenge record appears.
        assert!(manager.authorize("www.example.com", "any").is_err());
    }

    #[tokio::test]
    async fn obtain_rejects_unsupported_challenges() {
        let manager = test_manager("a@b.test");
        let domains = vec!["www.example.com".to_string()];

        assert!(matches!(
            manager.obtain_for_domains(&domains, ChallengeType::Dns01),
            Err(CertError::UnsupportedChallenge(ChallengeType::Dns01))
        ));
        assert!(matches!(
            manager.obtain_for_domains(&domains, ChallengeType::TlsAlpn01),
            Err(CertError::UnsupportedChallenge(ChallengeType::TlsAlpn01))
        ));
    }

    #[tokio::test]
    async fn obtain_requires_email() {
        let manager = test_manager("");
        let domains = vec!["www.example.com".to_string()];
        assert!(matches!(
            manager.obtain_for_domains(&domains, ChallengeType::Http01),
            Err(CertError::EmailNotConfigured)
        ));
    }

    #[tokio::test]
    async fn obtain_skips_inflight_domains() {
        let manager = test_manager("a@b.test");
        manager.present("www.example.com", "tok", "auth").unwrap();

        // Every domain already has a challenge, so this is a no-op success.
        let domains = vec!["www.example.com".to_string()];
        manager
            .obtain_for_domains(&domains, ChallengeType::Http01)
            .unwrap();
    }

    #[tokio::test]
    async fn obtain_empty_domains_is_noop() {
        let manager = test_manager("a@b.test");
        manager.obtain_for_domains(&[], ChallengeType::Http01).unwrap();
    }

    #[test]
    fn lookup_by_domain() {
        let manager = test_manager("a@b.test");
        let cert = self_signed("id-1", "www.example.com", time::Duration::days(90));
        manager.store.save_certificate(&cert).unwrap();

        assert_eq!(manager.get("www.example.com"), Some(cert));
        assert!(manager.get("unknown.test").is_none());
        assert_eq!(manager.get_all().len(), 1);
    }

    #[test]
    fn valid_certificate_checks() {
        let manager = test_manager("a@b.test");
        let good = self_signed("id-1", "good.test", time::Duration::days(90));
        let expired = self_signed("id-2", "old.test", -time::Duration::days(1));
        manager.store.save_certificate(&good).unwrap();
        manager.store.save_certificate(&expired).unwrap();

        assert!(manager.has_valid_certificate(&["good.test".to_string()]));
        assert!(!manager.has_valid_certificate(&["old.test".to_string()]));
        assert!(!manager.has_valid_certificate(&["missing.test".to_string()]));
        // One bad domain poisons the whole set.
        assert!(!manager
            .has_valid_certificate(&["good.test".to_string(), "old.test".to_string()]));
    }

    #[tokio::test]
    async fn batch_removes_expired_unreferenced() {
        let manager = test_manager("a@b.test");

        // id-1 expired; its mapping was taken over by id-2.
        let old = self_signed("id-1", "www.example.com", -time::Duration::days(2));
        let current = self_signed("id-2", "www.example.com", time::Duration::days(90));
        manager.store.save_certificate(&old).unwrap();
        manager.store.save_certificate(&current).unwrap();

        let outcome = manager.batch().unwrap();
        assert_eq!(outcome.removed, 1);
        assert!(manager.store.get_certificate_by_id("id-1").unwrap().is_none());
        assert!(manager.store.get_certificate_by_id("id-2").unwrap().is_some());
    }

    #[tokio::test]
    async fn batch_leaves_healthy_certificates_alone() {
        let manager = test_manager("a@b.test");
        let cert = self_signed("id-1", "www.example.com", time::Duration::days(90));
        manager.store.save_certificate(&cert).unwrap();

        let outcome = manager.batch().unwrap();
        assert_eq!(outcome, BatchOutcome::default());
        assert!(manager.store.get_certificate_by_id("id-1").unwrap().is_some());
    }

    #[tokio::test]
    async fn batch_schedules_renewal_inside_window() {
        let manager = test_manager("a@b.test");
        let soon = self_signed("id-1", "www.example.com", time::Duration::days(10));
        manager.store.save_certificate(&soon).unwrap();

        let outcome = manager.batch().unwrap();
        assert_eq!(outcome.renewed, 1);
        assert_eq!(outcome.removed, 0);
        // Still present until the background renewal replaces it.
        assert!(manager.store.get_certificate_by_id("id-1").unwrap().is_some());
    }
}
