//! SNI certificate resolution for the HTTPS listener.
//!
//! Certificates come from the store via the certificate manager. When a
//! hostname has no issued certificate yet, a short-lived self-signed one is
//! synthesized so the handshake completes and the operator sees a browser
//! warning instead of a reset connection. The fallback issuer name makes it
//! unmistakable in monitoring.

use std::sync::Arc;

use rcgen::{CertificateParams, DnType, KeyPair};
use rustls::crypto::ring::sign::any_supported_type;
use rustls::pki_types::PrivateKeyDer;
use rustls::server::{ClientHello, ResolvesServerCert};
use rustls::sign::CertifiedKey;
use time::OffsetDateTime;
use tracing::{debug, trace, warn};

use conter_certs::CertificateManager;
use conter_core::Certificate;

/// Validity of synthesized fallback certificates.
const SELF_SIGNED_VALIDITY_HOURS: i64 = 24;

/// Resolves the TLS certificate for a handshake by SNI server name.
pub struct SniCertResolver {
    certs: CertificateManager,
}

impl std::fmt::Debug for SniCertResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SniCertResolver").finish_non_exhaustive()
    }
}

impl SniCertResolver {
    pub fn new(certs: CertificateManager) -> Self {
        Self { certs }
    }

    /// Build the rustls server configuration for the HTTPS listener.
    /// Minimum protocol version is TLS 1.2.
    pub fn server_config(certs: CertificateManager) -> Arc<rustls::ServerConfig> {
        let config = rustls::ServerConfig::builder_with_protocol_versions(&[
            &rustls::version::TLS12,
            &rustls::version::TLS13,
        ])
        .with_no_client_auth()
        .with_cert_resolver(Arc::new(SniCertResolver::new(certs)));
        Arc::new(config)
    }
}

impl ResolvesServerCert for SniCertResolver {
    fn resolve(&self, client_hello: ClientHello<'_>) -> Option<Arc<CertifiedKey>> {
        // Without SNI there is no way to pick a certificate.
        let server_name = client_hello.server_name()?;

        if let Some(cert) = self.certs.get(server_name) {
            match certified_key_from_stored(&cert) {
                Ok(key) => {
                    trace!(domain = %server_name, "serving stored certificate");
                    return Some(Arc::new(key));
                }
                Err(e) => {
                    warn!(error = %e, domain = %server_name, "stored certificate unusable, falling back to self-signed");
                }
            }
        }

        match self_signed_certified_key(server_name) {
            Ok(key) => {
                debug!(domain = %server_name, "no certificate available, generated temporary self-signed certificate");
                Some(Arc::new(key))
            }
            Err(e) => {
                warn!(error = %e, domain = %server_name, "failed to generate self-signed certificate");
                None
            }
        }
    }
}

/// Convert a stored certificate bundle into a rustls `CertifiedKey`.
pub fn certified_key_from_stored(cert: &Certificate) -> Result<CertifiedKey, String> {
    let chain_pem = cert.certificate_bytes().map_err(|e| e.to_string())?;
    let key_pem = cert.private_key_bytes().map_err(|e| e.to_string())?;

    let chain = rustls_pemfile::certs(&mut chain_pem.as_slice())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| e.to_string())?;
    if chain.is_empty() {
        return Err("certificate bundle holds no PEM certificates".to_string());
    }

    let key = rustls_pemfile::private_key(&mut key_pem.as_slice())
        .map_err(|e| e.to_string())?
        .ok_or_else(|| "certificate bundle holds no private key".to_string())?;

    let signing_key = any_supported_type(&key).map_err(|e| e.to_string())?;
    Ok(CertifiedKey::new(chain, signing_key))
}

/// Synthesize a short-lived EC P-256 certificate for the requested name.
fn self_signed_certified_key(domain: &str) -> Result<CertifiedKey, String> {
    let key_pair = KeyPair::generate().map_err(|e| e.to_string())?;

    let mut params =
        CertificateParams::new(vec![domain.to_string()]).map_err(|e| e.to_string())?;
    params
        .distinguished_name
        .push(DnType::CommonName, domain);
    params.not_before = OffsetDateTime::now_utc();
    params.not_after =
        OffsetDateTime::now_utc() + time::Duration::hours(SELF_SIGNED_VALIDITY_HOURS);

    let cert = params.self_signed(&key_pair).map_err(|e| e.to_string())?;

    let key_der = PrivateKeyDer::try_from(key_pair.serialize_der()).map_err(|e| e.to_string())?;
    let signing_key = any_supported_type(&key_der).map_err(|e| e.to_string())?;

    Ok(CertifiedKey::new(vec![cert.der().clone()], signing_key))
}
