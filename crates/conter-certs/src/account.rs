//! ACME account lifecycle.
//!
//! The account is a process-wide singleton persisted in the store's config
//! table. It is rotated whenever the configured email or directory URL no
//! longer matches the stored registration, and re-registered exactly once
//! when resuming from stored credentials fails.

use std::sync::Arc;

use bytes::Bytes;
use http_body_util::Full;
use instant_acme::{Account, AccountCredentials, NewAccount};
use rustls::client::danger::{
    HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier,
};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{DigitallySignedStruct, SignatureScheme};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use conter_state::Store;

use crate::error::{CertError, CertResult};

/// Config-table key holding the registered account state.
const ACCOUNT_CONFIG_KEY: &str = "acme.account";

/// Persisted account registration state.
#[derive(Debug, Serialize, Deserialize)]
struct StoredAccount {
    email: String,
    directory_url: String,
    /// Opaque `instant_acme` credentials (private key + account URL).
    credentials: serde_json::Value,
}

/// ACME directory settings taken from the daemon configuration.
#[derive(Debug, Clone)]
pub struct AcmeSettings {
    pub email: String,
    pub directory_url: String,
    /// Disable TLS verification of the directory URL (dev/test only).
    pub insecure: bool,
}

/// Resolve the ACME account, registering or rotating as needed.
///
/// Registration is persisted only after it succeeds. When stored credentials
/// cannot be resumed the account is cleared and registration retried once.
pub async fn resolve_account(store: &Store, settings: &AcmeSettings) -> CertResult<Account> {
    if settings.email.is_empty() {
        return Err(CertError::EmailNotConfigured);
    }

    if let Some(stored) = load_account(store)? {
        if stored.email == settings.email && stored.directory_url == settings.directory_url {
            match resume_account(&stored, settings).await {
                Ok(account) => {
                    debug!(email = %settings.email, "resumed ACME account from stored credentials");
                    return Ok(account);
                }
                Err(e) => {
                    warn!(error = %e, "stored ACME credentials are no longer valid, re-registering");
                    store.remove_config(ACCOUNT_CONFIG_KEY)?;
                    // Fall through to a single fresh registration.
                }
            }
        } else {
            info!(
                email = %settings.email,
                directory = %settings.directory_url,
                "ACME parameters changed, rotating account"
            );
            store.remove_config(ACCOUNT_CONFIG_KEY)?;
        }
    }

    register_account(store, settings).await
}

async fn resume_account(stored: &StoredAccount, settings: &AcmeSettings) -> CertResult<Account> {
    let credentials: AccountCredentials = serde_json::from_value(stored.credentials.clone())
        .map_err(|e| CertError::InvalidCertificate(e.to_string()))?;

    let account = if settings.insecure {
        Account::from_credentials_and_http(credentials, insecure_http_client()).await?
    } else {
        Account::from_credentials(credentials).await?
    };
    Ok(account)
}

async fn register_account(store: &Store, settings: &AcmeSettings) -> CertResult<Account> {
    info!(email = %settings.email, directory = %settings.directory_url, "registering ACME account");

    let contact = format!("mailto:{}", settings.email);
    let new_account = NewAccount {
        contact: &[&contact],
        terms_of_service_agreed: true,
        only_return_existing: false,
    };

    let (account, credentials) = if settings.insecure {
        Account::create_with_http(
            &new_account,
            &settings.directory_url,
            None,
            insecure_http_client(),
        )
        .await?
    } else {
        Account::create(&new_account, &settings.directory_url, None).await?
    };

    let stored = StoredAccount {
        email: settings.email.clone(),
        directory_url: settings.directory_url.clone(),
        credentials: serde_json::to_value(&credentials)
            .map_err(|e| CertError::InvalidCertificate(e.to_string()))?,
    };
    save_account(store, &stored)?;

    info!(email = %settings.email, "ACME account registered");
    Ok(account)
}

fn load_account(store: &Store) -> CertResult<Option<StoredAccount>> {
    match store.get_config(ACCOUNT_CONFIG_KEY)? {
        Some(raw) => {
            let stored = serde_json::from_slice(&raw)
                .map_err(|e| CertError::InvalidCertificate(e.to_string()))?;
            Ok(Some(stored))
        }
        None => Ok(None),
    }
}

fn save_account(store: &Store, stored: &StoredAccount) -> CertResult<()> {
    let raw = serde_json::to_vec(stored)
        .map_err(|e| CertError::InvalidCertificate(e.to_string()))?;
    store.set_config(ACCOUNT_CONFIG_KEY, &raw)?;
    Ok(())
}

// ── Insecure directory client ──────────────────────────────────────

/// Certificate verifier that accepts everything. Only reachable through the
/// `insecure` configuration flag, for self-hosted test directories.
#[derive(Debug)]
struct AcceptAnyServerCert {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// HTTP client for the ACME directory with TLS verification disabled.
fn insecure_http_client() -> Box<dyn instant_acme::HttpClient> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let tls = rustls::ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()
        .expect("default protocol versions")
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert { provider }))
        .with_no_client_auth();

    let connector = hyper_rustls::HttpsConnectorBuilder::new()
        .with_tls_config(tls)
        .https_or_http()
        .enable_http1()
        .enable_http2()
        .build();

    let client = hyper_util::client::legacy::Client::builder(hyper_util::rt::TokioExecutor::new())
        .build::<_, Full<Bytes>>(connector);
    Box::new(client)
}
