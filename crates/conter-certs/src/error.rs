//! Error types for certificate management.

use conter_core::ChallengeType;
use thiserror::Error;

pub type CertResult<T> = Result<T, CertError>;

#[derive(Debug, Error)]
pub enum CertError {
    #[error("ACME email is not configured")]
    EmailNotConfigured,

    #[error("challenge type {0} is not supported")]
    UnsupportedChallenge(ChallengeType),

    #[error("no challenge available")]
    NoChallenge,

    #[error("invalid token")]
    InvalidToken,

    #[error("no HTTP-01 challenge offered for {0}")]
    MissingHttp01(String),

    #[error("order for [{domains}] ended in state {status}")]
    OrderFailed { domains: String, status: String },

    #[error("timed out waiting for order to become ready")]
    OrderTimeout,

    #[error("certificate is not valid PEM: {0}")]
    InvalidPem(String),

    #[error("certificate cannot be parsed: {0}")]
    InvalidCertificate(String),

    #[error("ACME error: {0}")]
    Acme(#[from] instant_acme::Error),

    #[error("CSR generation failed: {0}")]
    Csr(#[from] rcgen::Error),

    #[error(transparent)]
    Store(#[from] conter_state::StoreError),
}
