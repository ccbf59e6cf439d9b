//! X.509 inspection of stored certificate bundles.

use x509_parser::prelude::*;
use ::time::OffsetDateTime;

use conter_core::Certificate;

use crate::error::{CertError, CertResult};

/// Parsed metadata of the leaf certificate in a stored bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateInfo {
    pub subject: String,
    pub issuer: String,
    pub serial: String,
    pub not_before: OffsetDateTime,
    pub not_after: OffsetDateTime,
    pub signature_algorithm: String,
    pub public_key_algorithm: String,
}

impl CertificateInfo {
    /// Whether the certificate has expired at the given instant.
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        now > self.not_after
    }

    /// Whether the certificate expires within the given number of days (or
    /// already has).
    pub fn expires_within_days(&self, now: OffsetDateTime, days: i64) -> bool {
        self.not_after - now < ::time::Duration::days(days)
    }
}

/// Parse the first certificate of the bundle.
pub fn parse_certificate(cert: &Certificate) -> CertResult<CertificateInfo> {
    let raw = cert
        .certificate_bytes()
        .map_err(|e| CertError::InvalidPem(e.to_string()))?;

    let block = ::pem::parse(&raw).map_err(|e| CertError::InvalidPem(e.to_string()))?;
    if block.tag() != "CERTIFICATE" {
        return Err(CertError::InvalidPem(format!(
            "unexpected PEM block type {}",
            block.tag()
        )));
    }

    let (_, parsed) = parse_x509_certificate(block.contents())
        .map_err(|e| CertError::InvalidCertificate(e.to_string()))?;

    Ok(CertificateInfo {
        subject: parsed.subject().to_string(),
        issuer: parsed.issuer().to_string(),
        serial: parsed.raw_serial_as_string(),
        not_before: parsed.validity().not_before.to_datetime(),
        not_after: parsed.validity().not_after.to_datetime(),
        signature_algorithm: parsed.signature_algorithm.algorithm.to_id_string(),
        public_key_algorithm: parsed
            .public_key()
            .algorithm
            .algorithm
            .to_id_string(),
    })
}
