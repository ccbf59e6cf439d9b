//! conter-certs — ACME certificate lifecycle management.
//!
//! Owns the ACME account and every certificate the system knows about:
//!
//! - account registration and rotation against a configurable directory
//! - asynchronous certificate obtain/renewal via HTTP-01 challenges
//! - the store-backed challenge provider the ingress proxy serves from
//! - expiry inspection and the 30-day batch renewal sweep
//!
//! # Challenge flow
//!
//! 1. An obtain task creates an order and receives one challenge per domain
//! 2. Each challenge's key authorization is persisted into the store
//! 3. The CA fetches `/.well-known/acme-challenge/<token>` through the
//!    ingress proxy, which answers from the store
//! 4. Once the order turns ready the task finalizes with a fresh CSR and
//!    persists the issued bundle under a new UUID
//! 5. Challenges are cleaned up conditionally so a concurrent re-present is
//!    never clobbered

pub mod account;
pub mod error;
pub mod info;
pub mod manager;

pub use account::AcmeSettings;
pub use error::{CertError, CertResult};
pub use info::CertificateInfo;
pub use manager::{BatchOutcome, CertificateManager};

/// Renew certificates whose expiry is within this window.
pub const RENEWAL_WINDOW_DAYS: i64 = 30;
