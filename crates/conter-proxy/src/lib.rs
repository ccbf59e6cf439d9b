//! conter-proxy — public ingress for deployed services.
//!
//! # Components
//!
//! - **`router`** — store-backed {domain → backend} dispatch with ownership
//!   validation and pruning
//! - **`server`** — the plaintext and TLS listeners: ACME challenge
//!   answering, HTTPS redirect, and the reverse proxy data path
//! - **`tls`** — SNI certificate resolution with a self-signed fallback
//! - **`util`** — host and path helpers shared by the listeners

pub mod router;
pub mod server;
pub mod tls;
pub mod util;

use thiserror::Error;

pub use router::IngressRouter;
pub use server::ProxyServer;

/// Result type alias for ingress operations.
pub type IngressResult<T> = Result<T, IngressError>;

#[derive(Debug, Error)]
pub enum IngressError {
    #[error("domain {domain} is already in use by project={project} service={service}")]
    Conflict {
        domain: String,
        project: String,
        service: String,
    },

    #[error(transparent)]
    Store(#[from] conter_state::StoreError),
}
