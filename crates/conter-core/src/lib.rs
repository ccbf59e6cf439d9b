//! conter-core — domain types shared across the conter workspace.
//!
//! Contains the persisted service/ingress/certificate records, the
//! configuration hash used for container change detection, the client-side
//! manifest format, and the daemon configuration file parser.

pub mod config;
pub mod hash;
pub mod manifest;
pub mod types;

pub use config::Config;
pub use hash::config_hash;
pub use types::*;

/// Application name used for container labels and the proxy `Server` header.
pub const APPLICATION_NAME: &str = "conter";

/// Crate version reported by the daemon and stamped on proxied responses.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
