//! redb table definitions for the conter state store.
//!
//! Each table uses `&str` keys and `&[u8]` values (JSON-serialized domain
//! types).

use redb::TableDefinition;

/// Service lists keyed by project name.
pub const PROJECTS: TableDefinition<&str, &[u8]> = TableDefinition::new("projects");

/// Ingress records keyed by domain. A multi-domain ingress is stored once
/// per domain, every key holding the same record.
pub const ROUTES: TableDefinition<&str, &[u8]> = TableDefinition::new("routes");

/// Daemon-level configuration values (ACME account state) keyed by name.
pub const CONFIG: TableDefinition<&str, &[u8]> = TableDefinition::new("config");

/// Pending ACME HTTP-01 challenges keyed by domain.
pub const CHALLENGES: TableDefinition<&str, &[u8]> = TableDefinition::new("challenges");

/// Certificate bundles keyed by certificate id (UUID).
pub const CERTIFICATES: TableDefinition<&str, &[u8]> = TableDefinition::new("certificates");

/// Domain → certificate id lookup.
pub const CERTIFICATE_MAPPINGS: TableDefinition<&str, &[u8]> =
    TableDefinition::new("certificate-mappings");
