//! conter-state — embedded state store for conter.
//!
//! Backed by [redb](https://docs.rs/redb), holds everything the daemon
//! persists: project service lists, ingress routes, ACME challenges,
//! certificates and their domain mappings, and the configuration bucket.
//!
//! All domain types are JSON-serialized into redb's `&[u8]` value columns.
//! Every mutation runs in a single write transaction, so multi-key updates
//! (an ingress record under each of its domains, a certificate plus its
//! mappings) are atomic. The `Store` is `Clone` + `Send` + `Sync` (backed by
//! `Arc<Database>`) and can be shared across async tasks.

pub mod error;
pub mod store;
pub mod tables;

pub use error::{StoreError, StoreResult};
pub use store::Store;
