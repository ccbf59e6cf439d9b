//! Service configuration fingerprinting.
//!
//! The hash decides whether a running container still matches its declared
//! service. It covers source, environment, container port, quota, and
//! volumes — the service name is deliberately excluded so renaming a service
//! never forces a rebuild.

use crate::types::Service;

/// Compute the configuration hash for a service.
///
/// Each component is JSON-encoded on its own line before hashing. Map fields
/// are `BTreeMap`s, so the encoding is stable across runs. Volumes only
/// contribute when present, which keeps hashes stable for services predating
/// volume support.
pub fn config_hash(service: &Service) -> String {
    let mut buf = Vec::new();
    encode_component(&mut buf, &service.source);
    encode_component(&mut buf, &service.environment);
    encode_component(&mut buf, &service.ingress.container_port);
    encode_component(&mut buf, &service.quota);
    if !service.volumes.is_empty() {
        encode_component(&mut buf, &service.volumes);
    }

    format!("{:x}", md5::compute(&buf))
}

fn encode_component<T: serde::Serialize>(buf: &mut Vec<u8>, value: &T) {
    // Serialization of these fixed shapes cannot fail.
    serde_json::to_writer(&mut *buf, value).expect("encode hash component");
    buf.push(b'\n');
}
