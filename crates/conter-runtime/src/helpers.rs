//! Label, port, and unit helpers for the Docker adapter.

use std::collections::{BTreeMap, HashMap};
use std::net::TcpListener;

use conter_core::{Service, APPLICATION_NAME};

pub const LABEL_MANAGED_BY: &str = "conter.managed";
pub const LABEL_HASH: &str = "conter.hash";
pub const LABEL_NAME: &str = "conter.name";
pub const LABEL_PROJECT: &str = "conter.project";

/// Host port pool reserved for published container ports.
pub const PORT_START_RANGE: u16 = 30000;
pub const PORT_END_RANGE: u16 = 35000;

/// Labels put on every object created through the runtime adapter.
pub fn default_labels() -> HashMap<String, String> {
    HashMap::from([(LABEL_MANAGED_BY.to_string(), APPLICATION_NAME.to_string())])
}

/// Labels identifying a specific service's container and volumes.
pub fn service_labels(service: &Service) -> HashMap<String, String> {
    let mut labels = default_labels();
    labels.insert(LABEL_HASH.to_string(), service.hash.clone());
    labels.insert(LABEL_NAME.to_string(), service.name.clone());
    labels.insert(
        LABEL_PROJECT.to_string(),
        service.ingress.target_project.clone(),
    );
    labels
}

/// Filter matching every container managed by conter for the given project.
pub fn project_filter(project: &str) -> HashMap<String, Vec<String>> {
    HashMap::from([(
        "label".to_string(),
        vec![
            format!("{LABEL_PROJECT}={project}"),
            format!("{LABEL_MANAGED_BY}={APPLICATION_NAME}"),
        ],
    )])
}

/// Flatten an environment map into `K=V` strings.
pub fn transform_environment(env: &BTreeMap<String, String>) -> Vec<String> {
    env.iter().map(|(k, v)| format!("{k}={v}")).collect()
}

/// Runtime volume name for a service's logical volume.
pub fn volume_name(project: &str, service: &str, logical: &str) -> String {
    format!("{project}.{service}-{logical}")
}

/// Find the next free port within the range by attempting to bind it on
/// loopback. Returns 0 when the range is exhausted.
pub fn get_available_port(start: u16, end: u16) -> u16 {
    for port in start..=end {
        if TcpListener::bind(("127.0.0.1", port)).is_ok() {
            // The listener drops here, freeing the port for the container.
            return port;
        }
    }
    0
}

/// Convert decimal megabytes to bytes.
pub fn to_bytes(mb: u64) -> i64 {
    (mb * 1000 * 1000) as i64
}
