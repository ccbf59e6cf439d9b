//! Client-side project manifest format.
//!
//! This is the document operators write and feed to the CLI. It keeps the
//! historical single-domain ingress block and the lowercase challenge names;
//! the management API works with the widened multi-domain request format
//! instead. The two are distinct formats and never coerced silently.

use std::collections::BTreeMap;
use std::io::Read;

use serde::{Deserialize, Serialize};

/// A declarative project description.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub name: String,
    #[serde(default)]
    pub services: Vec<Service>,
}

/// A single service entry within a manifest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Service {
    pub name: String,
    pub source: Source,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
    #[serde(default)]
    pub ingress: Option<Ingress>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Source {
    #[serde(rename = "type")]
    pub kind: String,
    pub uri: String,
}

/// Public exposure block for a manifest service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ingress {
    pub domain: String,
    #[serde(default)]
    pub container_port: u16,
    #[serde(default)]
    pub ssl_challenge: Option<ChallengeType>,
}

/// ACME challenge selector as written in manifests.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeType {
    Http01,
    Dns01,
}

/// Read and parse a manifest document.
pub fn parse<R: Read>(reader: R) -> Result<Project, serde_json::Error> {
    serde_json::from_reader(reader)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_manifest() {
        let data = r#"{
            "name": "my-project",
            "services": [
                {
                    "name": "website",
                    "source": {
                        "type": "git",
                        "uri": "git@github.com/user/website.git"
                    },
                    "environment": {
                        "ENV_VAR": "one",
                        "ANOTHER_VAR": "two"
                    },
                    "ingress": {
                        "domain": "www.example.com",
                        "container_port": 80,
                        "ssl_challenge": "http01"
                    }
                },
                {
                    "name": "database",
                    "source": {
                        "type": "docker",
                        "uri": "postgresql:latest"
                    }
                }
            ]
        }"#;

        let project = parse(data.as_bytes()).unwrap();

        assert_eq!(project.name, "my-project");
        assert_eq!(project.services.len(), 2);

        let website = &project.services[0];
        assert_eq!(website.name, "website");
        assert_eq!(website.source.kind, "git");
        assert_eq!(website.source.uri, "git@github.com/user/website.git");
        assert_eq!(website.environment["ENV_VAR"], "one");
        assert_eq!(website.environment["ANOTHER_VAR"], "two");

        let ingress = website.ingress.as_ref().unwrap();
        assert_eq!(ingress.domain, "www.example.com");
        assert_eq!(ingress.container_port, 80);
        assert_eq!(ingress.ssl_challenge, Some(ChallengeType::Http01));

        let database = &project.services[1];
        assert_eq!(database.name, "database");
        assert_eq!(database.source.kind, "docker");
        assert_eq!(database.source.uri, "postgresql:latest");
        assert!(database.ingress.is_none());
    }

    #[test]
    fn parse_rejects_unknown_challenge() {
        let data = r#"{
            "name": "p",
            "services": [{
                "name": "s",
                "source": {"type": "docker", "uri": "nginx"},
                "ingress": {"domain": "x.test", "ssl_challenge": "tlsalpn01"}
            }]
        }"#;

        assert!(parse(data.as_bytes()).is_err());
    }

    #[test]
    fn parse_minimal() {
        let data = r#"{"name": "tiny", "services": []}"#;
        let project = parse(data.as_bytes()).unwrap();
        assert_eq!(project.name, "tiny");
        assert!(project.services.is_empty());
    }
}
