//! Wire types exchanged with the management API.
//!
//! These mirror the server's JSON shapes from the client side, plus the
//! widening of a manifest document into an apply command (single-domain
//! manifest ingress blocks become domain lists at the API boundary).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use conter_core::{manifest, ChallengeType};

/// POST /api/projects request body.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProjectApplyCommand {
    pub project_name: String,
    pub services: Vec<ServiceApplyCommand>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ServiceApplyCommand {
    pub name: String,
    pub source: SourceCommand,
    pub environment: BTreeMap<String, String>,
    pub ingress_domains: Vec<String>,
    pub container_port: u16,
    pub challenge_type: ChallengeType,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SourceCommand {
    #[serde(rename = "type")]
    pub kind: String,
    pub uri: String,
}

/// Entry of GET /api/projects.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectSummary {
    pub name: String,
    pub running: bool,
    pub services: Vec<String>,
}

/// GET /api/projects/{name} and POST /api/projects response.
#[derive(Debug, Clone, Deserialize)]
pub struct Project {
    pub project: String,
    pub services: Vec<ServiceDetail>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceDetail {
    pub name: String,
    pub hash: String,
    pub status: String,
    #[serde(default)]
    pub ingress: Option<IngressDetail>,
    #[serde(default)]
    pub volumes: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngressDetail {
    pub domains: Vec<String>,
    pub internal: String,
    pub challenge: String,
}

/// Entry of GET /api/certificates.
#[derive(Debug, Clone, Deserialize)]
pub struct CertificateSummary {
    pub id: String,
    pub domains: Vec<String>,
    pub challenge: String,
    #[serde(default)]
    pub meta: Option<CertificateMeta>,
}

/// GET /api/certificates/{domain} response.
#[derive(Debug, Clone, Deserialize)]
pub struct CertificateDetail {
    pub domain: String,
    pub challenge: String,
    pub pem: String,
    #[serde(default)]
    pub meta: Option<CertificateMeta>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CertificateMeta {
    pub subject: String,
    pub issuer: String,
    pub since: String,
    pub expiry: String,
    pub serial: String,
    pub signature_algorithm: String,
    pub public_algorithm: String,
}

/// GET /api/system/{task} response.
#[derive(Debug, Clone, Deserialize)]
pub struct SystemTaskOutcome {
    pub task: String,
    pub renewed: usize,
    pub removed: usize,
}

/// Widen a manifest document into an apply command.
pub fn command_from_manifest(project: &manifest::Project) -> ProjectApplyCommand {
    ProjectApplyCommand {
        project_name: project.name.clone(),
        services: project
            .services
            .iter()
            .map(|service| {
                let ingress = service.ingress.as_ref();
                ServiceApplyCommand {
                    name: service.name.clone(),
                    source: SourceCommand {
                        kind: service.source.kind.clone(),
                        uri: service.source.uri.clone(),
                    },
                    environment: service.environment.clone(),
                    ingress_domains: ingress
                        .map(|i| vec![i.domain.clone()])
                        .unwrap_or_default(),
                    container_port: ingress.map(|i| i.container_port).unwrap_or(0),
                    challenge_type: match ingress.and_then(|i| i.ssl_challenge) {
                        Some(manifest::ChallengeType::Http01) => ChallengeType::Http01,
                        Some(manifest::ChallengeType::Dns01) => ChallengeType::Dns01,
                        None => ChallengeType::None,
                    },
                }
            })
            .collect(),
    }
}
