//! Request validation.
//!
//! Validation is total: every rule is checked and all failures are collected
//! into a single field → reason map before returning.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use conter_core::{ChallengeType, SOURCE_DOCKER};

use crate::reconciler::ApplyProjectRequest;

/// Collected validation failures, keyed by the offending field path.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ValidationError {
    pub reasons: BTreeMap<String, String>,
}

impl ValidationError {
    pub fn append(&mut self, field: impl Into<String>, reason: impl Into<String>) {
        self.reasons.insert(field.into(), reason.into());
    }

    pub fn has_failures(&self) -> bool {
        !self.reasons.is_empty()
    }

    fn into_result(self) -> Result<(), ValidationError> {
        if self.has_failures() {
            Err(self)
        } else {
            Ok(())
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, reason) in &self.reasons {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{field}: {reason}")?;
            first = false;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

impl ApplyProjectRequest {
    /// Validate the request, collecting every failure.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut err = ValidationError::default();

        if self.project_name.is_empty() {
            err.append("project_name", "Project name is required");
        }

        if self.services.is_empty() {
            err.append("services", "At least one service is required");
            return err.into_result();
        }

        for (i, service) in self.services.iter().enumerate() {
            let prefix = format!("services[{i}].");

            if service.name.is_empty() {
                err.append(format!("{prefix}name"), "Service name is required");
            }

            if service.source.kind.is_empty() {
                err.append(format!("{prefix}source.type"), "Source type is required");
            } else if service.source.kind != SOURCE_DOCKER {
                err.append(
                    format!("{prefix}source.type"),
                    format!("Source type={} is not supported", service.source.kind),
                );
            }

            if service.source.uri.is_empty() {
                err.append(format!("{prefix}source.uri"), "Source URI is required");
            }

            if !service.ingress_domains.is_empty() {
                // The service is meant to be exposed.
                if service.challenge_type != ChallengeType::Http01
                    && service.challenge_type != ChallengeType::None
                {
                    err.append(
                        format!("{prefix}challenge_type"),
                        format!(
                            "Challenge type={} is not supported",
                            service.challenge_type
                        ),
                    );
                }
                if service.container_port == 0 {
                    err.append(
                        format!("{prefix}container_port"),
                        "A valid container port is required to expose a service",
                    );
                }
            }

            if service.quota.memory_mb > 0 && service.quota.memory_mb < 128 {
                err.append(
                    format!("{prefix}quota.memory_mb"),
                    "The minimum memory limit is 128MB",
                );
            }

            for (j, volume) in service.volumes.iter().enumerate() {
                let volume_prefix = format!("{prefix}volumes[{j}].");

                if volume.name.is_empty() {
                    err.append(format!("{volume_prefix}name"), "Volume name is required");
                } else if volume.name.contains(char::is_whitespace) {
                    err.append(
                        format!("{volume_prefix}name"),
                        "Volume name must not contain whitespace",
                    );
                }

                if volume.path.is_empty() {
                    err.append(format!("{volume_prefix}path"), "Volume path is required");
                } else if !volume.path.starts_with('/') {
                    err.append(
                        format!("{volume_prefix}path"),
                        "Volume path must be absolute",
                    );
                }
            }
        }

        err.into_result()
    }
}
