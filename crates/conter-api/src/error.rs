//! API error mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use conter_deploy::{DeployError, ValidationError};

/// Error surface of the management API.
#[derive(Debug)]
pub enum ApiError {
    /// Structured request validation failure.
    Validation(ValidationError),
    /// Requested record does not exist.
    NotFound(String),
    /// Domain ownership conflict.
    Conflict(String),
    /// A collaborator (runtime, ACME, source build) failed.
    Upstream(String),
    /// Store or other internal failure.
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<std::collections::BTreeMap<String, String>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Validation(err) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    error: "validation failed".to_string(),
                    fields: Some(err.reasons),
                },
            ),
            ApiError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                ErrorBody {
                    error: msg,
                    fields: None,
                },
            ),
            ApiError::Conflict(msg) => (
                StatusCode::CONFLICT,
                ErrorBody {
                    error: msg,
                    fields: None,
                },
            ),
            ApiError::Upstream(msg) => (
                StatusCode::BAD_GATEWAY,
                ErrorBody {
                    error: msg,
                    fields: None,
                },
            ),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody {
                    error: msg,
                    fields: None,
                },
            ),
        };

        (status, Json(body)).into_response()
    }
}

impl From<DeployError> for ApiError {
    fn from(err: DeployError) -> Self {
        match err {
            DeployError::Validation(validation) => ApiError::Validation(validation),
            DeployError::ProjectNotFound(name) => {
                ApiError::NotFound(format!("project {name} does not exist"))
            }
            DeployError::Ingress(ingress) => match &ingress {
                conter_proxy::IngressError::Conflict { .. } => {
                    ApiError::Conflict(ingress.to_string())
                }
                _ => ApiError::Internal(ingress.to_string()),
            },
            DeployError::Runtime(e) => ApiError::Upstream(e.to_string()),
            DeployError::Source { service, reason } => ApiError::Upstream(format!(
                "failed to resolve image for service {service}: {reason}"
            )),
            DeployError::Store(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<conter_certs::CertError> for ApiError {
    fn from(err: conter_certs::CertError) -> Self {
        match err {
            conter_certs::CertError::UnsupportedChallenge(_)
            | conter_certs::CertError::EmailNotConfigured => ApiError::Upstream(err.to_string()),
            conter_certs::CertError::Store(e) => ApiError::Internal(e.to_string()),
            other => ApiError::Upstream(other.to_string()),
        }
    }
}
