//! HTTP client for the conter management API.

use bytes::Bytes;
use http::header::{ACCEPT, CONTENT_TYPE, USER_AGENT};
use http::{Method, Request, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use serde::de::DeserializeOwned;
use thiserror::Error;

use conter_core::{APPLICATION_NAME, VERSION};

use crate::types::*;

/// Default management address when `CONTER_HOST` is not set.
pub const DEFAULT_HOST: &str = "127.0.0.1:6440";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Transport(#[from] hyper_util::client::legacy::Error),

    #[error("invalid request: {0}")]
    Request(#[from] http::Error),

    #[error("failed to read response: {0}")]
    Body(#[from] hyper::Error),

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("{message} (status={status})")]
    Status { status: u16, message: String },
}

/// Error body returned by the management API.
#[derive(serde::Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: String,
}

/// Client for the loopback management API.
pub struct ApiClient {
    base: String,
    http: Client<HttpConnector, Full<Bytes>>,
}

impl ApiClient {
    /// Create a client for the given `host:port` management address.
    pub fn new(host: &str) -> Self {
        ApiClient {
            base: format!("http://{host}"),
            http: Client::builder(TokioExecutor::new()).build_http(),
        }
    }

    /// Create a client from the environment (`CONTER_HOST`), falling back to
    /// the default loopback address.
    pub fn from_env() -> Self {
        let host = std::env::var("CONTER_HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());
        Self::new(&host)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> Result<Option<T>, ClientError> {
        let request = Request::builder()
            .method(method)
            .uri(format!("{}{path}", self.base))
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, format!("{APPLICATION_NAME}/{VERSION}"))
            .body(Full::new(Bytes::from(body.unwrap_or_default())))?;

        let response = self.http.request(request).await?;
        let status = response.status();
        let bytes = response.into_body().collect().await?.to_bytes();

        check_response(status, &bytes)?;

        if bytes.is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.send(Method::GET, path, None).await?.ok_or_else(|| {
            ClientError::Status {
                status: 200,
                message: "empty response".to_string(),
            }
        })
    }

    // ── Projects ───────────────────────────────────────────────────

    pub async fn project_list(&self) -> Result<Vec<ProjectSummary>, ClientError> {
        self.get("/api/projects").await
    }

    pub async fn project_inspect(&self, name: &str) -> Result<Project, ClientError> {
        self.get(&format!("/api/projects/{name}")).await
    }

    pub async fn project_apply(
        &self,
        command: &ProjectApplyCommand,
    ) -> Result<Project, ClientError> {
        let body = serde_json::to_vec(command)?;
        self.send(Method::POST, "/api/projects", Some(body))
            .await?
            .ok_or_else(|| ClientError::Status {
                status: 201,
                message: "empty response".to_string(),
            })
    }

    pub async fn project_remove(&self, name: &str) -> Result<(), ClientError> {
        self.send::<serde_json::Value>(Method::DELETE, &format!("/api/projects/{name}"), None)
            .await?;
        Ok(())
    }

    // ── Certificates ───────────────────────────────────────────────

    pub async fn certificate_list(&self) -> Result<Vec<CertificateSummary>, ClientError> {
        self.get("/api/certificates").await
    }

    pub async fn certificate_inspect(
        &self,
        domain: &str,
    ) -> Result<CertificateDetail, ClientError> {
        self.get(&format!("/api/certificates/{domain}")).await
    }

    pub async fn certificate_renew(&self, domain: &str) -> Result<(), ClientError> {
        self.send::<serde_json::Value>(
            Method::POST,
            &format!("/api/certificates/{domain}/renew"),
            None,
        )
        .await?;
        Ok(())
    }

    // ── System ─────────────────────────────────────────────────────

    pub async fn system_task(&self, task: &str) -> Result<SystemTaskOutcome, ClientError> {
        self.get(&format!("/api/system/{task}")).await
    }
}

/// Turn a non-success response into a typed error. The body's `error` field
/// is used when it decodes; otherwise the raw body stands in.
fn check_response(status: StatusCode, body: &[u8]) -> Result<(), ClientError> {
    if status.is_success() {
        return Ok(());
    }

    let message = match serde_json::from_slice::<ErrorBody>(body) {
        Ok(parsed) if !parsed.error.is_empty() => parsed.error,
        _ => String::from_utf8_lossy(body).into_owned(),
    };

    Err(ClientError::Status {
        status: status.as_u16(),
        message,
    })
}
