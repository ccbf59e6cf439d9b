//! Management API handlers.

use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use time::format_description::well_known::Rfc3339;
use tracing::{info, trace, warn};

use conter_certs::CertificateInfo;
use conter_core::{Certificate, ChallengeType, Service};
use conter_deploy::{ApplyProjectRequest, ProjectStatus, ServiceState};

use crate::error::ApiError;
use crate::ApiState;

// ── Response shapes ────────────────────────────────────────────────

#[derive(Serialize)]
pub(crate) struct ProjectResponse {
    project: String,
    services: Vec<ServiceResponse>,
}

#[derive(Serialize)]
struct ServiceResponse {
    name: String,
    hash: String,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    ingress: Option<IngressResponse>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    volumes: Vec<String>,
}

#[derive(Serialize)]
struct IngressResponse {
    domains: Vec<String>,
    internal: String,
    challenge: ChallengeType,
}

#[derive(Serialize)]
pub(crate) struct ProjectSummary {
    name: String,
    running: bool,
    services: Vec<String>,
}

#[derive(Serialize)]
pub(crate) struct CertificateSummary {
    id: String,
    domains: Vec<String>,
    challenge: ChallengeType,
    #[serde(skip_serializing_if = "Option::is_none")]
    meta: Option<CertificateMeta>,
}

#[derive(Serialize)]
pub(crate) struct CertificateDetail {
    domain: String,
    challenge: ChallengeType,
    /// Base64-encoded PEM chain, as stored.
    pem: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    meta: Option<CertificateMeta>,
}

#[derive(Serialize)]
struct CertificateMeta {
    subject: String,
    issuer: String,
    since: String,
    expiry: String,
    serial: String,
    signature_algorithm: String,
    public_algorithm: String,
}

impl CertificateMeta {
    fn from_info(info: &CertificateInfo) -> Option<Self> {
        Some(CertificateMeta {
            subject: info.subject.clone(),
            issuer: info.issuer.clone(),
            since: info.not_before.format(&Rfc3339).ok()?,
            expiry: info.not_after.format(&Rfc3339).ok()?,
            serial: info.serial.clone(),
            signature_algorithm: info.signature_algorithm.clone(),
            public_algorithm: info.public_key_algorithm.clone(),
        })
    }
}

fn service_response(service: &Service, status: &'static str) -> ServiceResponse {
    ServiceResponse {
        name: service.name.clone(),
        hash: service.hash.clone(),
        status,
        ingress: service.is_exposed().then(|| IngressResponse {
            domains: service.ingress.domains.clone(),
            internal: service.ingress.target_endpoint.clone(),
            challenge: service.ingress.challenge_type,
        }),
        volumes: service.volumes.iter().map(|v| v.path.clone()).collect(),
    }
}

fn project_response(name: &str, services: &[Service], status: Option<&ProjectStatus>) -> ProjectResponse {
    ProjectResponse {
        project: name.to_string(),
        services: services
            .iter()
            .map(|service| {
                let state = match status {
                    Some(status) => status.get_state(&service.name).as_str(),
                    // A freshly applied service is always running.
                    None => ServiceState::Running.as_str(),
                };
                service_response(service, state)
            })
            .collect(),
    }
}

fn certificate_meta(state: &ApiState, cert: &Certificate) -> Option<CertificateMeta> {
    match state.certs.inspect(cert) {
        Ok(info) => CertificateMeta::from_info(&info),
        Err(e) => {
            warn!(error = %e, id = %cert.id, "certificate metadata unavailable");
            None
        }
    }
}

// ── Projects ───────────────────────────────────────────────────────

/// POST /api/projects
pub async fn apply_project(
    State(state): State<ApiState>,
    Json(request): Json<ApplyProjectRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let applied = state.reconciler.apply_project(&request).await.map_err(|e| {
        warn!(project = %request.project_name, error = %e, "failed to apply project");
        ApiError::from(e)
    })?;

    Ok((
        StatusCode::CREATED,
        Json(project_response(&request.project_name, &applied, None)),
    ))
}

/// GET /api/projects
pub async fn list_projects(
    State(state): State<ApiState>,
) -> Result<Json<Vec<ProjectSummary>>, ApiError> {
    let projects = state.reconciler.find_all_projects()?;

    let mut summaries = Vec::with_capacity(projects.len());
    for (name, services) in projects {
        let running = state.reconciler.is_project_running(&name).await;
        summaries.push(ProjectSummary {
            name,
            running,
            services: services.iter().map(|s| s.name.clone()).collect(),
        });
    }

    Ok(Json(summaries))
}

/// GET /api/projects/{name}
pub async fn get_project(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> Result<Json<ProjectResponse>, ApiError> {
    let status = state.reconciler.get_project_status(&name).await?;
    Ok(Json(project_response(&name, &status.services, Some(&status))))
}

/// DELETE /api/projects/{name}
pub async fn delete_project(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    if !state.reconciler.project_exists(&name) {
        warn!(project = %name, "no project found to delete");
        return Err(ApiError::NotFound(format!("project {name} does not exist")));
    }

    state.reconciler.remove_project(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Certificates ───────────────────────────────────────────────────

/// GET /api/certificates
pub async fn list_certificates(
    State(state): State<ApiState>,
) -> Json<Vec<CertificateSummary>> {
    let certificates = state.certs.get_all();

    let summaries = certificates
        .iter()
        .map(|cert| CertificateSummary {
            id: cert.id.clone(),
            domains: cert.domains.clone(),
            challenge: cert.challenge_type,
            meta: certificate_meta(&state, cert),
        })
        .collect();

    Json(summaries)
}

/// GET /api/certificates/{domain}
pub async fn get_certificate(
    State(state): State<ApiState>,
    Path(domain): Path<String>,
) -> Result<Json<CertificateDetail>, ApiError> {
    let cert = state
        .certs
        .get(&domain)
        .ok_or_else(|| ApiError::NotFound(format!("no certificate for domain {domain}")))?;

    let meta = certificate_meta(&state, &cert);
    Ok(Json(CertificateDetail {
        domain,
        challenge: cert.challenge_type,
        pem: cert.certificate,
        meta,
    }))
}

/// POST /api/certificates/{domain}/renew
pub async fn renew_certificate(
    State(state): State<ApiState>,
    Path(domain): Path<String>,
) -> Result<StatusCode, ApiError> {
    let cert = state.certs.get(&domain).ok_or_else(|| {
        warn!(%domain, "no certificate found to renew");
        ApiError::NotFound(format!("no certificate for domain {domain}"))
    })?;

    state
        .certs
        .obtain_for_domains(&cert.domains, cert.challenge_type)?;
    Ok(StatusCode::ACCEPTED)
}

// ── System tasks ───────────────────────────────────────────────────

#[derive(Serialize)]
pub(crate) struct SystemTaskResponse {
    task: String,
    renewed: usize,
    removed: usize,
}

/// GET /api/system/{task}
pub async fn run_system_task(
    State(state): State<ApiState>,
    Path(task): Path<String>,
) -> Result<Json<SystemTaskResponse>, ApiError> {
    match task.as_str() {
        "batch_certificates" => {
            info!("running certificate batch sweep");
            let outcome = state.certs.batch()?;
            Ok(Json(SystemTaskResponse {
                task,
                renewed: outcome.renewed,
                removed: outcome.removed,
            }))
        }
        _ => Err(ApiError::NotFound(format!("unknown system task {task}"))),
    }
}

// ── Middleware ─────────────────────────────────────────────────────

/// Log every request with its outcome and duration, and pin the charset on
/// JSON response bodies.
pub async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = std::time::Instant::now();

    let mut response = next.run(request).await;

    let is_json = response
        .headers()
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"));
    if is_json {
        response.headers_mut().insert(
            axum::http::header::CONTENT_TYPE,
            axum::http::HeaderValue::from_static("application/json; charset=utf-8"),
        );
    }

    trace!(
        %method,
        %path,
        status = response.status().as_u16(),
        duration_ms = start.elapsed().as_millis() as u64,
        "request completed"
    );
    response
}
