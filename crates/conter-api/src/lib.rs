//! conter-api — management HTTP surface.
//!
//! JSON over HTTP/1.1, expected to stay loopback-bound. Authentication is
//! out of scope; operators front the listener themselves when exposing it.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | POST | `/api/projects` | Apply a project description |
//! | GET | `/api/projects` | List project summaries |
//! | GET | `/api/projects/{name}` | Project with live service states |
//! | DELETE | `/api/projects/{name}` | Remove a project |
//! | GET | `/api/certificates` | List certificates (no PEM) |
//! | GET | `/api/certificates/{domain}` | Certificate detail with PEM |
//! | POST | `/api/certificates/{domain}/renew` | Schedule a renewal |
//! | GET | `/api/system/{task}` | Run a system task (`batch_certificates`) |

pub mod error;
pub mod handlers;

use axum::routing::{get, post};
use axum::Router;

use conter_certs::CertificateManager;
use conter_deploy::Reconciler;

pub use error::ApiError;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub reconciler: Reconciler,
    pub certs: CertificateManager,
}

/// Build the management API router.
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route(
            "/api/projects",
            get(handlers::list_projects).post(handlers::apply_project),
        )
        .route(
            "/api/projects/{name}",
            get(handlers::get_project).delete(handlers::delete_project),
        )
        .route("/api/certificates", get(handlers::list_certificates))
        .route("/api/certificates/{domain}", get(handlers::get_certificate))
        .route(
            "/api/certificates/{domain}/renew",
            post(handlers::renew_certificate),
        )
        .route("/api/system/{task}", get(handlers::run_system_task))
        .layer(axum::middleware::from_fn(handlers::log_requests))
        .with_state(state)
}
