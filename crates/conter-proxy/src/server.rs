//! Proxy listeners — plaintext HTTP and TLS-terminated HTTPS.
//!
//! The plaintext listener only ever answers ACME challenges and redirects
//! everything else to HTTPS. The TLS listener terminates with SNI-resolved
//! certificates and pipes requests through to the matched backend.

use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use http::header::{HeaderValue, HOST, LOCATION, SERVER};
use http::{Request, Response, StatusCode};
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::Body;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, error, info, trace, warn};

use conter_certs::CertificateManager;
use conter_core::{Ingress, APPLICATION_NAME, VERSION};

use crate::router::IngressRouter;
use crate::tls::SniCertResolver;
use crate::util::{extract_domain, extract_token, rewrite_to_https};

/// Unified response body for proxied and synthesized responses.
pub type ProxyBody = BoxBody<Bytes, hyper::Error>;

/// Deadline for reaching an upstream backend.
const UPSTREAM_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
enum UpstreamError {
    #[error("connect failed: {0}")]
    Connect(#[from] std::io::Error),

    #[error("deadline exceeded")]
    Timeout,

    #[error("upstream request failed: {0}")]
    Http(#[from] hyper::Error),

    #[error("invalid upstream path: {0}")]
    Uri(#[from] http::uri::InvalidUri),
}

/// The public-facing proxy for all registered ingress routes.
#[derive(Clone)]
pub struct ProxyServer {
    router: IngressRouter,
    certs: CertificateManager,
}

impl ProxyServer {
    pub fn new(router: IngressRouter, certs: CertificateManager) -> Self {
        Self { router, certs }
    }

    /// Serve plaintext HTTP until the shutdown signal fires.
    pub async fn listen_http(
        &self,
        addr: SocketAddr,
        mut shutdown: watch::Receiver<bool>,
    ) -> std::io::Result<()> {
        let listener = TcpListener::bind(addr).await?;
        info!(%addr, "HTTP proxy listening");

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(pair) => pair,
                        Err(e) => {
                            warn!(error = %e, "failed to accept HTTP connection");
                            continue;
                        }
                    };

                    let server = self.clone();
                    tokio::spawn(async move {
                        let io = TokioIo::new(stream);
                        let service = service_fn(move |req| {
                            let server = server.clone();
                            async move { Ok::<_, hyper::Error>(server.handle_http(req).await) }
                        });
                        if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                            trace!(error = %e, %peer, "HTTP connection closed with error");
                        }
                    });
                }
                _ = shutdown.changed() => {
                    info!("shutting down HTTP proxy");
                    return Ok(());
                }
            }
        }
    }

    /// Serve TLS-terminated HTTPS until the shutdown signal fires.
    pub async fn listen_https(
        &self,
        addr: SocketAddr,
        mut shutdown: watch::Receiver<bool>,
    ) -> std::io::Result<()> {
        let listener = TcpListener::bind(addr).await?;
        let acceptor = TlsAcceptor::from(SniCertResolver::server_config(self.certs.clone()));
        info!(%addr, "HTTPS proxy listening");

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(pair) => pair,
                        Err(e) => {
                            warn!(error = %e, "failed to accept HTTPS connection");
                            continue;
                        }
                    };

                    let acceptor = acceptor.clone();
                    let server = self.clone();
                    tokio::spawn(async move {
                        let tls = match acceptor.accept(stream).await {
                            Ok(tls) => tls,
                            Err(e) => {
                                trace!(error = %e, %peer, "TLS handshake failed");
                                return;
                            }
                        };

                        let io = TokioIo::new(tls);
                        let service = service_fn(move |req| {
                            let server = server.clone();
                            async move { Ok::<_, hyper::Error>(server.handle_https(req).await) }
                        });
                        if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                            trace!(error = %e, %peer, "HTTPS connection closed with error");
                        }
                    });
                }
                _ = shutdown.changed() => {
                    info!("shutting down HTTPS proxy");
                    return Ok(());
                }
            }
        }
    }

    /// Plaintext handler: ACME challenges are answered directly, everything
    /// else is upgraded to HTTPS with a permanent redirect.
    pub async fn handle_http<B>(&self, req: Request<B>) -> Response<ProxyBody> {
        let path = req.uri().path().to_string();
        let host = request_host(&req);
        let domain = extract_domain(&host).to_string();

        if let Some(token) = extract_token(&path) {
            debug!(%domain, %token, "handling incoming ACME challenge request");
            return match self.certs.authorize(&domain, token) {
                Ok(auth) => text_response(StatusCode::OK, auth),
                Err(e) => {
                    debug!(error = %e, %domain, %token, "invalid challenge token");
                    empty_response(StatusCode::NOT_FOUND)
                }
            };
        }

        let uri = req
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("")
            .to_string();
        let location = rewrite_to_https(&host, &uri);

        debug!(%host, %uri, "redirecting plain HTTP request to HTTPS");
        match HeaderValue::from_str(&location) {
            Ok(value) => {
                let mut response = empty_response(StatusCode::MOVED_PERMANENTLY);
                response.headers_mut().insert(LOCATION, value);
                response
            }
            Err(_) => empty_response(StatusCode::BAD_REQUEST),
        }
    }

    /// TLS handler: match the route by host and pipe the request through.
    pub async fn handle_https<B>(&self, req: Request<B>) -> Response<ProxyBody>
    where
        B: Body + Send + 'static,
        B::Data: Send,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let host = request_host(&req);
        let domain = extract_domain(&host).to_string();

        let route = match self.router.match_domain(&domain) {
            Ok(Some(route)) => route,
            Ok(None) => {
                warn!(%domain, "no route found for domain");
                return empty_response(StatusCode::NOT_FOUND);
            }
            Err(e) => {
                error!(error = %e, %domain, "route lookup failed");
                return empty_response(StatusCode::INTERNAL_SERVER_ERROR);
            }
        };

        trace!(
            endpoint = %route.target_endpoint,
            service = %route.target_service,
            path = %req.uri().path(),
            "routing request to backend"
        );

        match forward(&route, req).await {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, service = %route.target_service, "failed to route request");
                empty_response(StatusCode::SERVICE_UNAVAILABLE)
            }
        }
    }
}

/// Pipe a request to the route's backend over a fresh HTTP/1 connection.
async fn forward<B>(route: &Ingress, mut req: Request<B>) -> Result<Response<ProxyBody>, UpstreamError>
where
    B: Body + Send + 'static,
    B::Data: Send,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let connect = TcpStream::connect(&route.target_endpoint);
    let stream = tokio::time::timeout(UPSTREAM_CONNECT_TIMEOUT, connect)
        .await
        .map_err(|_| UpstreamError::Timeout)??;

    let io = TokioIo::new(stream);
    let handshake = hyper::client::conn::http1::handshake(io);
    let (mut sender, conn) = tokio::time::timeout(UPSTREAM_CONNECT_TIMEOUT, handshake)
        .await
        .map_err(|_| UpstreamError::Timeout)??;

    // Drive the connection until the exchange completes.
    tokio::spawn(async move {
        let _ = conn.await;
    });

    // The backend sees only the path; scheme and authority stay local.
    let path_and_query = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/")
        .to_string();
    *req.uri_mut() = path_and_query.parse()?;

    let mut response = sender.send_request(req).await?;

    let server_value = format!("{APPLICATION_NAME}/{VERSION}");
    if let Ok(value) = HeaderValue::from_str(&server_value) {
        response.headers_mut().insert(SERVER, value);
    }

    Ok(response.map(|body| body.boxed()))
}

/// Host the client addressed, from the Host header or the request target.
fn request_host<B>(req: &Request<B>) -> String {
    if let Some(value) = req.headers().get(HOST) {
        if let Ok(host) = value.to_str() {
            return host.to_string();
        }
    }
    req.uri()
        .authority()
        .map(|a| a.as_str().to_string())
        .unwrap_or_default()
}

fn empty_response(status: StatusCode) -> Response<ProxyBody> {
    let mut response = Response::new(
        Full::new(Bytes::new())
            .map_err(|never| match never {})
            .boxed(),
    );
    *response.status_mut() = status;
    response
}

fn text_response(status: StatusCode, body: String) -> Response<ProxyBody> {
    let mut response = Response::new(
        Full::new(Bytes::from(body))
            .map_err(|never| match never {})
            .boxed(),
    );
    *response.status_mut() = status;
    response
}
