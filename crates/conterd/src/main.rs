//! conterd — the conter daemon.
//!
//! Single binary hosting the management API, the reconciler, the ingress
//! proxy pair, and the certificate renewal sweep.
//!
//! # Usage
//!
//! ```text
//! conterd --config /etc/conter/conter.toml
//! conterd --config ./conter.toml --validate-config
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;
use tracing::{info, warn};

use conter_api::ApiState;
use conter_certs::{AcmeSettings, CertificateManager};
use conter_core::{Config, VERSION};
use conter_deploy::Reconciler;
use conter_proxy::{IngressRouter, ProxyServer};
use conter_runtime::DockerRuntime;
use conter_state::Store;

/// Interval between background certificate renewal sweeps.
const RENEWAL_SWEEP_INTERVAL: Duration = Duration::from_secs(12 * 3600);

#[derive(Parser)]
#[command(name = "conterd", version, about = "conter daemon")]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, short, default_value = "/etc/conter/conter.toml")]
    config: PathBuf,

    /// Parse and validate the configuration, then exit.
    #[arg(long)]
    validate_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = load_config(&cli.config)?;
    if cli.validate_config {
        return Ok(());
    }

    init_tracing(&config);
    info!(version = VERSION, "starting conter");

    run(config).await
}

/// Read the configuration file; a missing file at the default location falls
/// back to built-in defaults.
fn load_config(path: &PathBuf) -> anyhow::Result<Config> {
    if path.exists() {
        Config::from_file(path).with_context(|| format!("failed to load config {path:?}"))
    } else {
        Ok(Config::default())
    }
}

fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.log_level.clone()));

    if config.log_pretty {
        tracing_subscriber::fmt().with_env_filter(filter).pretty().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    std::fs::create_dir_all(&config.data.directory)
        .context("failed to create data directory")?;

    // ── Subsystems ─────────────────────────────────────────────────

    let store = Store::open(&config.data.directory).context("failed to open state store")?;
    info!(directory = ?config.data.directory, "state store opened");

    let runtime = DockerRuntime::connect().context("failed to connect to container runtime")?;

    let certs = CertificateManager::new(
        store.clone(),
        AcmeSettings {
            email: config.acme.email.clone(),
            directory_url: config.acme.directory_url.clone(),
            insecure: config.acme.insecure,
        },
    );

    let router = IngressRouter::new(store.clone(), certs.clone());
    let reconciler = Reconciler::new(store, Arc::new(runtime), router.clone());
    let proxy = ProxyServer::new(router, certs.clone());

    // ── Shutdown signal ────────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    // ── Proxy listeners ────────────────────────────────────────────

    let http_addr: SocketAddr = config
        .proxy
        .http_listen_address
        .parse()
        .context("invalid proxy HTTP listen address")?;
    let https_addr: SocketAddr = config
        .proxy
        .https_listen_address
        .parse()
        .context("invalid proxy HTTPS listen address")?;

    let http_proxy = proxy.clone();
    let http_shutdown = shutdown_rx.clone();
    let http_handle = tokio::spawn(async move {
        if let Err(e) = http_proxy.listen_http(http_addr, http_shutdown).await {
            tracing::error!(error = %e, "HTTP proxy failed");
        }
    });

    let https_proxy = proxy;
    let https_shutdown = shutdown_rx.clone();
    let https_handle = tokio::spawn(async move {
        if let Err(e) = https_proxy.listen_https(https_addr, https_shutdown).await {
            tracing::error!(error = %e, "HTTPS proxy failed");
        }
    });

    // ── Certificate renewal sweep ──────────────────────────────────

    let sweep_certs = certs.clone();
    let mut sweep_shutdown = shutdown_rx.clone();
    let sweep_handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(RENEWAL_SWEEP_INTERVAL);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match sweep_certs.batch() {
                        Ok(outcome) if outcome.renewed > 0 || outcome.removed > 0 => {
                            info!(
                                renewed = outcome.renewed,
                                removed = outcome.removed,
                                "certificate sweep completed"
                            );
                        }
                        Ok(_) => {}
                        Err(e) => warn!(error = %e, "certificate sweep failed"),
                    }
                }
                _ = sweep_shutdown.changed() => break,
            }
        }
    });

    // ── Management API ─────────────────────────────────────────────

    let api = conter_api::build_router(ApiState { reconciler, certs });
    let api_addr: SocketAddr = config
        .listen_address
        .parse()
        .context("invalid management listen address")?;

    let listener = tokio::net::TcpListener::bind(api_addr)
        .await
        .with_context(|| format!("failed to bind management listener on {api_addr}"))?;
    info!(%api_addr, "management server listening");

    let mut serve_shutdown = shutdown_rx;
    axum::serve(listener, api)
        .with_graceful_shutdown(async move {
            let _ = serve_shutdown.changed().await;
        })
        .await
        .context("management server failed")?;

    // Let the listeners drain before exiting.
    let _ = http_handle.await;
    let _ = https_handle.await;
    let _ = sweep_handle.await;

    info!("conter stopped");
    Ok(())
}

async fn wait_for_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => {}
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
}
