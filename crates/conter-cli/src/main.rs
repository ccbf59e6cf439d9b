//! conctl — command line client for conter.
//!
//! Talks to the loopback management API of a running `conterd`.
//!
//! # Usage
//!
//! ```text
//! conctl project ls
//! conctl project apply -f project.json
//! conctl project inspect my-project
//! conctl project rm my-project
//! conctl certificate ls
//! conctl certificate inspect www.example.com
//! conctl certificate renew www.example.com
//! conctl system batch-certificates
//! ```

mod client;
mod types;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use client::ApiClient;
use conter_core::manifest;
use types::command_from_manifest;

#[derive(Parser)]
#[command(name = "conctl", version, about = "CLI for conter, a minimal container management system for small scale web deployments")]
struct Cli {
    /// Management address of the conter daemon (host:port). Also read from
    /// the CONTER_HOST environment variable.
    #[arg(long, global = true)]
    host: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Manage projects.
    Project {
        #[command(subcommand)]
        command: ProjectCommand,
    },
    /// Manage certificates.
    Certificate {
        #[command(subcommand)]
        command: CertificateCommand,
    },
    /// Run system tasks on the daemon.
    System {
        #[command(subcommand)]
        command: SystemCommand,
    },
}

#[derive(Subcommand)]
enum ProjectCommand {
    /// List projects.
    Ls,
    /// Apply a project configuration to the system.
    Apply {
        /// Path to the project manifest (JSON).
        #[arg(long, short)]
        file: PathBuf,
    },
    /// Inspect the information of a project.
    Inspect { name: String },
    /// Remove a project.
    Rm { name: String },
}

#[derive(Subcommand)]
enum CertificateCommand {
    /// List certificates.
    Ls,
    /// Inspect the certificate for a domain.
    Inspect { domain: String },
    /// Request a renewal of the certificate for a domain.
    Renew { domain: String },
}

#[derive(Subcommand)]
enum SystemCommand {
    /// Sweep all certificates, renewing and pruning as needed.
    BatchCertificates,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let client = match &cli.host {
        Some(host) => ApiClient::new(host),
        None => ApiClient::from_env(),
    };

    match cli.command {
        Command::Project { command } => run_project(&client, command).await,
        Command::Certificate { command } => run_certificate(&client, command).await,
        Command::System { command } => run_system(&client, command).await,
    }
}

async fn run_project(client: &ApiClient, command: ProjectCommand) -> anyhow::Result<()> {
    match command {
        ProjectCommand::Ls => {
            let projects = client.project_list().await?;
            println!("{:<24} {:<8} SERVICES", "NAME", "RUNNING");
            for project in projects {
                println!(
                    "{:<24} {:<8} {}",
                    project.name,
                    project.running,
                    project.services.join(", ")
                );
            }
        }
        ProjectCommand::Apply { file } => {
            let content = std::fs::read(&file)?;
            let parsed = manifest::parse(content.as_slice())?;
            let command = command_from_manifest(&parsed);

            let applied = client.project_apply(&command).await?;
            println!("project {} applied", applied.project);
            for service in applied.services {
                println!("  {} ({})", service.name, service.status);
            }
        }
        ProjectCommand::Inspect { name } => {
            let project = client.project_inspect(&name).await?;
            println!("project: {}", project.project);
            for service in project.services {
                println!("  service: {} [{}]", service.name, service.status);
                println!("    hash: {}", service.hash);
                if let Some(ingress) = service.ingress {
                    println!(
                        "    ingress: {} -> {} ({})",
                        ingress.domains.join(","),
                        ingress.internal,
                        ingress.challenge
                    );
                }
                for volume in service.volumes {
                    println!("    volume: {volume}");
                }
            }
        }
        ProjectCommand::Rm { name } => {
            client.project_remove(&name).await?;
            println!("project {name} removed");
        }
    }
    Ok(())
}

async fn run_certificate(client: &ApiClient, command: CertificateCommand) -> anyhow::Result<()> {
    match command {
        CertificateCommand::Ls => {
            let certificates = client.certificate_list().await?;
            println!("{:<40} {:<10} EXPIRY", "DOMAINS", "CHALLENGE");
            for cert in certificates {
                let expiry = cert
                    .meta
                    .map(|meta| meta.expiry)
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{:<40} {:<10} {}",
                    cert.domains.join(","),
                    cert.challenge,
                    expiry
                );
            }
        }
        CertificateCommand::Inspect { domain } => {
            let cert = client.certificate_inspect(&domain).await?;
            println!("domain: {}", cert.domain);
            println!("challenge: {}", cert.challenge);
            if let Some(meta) = cert.meta {
                println!("subject: {}", meta.subject);
                println!("issuer: {}", meta.issuer);
                println!("since: {}", meta.since);
                println!("expiry: {}", meta.expiry);
                println!("serial: {}", meta.serial);
                println!("signature algorithm: {}", meta.signature_algorithm);
                println!("public key algorithm: {}", meta.public_algorithm);
            }
            println!("pem: {}", cert.pem);
        }
        CertificateCommand::Renew { domain } => {
            client.certificate_renew(&domain).await?;
            println!("renewal scheduled for {domain}");
        }
    }
    Ok(())
}

async fn run_system(client: &ApiClient, command: SystemCommand) -> anyhow::Result<()> {
    match command {
        SystemCommand::BatchCertificates => {
            let outcome = client.system_task("batch_certificates").await?;
            println!(
                "{}: renewed={} removed={}",
                outcome.task, outcome.renewed, outcome.removed
            );
        }
    }
    Ok(())
}
