//! Git source builder.
//!
//! Clones a repository and builds a container image from its build recipe.
//! The work happens in a generated bash script so the full build transcript
//! lands in one log file the operator can read back. On failure the scratch
//! directory is kept for inspection.

use std::path::PathBuf;
use std::process::Stdio;

use thiserror::Error;
use tracing::{debug, warn};

use conter_core::Service;

const DEFAULT_BRANCH: &str = "master";
const DEFAULT_DEPTH: &str = "1";
const DEFAULT_DOCKERFILE: &str = "Dockerfile";

const BUILD_INTERNAL_DIR: &str = ".conter";
const BUILD_SCRIPT_NAME: &str = "build.sh";
const LOG_OUTPUT_NAME: &str = "build.log";
const IMAGE_OUTPUT_NAME: &str = "build.image";

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("source={0} is not supported")]
    UnsupportedSource(String),

    #[error("failed to prepare build directory: {0}")]
    Prepare(std::io::Error),

    #[error("build failed, see log output (file={log}) for more details")]
    Failed { log: PathBuf },

    #[error("build produced no image tag: {0}")]
    MissingImage(std::io::Error),

    #[error("build could not be executed: {0}")]
    Io(#[from] std::io::Error),
}

/// Builds a container image from a git repository.
pub struct Builder {
    writer: BashWriter,
}

impl Builder {
    pub fn new() -> Self {
        Self {
            writer: BashWriter::default(),
        }
    }

    /// Clone the repository and build the image for the service. Returns the
    /// image tag on success.
    pub async fn build(mut self, service: &Service) -> Result<String, BuildError> {
        let dir = tempfile::Builder::new()
            .suffix("-build")
            .tempdir()
            .map_err(BuildError::Prepare)?;
        debug!(dir = ?dir.path(), "build directory created");

        let dockerfile = opts_or_default(service, "dockerfile", DEFAULT_DOCKERFILE);
        let branch = opts_or_default(service, "branch", DEFAULT_BRANCH);
        let depth = opts_or_default(service, "depth", DEFAULT_DEPTH);

        let internal_dir = dir.path().join(BUILD_INTERNAL_DIR);
        let image_file = internal_dir.join(IMAGE_OUTPUT_NAME);
        let log_file = internal_dir.join(LOG_OUTPUT_NAME);
        let script_file = internal_dir.join(BUILD_SCRIPT_NAME);

        // Script: shallow clone, then an image build tagged with the short
        // commit, with the final tag echoed into the image output file.
        self.writer.command(
            "git",
            &[
                "clone",
                "--single-branch",
                "--branch",
                &branch,
                "--depth",
                &depth,
                &service.source.uri,
                "repository",
            ],
        );
        self.writer.cd("repository");
        self.writer
            .env_variable_eval("CONTER_IMAGE_TAG", "git rev-parse --short HEAD");
        let image = format!(
            "conter/{}/{}:{}",
            service.ingress.target_project,
            service.name,
            BashWriter::env_variable_key("CONTER_IMAGE_TAG")
        );
        self.writer.env_variable("CONTER_IMAGE", &image);
        self.writer.command(
            "docker",
            &[
                "buildx",
                "build",
                "--tag",
                &BashWriter::env_variable_key("CONTER_IMAGE"),
                "--file",
                &dockerfile,
                ".",
            ],
        );
        self.writer.pipe_to_file(
            &format!("echo {}", BashWriter::env_variable_key("CONTER_IMAGE")),
            &image_file.to_string_lossy(),
        );

        std::fs::create_dir_all(&internal_dir)?;
        std::fs::write(&script_file, self.writer.script(true))?;

        let log = std::fs::File::create(&log_file)?;
        let log_err = log.try_clone()?;

        let status = tokio::process::Command::new("bash")
            .arg("-c")
            .arg(&script_file)
            .current_dir(dir.path())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err))
            .status()
            .await?;

        if !status.success() {
            // Keep the directory around so the operator can read the log.
            let kept = dir.into_path();
            warn!(dir = ?kept, "build failed, keeping build directory");
            return Err(BuildError::Failed {
                log: kept.join(BUILD_INTERNAL_DIR).join(LOG_OUTPUT_NAME),
            });
        }

        let image = std::fs::read_to_string(&image_file)
            .map_err(BuildError::MissingImage)?
            .trim()
            .to_string();

        debug!(%image, service = %service.name, "image built from repository");
        Ok(image)
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

fn opts_or_default(service: &Service, key: &str, default: &str) -> String {
    match service.source.opts.get(key) {
        Some(value) if !value.is_empty() => value.clone(),
        _ => default.to_string(),
    }
}

/// Accumulates shell lines and renders them into a strict-mode script.
#[derive(Default)]
struct BashWriter {
    buffer: String,
}

impl BashWriter {
    fn command(&mut self, command: &str, args: &[&str]) {
        let mut line = command.to_string();
        for arg in args {
            line.push(' ');
            line.push_str(arg);
        }
        self.line(&line);
    }

    fn env_variable_eval(&mut self, name: &str, eval: &str) {
        self.line(&format!("{name}=$({eval})"));
    }

    fn env_variable(&mut self, name: &str, value: &str) {
        self.line(&format!("{name}=\"{value}\""));
    }

    fn env_variable_key(name: &str) -> String {
        format!("${name}")
    }

    fn cd(&mut self, path: &str) {
        self.line(&format!("cd \"{path}\""));
    }

    fn pipe_to_file(&mut self, command: &str, file: &str) {
        self.line(&format!("{command} > \"{file}\""));
    }

    fn line(&mut self, line: &str) {
        self.buffer.push_str(line);
        self.buffer.push('\n');
    }

    fn script(&self, trace: bool) -> String {
        let mut out = String::from("#!/usr/bin/env bash\n\n");

        if trace {
            out.push_str("set -o xtrace\n");
        }
        out.push_str(
            "if set -o | grep pipefail > /dev/null; then set -o pipefail; fi; set -o errexit\n",
        );
        out.push_str("set +o noclobber\n");

        out.push_str("\n# script content\n");
        out.push_str(&self.buffer);
        out.push_str("# end script content\n");
        out.push_str("exit 0\n");

        out
    }
}
