//! Daemon configuration file (TOML).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Let's Encrypt staging directory — the safe default for fresh installs.
pub const DEFAULT_ACME_DIRECTORY: &str =
    "https://acme-staging-v02.api.letsencrypt.org/directory";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log verbosity: trace, debug, info, warn, error.
    pub log_level: String,
    /// Use the human-oriented pretty log formatter.
    pub log_pretty: bool,
    /// Management API listen address (expected to stay loopback-bound).
    pub listen_address: String,
    pub acme: AcmeConfig,
    pub data: DataConfig,
    pub proxy: ProxyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AcmeConfig {
    /// Account contact email. Certificates cannot be requested until set.
    pub email: String,
    pub directory_url: String,
    /// Skip TLS verification of the directory URL (dev/test directories only).
    pub insecure: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub directory: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub http_listen_address: String,
    pub https_listen_address: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            log_level: "info".to_string(),
            log_pretty: false,
            listen_address: "127.0.0.1:6440".to_string(),
            acme: AcmeConfig::default(),
            data: DataConfig::default(),
            proxy: ProxyConfig::default(),
        }
    }
}

impl Default for AcmeConfig {
    fn default() -> Self {
        AcmeConfig {
            email: String::new(),
            directory_url: DEFAULT_ACME_DIRECTORY.to_string(),
            insecure: false,
        }
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        DataConfig {
            directory: PathBuf::from("/var/lib/conter"),
        }
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        ProxyConfig {
            http_listen_address: "0.0.0.0:80".to_string(),
            https_listen_address: "0.0.0.0:443".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config = toml::from_str(&content)?;
        Ok(config)
    }
}
