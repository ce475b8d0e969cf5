// src/config.rs - Single configuration file
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Main configuration struct for the mirrored printer, the cloud account and
/// the login web UI.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub printer: PrinterConfig,
    #[serde(default)]
    pub cloud: CloudConfig,
    #[serde(default)]
    pub web: WebConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            printer: PrinterConfig::default(),
            cloud: CloudConfig::default(),
            web: WebConfig::default(),
        }
    }
}

/// Identity and access settings of the mirrored printer.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PrinterConfig {
    /// Device type, e.g. "P1S".
    #[serde(default)]
    pub device_type: String,
    #[serde(default)]
    pub serial: String,
    /// Printer IP address on the local network.
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub access_code: String,
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for PrinterConfig {
    fn default() -> Self {
        Self {
            device_type: "".to_string(),
            serial: "".to_string(),
            host: "".to_string(),
            access_code: "".to_string(),
            username: default_username(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

/// Cloud account credentials and session persistence.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CloudConfig {
    /// Account region, e.g. "EU".
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    /// Where the session token is stored between runs.
    #[serde(default = "default_auth_token_file")]
    pub auth_token_file: PathBuf,
    /// Where downloaded job covers are written.
    #[serde(default = "default_cover_dir")]
    pub cover_dir: PathBuf,
    /// Seconds between periodic account checks.
    #[serde(default = "default_refresh_secs")]
    pub refresh_secs: u64,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            region: "".to_string(),
            email: "".to_string(),
            password: "".to_string(),
            auth_token_file: default_auth_token_file(),
            cover_dir: default_cover_dir(),
            refresh_secs: default_refresh_secs(),
        }
    }
}

/// Login web UI bind settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_web_port")]
    pub port: u16,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_web_port(),
        }
    }
}

// Default value functions
fn default_username() -> String { "bblp".to_string() }
fn default_poll_interval_ms() -> u64 { 1000 }
fn default_auth_token_file() -> PathBuf { PathBuf::from("/tmp/.authtoken") }
fn default_cover_dir() -> PathBuf { std::env::temp_dir() }
fn default_refresh_secs() -> u64 { 300 }
fn default_bind() -> String { "0.0.0.0".to_string() }
fn default_web_port() -> u16 { 30000 }

/// Load configuration from a TOML file at the given path.
pub fn load_config(path: &str) -> Result<Config, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(config) => Ok(config),
            Err(e) => {
                tracing::error!("Failed to parse config TOML: {}", e);
                Err(ConfigError::Toml(e))
            }
        },
        Err(e) => {
            tracing::error!("Failed to read config file '{}': {}", path, e);
            Err(ConfigError::Io(e))
        }
    }
}
