//! Server configuration.
//!
//! Environment variables:
//! - `TIMETABLE_PORT`: Port to listen on (default: 8080)
//! - `TIMETABLE_KV_DIR`: Directory of the KV namespace (unset: not configured)
//! - `TIMETABLE_SERVER_CONFIG`: Path to config file
//!   (default: ~/.config/timetable-server/config.yaml)
//!
//! # Config File Format
//!
//! ```yaml
//! kv_dir: /var/lib/timetable/kv
//! ```
//!
//! The environment wins over the file.

use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_PORT: u16 = 8080;

/// Config file structure
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    kv_dir: Option<PathBuf>,
}

/// Server configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,
    /// Directory of the KV namespace; `None` leaves the store unconfigured
    pub kv_dir: Option<PathBuf>,
    /// Path to config file
    pub config_path: PathBuf,
}

impl ServerConfig {
    /// Load configuration from environment variables and the config file.
    pub fn from_env() -> Result<Self, ServerConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration reading variables through `lookup`.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ServerConfigError> {
        let port = match lookup("TIMETABLE_PORT") {
            Some(port) => port
                .parse()
                .map_err(|_| ServerConfigError::InvalidPort(port))?,
            None => DEFAULT_PORT,
        };

        let config_path = lookup("TIMETABLE_SERVER_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(Self::default_config_path);

        let file = Self::load_file(&config_path)?;

        let kv_dir = lookup("TIMETABLE_KV_DIR")
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from)
            .or(file.kv_dir);

        Ok(Self {
            port,
            kv_dir,
            config_path,
        })
    }

    fn load_file(path: &Path) -> Result<ConfigFile, ServerConfigError> {
        if !path.exists() {
            return Ok(ConfigFile::default());
        }
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ServerConfigError::ReadError(path.to_path_buf(), e))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| ServerConfigError::ParseError(path.to_path_buf(), e))
    }

    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("timetable-server")
            .join("config.yaml")
    }
}

#[derive(Debug)]
pub enum ServerConfigError {
    InvalidPort(String),
    ReadError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
}

impl std::fmt::Display for ServerConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerConfigError::InvalidPort(port) => write!(f, "Invalid TIMETABLE_PORT: {}", port),
            ServerConfigError::ReadError(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ServerConfigError::ParseError(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
        }
    }
}

impl std::error::Error for ServerConfigError {}
