use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use timetable_core::engine::EngineOptions;
use timetable_core::grid::{DEFAULT_END_HOUR, DEFAULT_START_HOUR};
use timetable_core::Grid;

/// Roster used when the config file does not list teachers.
pub const DEFAULT_TEACHERS: &[&str] = &[
    "Bruno", "Carol", "Deluca", "Ester", "Leandro", "Lesley", "Livia", "Nataly", "Nino", "Pedro",
    "Priscilla", "Ricardo", "Samuel", "Thiago", "Vickie",
];

pub const DEFAULT_DEBOUNCE_MS: u64 = 800;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;

/// Source of a configuration value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Default,
    File,
    Environment,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::File => write!(f, "file"),
            ConfigSource::Environment => write!(f, "environment"),
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }
}

/// How the client watches the remote store for changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Re-read the store on a fixed interval.
    #[default]
    Poll,
    /// Seed with one read, then receive pushed changes over a WebSocket.
    Subscribe,
}

impl std::fmt::Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Transport::Poll => write!(f, "poll"),
            Transport::Subscribe => write!(f, "subscribe"),
        }
    }
}

impl std::str::FromStr for Transport {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "poll" => Ok(Transport::Poll),
            "subscribe" => Ok(Transport::Subscribe),
            _ => Err(format!(
                "Invalid transport '{}'. Valid options: poll, subscribe",
                s
            )),
        }
    }
}

/// Application configuration with source tracking
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Base URL of the schedules API; unset means local-only
    pub api_url: ConfigValue<Option<String>>,
    pub transport: ConfigValue<Transport>,
    /// Directory holding the local schedule cache
    pub data_dir: ConfigValue<PathBuf>,
    pub teachers: ConfigValue<Vec<String>>,
    pub start_hour: ConfigValue<u8>,
    pub end_hour: ConfigValue<u8>,
    pub debounce_ms: ConfigValue<u64>,
    pub poll_interval_ms: ConfigValue<u64>,
    /// Config file path used (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
}

/// Internal struct for deserializing config file
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    api_url: Option<String>,
    transport: Option<Transport>,
    data_dir: Option<PathBuf>,
    teachers: Option<Vec<String>>,
    start_hour: Option<u8>,
    end_hour: Option<u8>,
    debounce_ms: Option<u64>,
    poll_interval_ms: Option<u64>,
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut config = Self::defaults();

        // Try to load from config file
        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadError(path.clone(), e))?;
            let file_config: ConfigFile = serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(path.clone(), e))?;
            config.apply_file(file_config, &path);
            config.config_file = Some(path);
        }

        // Apply environment variable overrides
        if let Ok(url) = std::env::var("TIMETABLE_API_URL") {
            config.api_url = ConfigValue::new(non_empty(url), ConfigSource::Environment);
        }
        if let Ok(dir) = std::env::var("TIMETABLE_DATA_DIR") {
            config.data_dir = ConfigValue::new(PathBuf::from(dir), ConfigSource::Environment);
        }
        if let Ok(transport) = std::env::var("TIMETABLE_TRANSPORT") {
            let transport = transport
                .parse()
                .map_err(|e| ConfigError::InvalidValue("TIMETABLE_TRANSPORT".to_string(), e))?;
            config.transport = ConfigValue::new(transport, ConfigSource::Environment);
        }

        config.grid()?;
        Ok(config)
    }

    fn defaults() -> Self {
        Self {
            api_url: ConfigValue::new(None, ConfigSource::Default),
            transport: ConfigValue::new(Transport::default(), ConfigSource::Default),
            data_dir: ConfigValue::new(Self::default_data_dir(), ConfigSource::Default),
            teachers: ConfigValue::new(
                DEFAULT_TEACHERS.iter().map(|t| t.to_string()).collect(),
                ConfigSource::Default,
            ),
            start_hour: ConfigValue::new(DEFAULT_START_HOUR, ConfigSource::Default),
            end_hour: ConfigValue::new(DEFAULT_END_HOUR, ConfigSource::Default),
            debounce_ms: ConfigValue::new(DEFAULT_DEBOUNCE_MS, ConfigSource::Default),
            poll_interval_ms: ConfigValue::new(DEFAULT_POLL_INTERVAL_MS, ConfigSource::Default),
            config_file: None,
        }
    }

    fn apply_file(&mut self, file: ConfigFile, path: &std::path::Path) {
        if let Some(url) = file.api_url {
            self.api_url = ConfigValue::new(non_empty(url), ConfigSource::File);
        }
        if let Some(transport) = file.transport {
            self.transport = ConfigValue::new(transport, ConfigSource::File);
        }
        if let Some(dir) = file.data_dir {
            // Resolve relative paths against config file's directory
            let resolved = if dir.is_relative() {
                path.parent().map(|p| p.join(&dir)).unwrap_or(dir)
            } else {
                dir
            };
            self.data_dir = ConfigValue::new(resolved, ConfigSource::File);
        }
        if let Some(teachers) = file.teachers {
            self.teachers = ConfigValue::new(teachers, ConfigSource::File);
        }
        if let Some(hour) = file.start_hour {
            self.start_hour = ConfigValue::new(hour, ConfigSource::File);
        }
        if let Some(hour) = file.end_hour {
            self.end_hour = ConfigValue::new(hour, ConfigSource::File);
        }
        if let Some(ms) = file.debounce_ms {
            self.debounce_ms = ConfigValue::new(ms, ConfigSource::File);
        }
        if let Some(ms) = file.poll_interval_ms {
            self.poll_interval_ms = ConfigValue::new(ms, ConfigSource::File);
        }
    }

    /// The hour grid described by `start_hour` and `end_hour`.
    pub fn grid(&self) -> Result<Grid, ConfigError> {
        Grid::new(self.start_hour.value, self.end_hour.value)
            .map_err(|e| ConfigError::InvalidValue("start_hour/end_hour".to_string(), e))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.value)
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            debounce: Duration::from_millis(self.debounce_ms.value),
            poll_interval: self.poll_interval(),
            ..EngineOptions::default()
        }
    }

    /// Default config directory (platform-specific):
    /// - Linux: ~/.config/timetable/
    /// - macOS: ~/Library/Application Support/timetable/
    /// - Windows: %APPDATA%/timetable/
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("timetable")
    }

    /// Default data directory (platform-specific data dir + timetable)
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("timetable")
    }

    /// Default config file path (platform-specific config dir + config.yaml)
    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join("config.yaml")
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[derive(Debug)]
pub enum ConfigError {
    ReadError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
    InvalidValue(String, String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::InvalidValue(key, e) => {
                write!(f, "Invalid value for {}: {}", key, e)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::ReadError(_, e) => Some(e),
            ConfigError::ParseError(_, e) => Some(e),
            ConfigError::InvalidValue(..) => None,
        }
    }
}
