//! Persisted settings for paper-relay.
//!
//! Settings live in a flat TOML file and can be overridden with environment
//! variables (see [`super::load_config`]).
//!
//! # Configuration File Format
//!
//! ```toml
//! [backend]
//! mode = "proxied"            # or "direct"
//! network_profile = "local"   # or "external"
//! timeout_seconds = 30
//! request_delay_ms = 1000
//!
//! [servers.local]
//! url = "http://127.0.0.1:5000"
//! api_key = "your_secret_api_key"
//!
//! [servers.external]
//! url = "http://example.com:80"
//! api_key = ""
//!
//! [downloads]
//! directory = "./papers"
//!
//! [logging]
//! level = "info"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::{
    BackendConfig, BackendMode, NetworkProfile, DEFAULT_EXTERNAL_SERVER_URL,
    DEFAULT_LOCAL_SERVER_URL, DEFAULT_REQUEST_DELAY_MS, DEFAULT_TIMEOUT_SECONDS,
};

/// Shortest timeout the settings accept
pub const MIN_TIMEOUT_SECONDS: u64 = 5;
/// Longest timeout the settings accept
pub const MAX_TIMEOUT_SECONDS: u64 = 120;

/// Settings file structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsFile {
    /// Backend selection section
    #[serde(default)]
    pub backend: BackendSection,

    /// Relay server entries, one per network profile
    #[serde(default)]
    pub servers: ServersSection,

    /// Downloads section
    #[serde(default)]
    pub downloads: DownloadsSection,

    /// Logging section
    #[serde(default)]
    pub logging: LoggingSection,
}

/// Backend selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendSection {
    #[serde(default)]
    pub mode: BackendMode,

    #[serde(default)]
    pub network_profile: NetworkProfile,

    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    #[serde(default = "default_request_delay")]
    pub request_delay_ms: u64,

    /// Override for the direct-mode query endpoint
    #[serde(default)]
    pub direct_endpoint: Option<String>,
}

impl Default for BackendSection {
    fn default() -> Self {
        Self {
            mode: BackendMode::default(),
            network_profile: NetworkProfile::default(),
            timeout_seconds: default_timeout(),
            request_delay_ms: default_request_delay(),
            direct_endpoint: None,
        }
    }
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECONDS
}

fn default_request_delay() -> u64 {
    DEFAULT_REQUEST_DELAY_MS
}

/// Relay server entries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServersSection {
    #[serde(default = "default_local_server")]
    pub local: ServerEntry,

    #[serde(default = "default_external_server")]
    pub external: ServerEntry,
}

impl Default for ServersSection {
    fn default() -> Self {
        Self {
            local: default_local_server(),
            external: default_external_server(),
        }
    }
}

fn default_local_server() -> ServerEntry {
    ServerEntry {
        url: DEFAULT_LOCAL_SERVER_URL.to_string(),
        api_key: String::new(),
    }
}

fn default_external_server() -> ServerEntry {
    ServerEntry {
        url: DEFAULT_EXTERNAL_SERVER_URL.to_string(),
        api_key: String::new(),
    }
}

/// One relay server: URL plus optional API key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerEntry {
    pub url: String,

    #[serde(default)]
    pub api_key: String,
}

/// Downloads section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadsSection {
    #[serde(default = "default_download_dir")]
    pub directory: PathBuf,
}

impl Default for DownloadsSection {
    fn default() -> Self {
        Self {
            directory: default_download_dir(),
        }
    }
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("./papers")
}

/// Logging section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl SettingsFile {
    /// Load settings from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigFileError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigFileError::Io(e.to_string()))?;

        let mut settings: Self =
            toml::from_str(&content).map_err(|e| ConfigFileError::Parse(e.to_string()))?;
        settings.normalize();
        Ok(settings)
    }

    /// Save settings to a TOML file, creating the parent directory if needed
    pub fn save(&self, path: &Path) -> Result<(), ConfigFileError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigFileError::Serialize(e.to_string()))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ConfigFileError::Io(e.to_string()))?;
        }

        std::fs::write(path, content).map_err(|e| ConfigFileError::Io(e.to_string()))
    }

    /// Clamp values into the ranges the client accepts
    pub fn normalize(&mut self) {
        self.backend.timeout_seconds = self
            .backend
            .timeout_seconds
            .clamp(MIN_TIMEOUT_SECONDS, MAX_TIMEOUT_SECONDS);
        self.servers.local.url = self.servers.local.url.trim().to_string();
        self.servers.external.url = self.servers.external.url.trim().to_string();
    }

    /// Server entry for the active network profile
    pub fn active_server(&self) -> &ServerEntry {
        match self.backend.network_profile {
            NetworkProfile::Local => &self.servers.local,
            NetworkProfile::External => &self.servers.external,
        }
    }

    fn active_server_mut(&mut self) -> &mut ServerEntry {
        match self.backend.network_profile {
            NetworkProfile::Local => &mut self.servers.local,
            NetworkProfile::External => &mut self.servers.external,
        }
    }

    /// Snapshot of the active backend for one orchestration call
    pub fn backend_config(&self) -> BackendConfig {
        let config = match self.backend.mode {
            BackendMode::Direct => match &self.backend.direct_endpoint {
                Some(endpoint) if !endpoint.trim().is_empty() => {
                    BackendConfig::direct_with_endpoint(endpoint.trim())
                }
                _ => BackendConfig::direct(),
            },
            BackendMode::Proxied => {
                let server = self.active_server();
                BackendConfig::proxied(
                    self.backend.network_profile,
                    server.url.as_str(),
                    server.api_key.as_str(),
                )
            }
        };

        config
            .with_timeout_seconds(self.backend.timeout_seconds)
            .with_request_delay(Duration::from_millis(self.backend.request_delay_ms))
    }

    /// Update one setting by its dotted key, as used by `config set`
    ///
    /// `server.url` and `server.api_key` address the active network profile.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigFileError> {
        let value = value.trim();
        match key {
            "mode" | "backend.mode" => {
                self.backend.mode = match value.to_lowercase().as_str() {
                    "direct" => BackendMode::Direct,
                    "proxied" | "server" => BackendMode::Proxied,
                    other => return Err(ConfigFileError::invalid(key, other)),
                }
            }
            "profile" | "backend.network_profile" => {
                self.backend.network_profile = match value.to_lowercase().as_str() {
                    "local" => NetworkProfile::Local,
                    "external" => NetworkProfile::External,
                    other => return Err(ConfigFileError::invalid(key, other)),
                }
            }
            "timeout" | "backend.timeout_seconds" => {
                self.backend.timeout_seconds = value
                    .parse()
                    .map_err(|_| ConfigFileError::invalid(key, value))?;
            }
            "delay" | "backend.request_delay_ms" => {
                self.backend.request_delay_ms = value
                    .parse()
                    .map_err(|_| ConfigFileError::invalid(key, value))?;
            }
            "backend.direct_endpoint" => {
                self.backend.direct_endpoint = (!value.is_empty()).then(|| value.to_string());
            }
            "server.url" => self.active_server_mut().url = value.to_string(),
            "server.api_key" => self.active_server_mut().api_key = value.to_string(),
            "servers.local.url" => self.servers.local.url = value.to_string(),
            "servers.local.api_key" => self.servers.local.api_key = value.to_string(),
            "servers.external.url" => self.servers.external.url = value.to_string(),
            "servers.external.api_key" => self.servers.external.api_key = value.to_string(),
            "downloads.directory" => self.downloads.directory = PathBuf::from(value),
            "logging.level" => self.logging.level = value.to_string(),
            _ => return Err(ConfigFileError::UnknownKey(key.to_string())),
        }

        self.normalize();
        Ok(())
    }
}

/// Settings file errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Serialize error: {0}")]
    Serialize(String),

    #[error("Unknown setting: {0}")]
    UnknownKey(String),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

impl ConfigFileError {
    fn invalid(key: &str, value: &str) -> Self {
        ConfigFileError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}
