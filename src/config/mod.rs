//! Configuration management.
//!
//! [`BackendConfig`] is the immutable snapshot handed to every search and
//! download call. It is usually derived from the persisted [`SettingsFile`],
//! which the library itself never reads behind the caller's back.

mod file_config;

pub use file_config::{
    BackendSection, ConfigFileError, DownloadsSection, LoggingSection, ServerEntry,
    ServersSection, SettingsFile,
};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Public arXiv query endpoint used in direct mode
pub const DEFAULT_ARXIV_API_URL: &str = "https://export.arxiv.org/api/query";
/// Default relay server on the local network
pub const DEFAULT_LOCAL_SERVER_URL: &str = "http://127.0.0.1:5000";
/// Placeholder relay server on an external network
pub const DEFAULT_EXTERNAL_SERVER_URL: &str = "http://example.com:80";
/// Default request timeout in seconds
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
/// Default pause between consecutive downloads in milliseconds
pub const DEFAULT_REQUEST_DELAY_MS: u64 = 1000;
/// Prefix for environment variable overrides (`PAPER_RELAY__BACKEND__MODE=direct`)
pub const ENV_PREFIX: &str = "PAPER_RELAY";

/// Which backend answers searches and downloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendMode {
    /// Call the public arXiv API directly
    Direct,
    /// Call a private relay server exposing `/search` and `/download`
    #[default]
    Proxied,
}

impl std::fmt::Display for BackendMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendMode::Direct => f.write_str("direct"),
            BackendMode::Proxied => f.write_str("proxied"),
        }
    }
}

/// Which relay server entry is active in proxied mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkProfile {
    #[default]
    Local,
    External,
}

impl std::fmt::Display for NetworkProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetworkProfile::Local => f.write_str("local"),
            NetworkProfile::External => f.write_str("external"),
        }
    }
}

/// Immutable backend snapshot for one orchestration call
///
/// The API key is always empty in direct mode; the constructors are the only
/// way to build a value, so this holds for every instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    mode: BackendMode,
    network_profile: NetworkProfile,
    base_url: String,
    api_key: String,
    timeout_seconds: u64,
    request_delay_ms: u64,
}

impl BackendConfig {
    /// Direct mode against the public arXiv endpoint
    pub fn direct() -> Self {
        Self::direct_with_endpoint(DEFAULT_ARXIV_API_URL)
    }

    /// Direct mode against a custom query endpoint (mirrors, test servers)
    pub fn direct_with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            mode: BackendMode::Direct,
            network_profile: NetworkProfile::default(),
            base_url: endpoint.into(),
            api_key: String::new(),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            request_delay_ms: DEFAULT_REQUEST_DELAY_MS,
        }
    }

    /// Proxied mode against a relay server
    pub fn proxied(
        network_profile: NetworkProfile,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            mode: BackendMode::Proxied,
            network_profile,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into().trim().to_string(),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            request_delay_ms: DEFAULT_REQUEST_DELAY_MS,
        }
    }

    /// Set the request timeout (at least one second)
    pub fn with_timeout_seconds(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds.max(1);
        self
    }

    /// Set the pause between consecutive downloads
    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn mode(&self) -> BackendMode {
        self.mode
    }

    pub fn network_profile(&self) -> NetworkProfile {
        self.network_profile
    }

    /// Query endpoint (direct) or relay server root (proxied)
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// API key, empty when none is configured
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn timeout_seconds(&self) -> u64 {
        self.timeout_seconds
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    /// Human-readable backend description for status lines
    pub fn describe(&self) -> String {
        match self.mode {
            BackendMode::Direct => format!("direct ({})", self.base_url),
            BackendMode::Proxied => {
                format!("proxied, {} network ({})", self.network_profile, self.base_url)
            }
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        SettingsFile::default().backend_config()
    }
}

/// Load settings from a file (if it exists) layered with environment overrides
pub fn load_config(path: &Path) -> Result<SettingsFile, config::ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::from(path).required(false))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let mut file: SettingsFile = settings.try_deserialize()?;
    file.normalize();
    Ok(file)
}

/// Default location of the settings file
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("paper-relay")
        .join("config.toml")
}

/// Find an existing settings file in the usual locations
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("paper-relay.toml");
    if local.is_file() {
        return Some(local);
    }

    let default = default_config_path();
    default.is_file().then_some(default)
}
