//! TOML-based configuration persistence for the hub.
//!
//! Reads and writes [`HubConfig`] to the platform-appropriate config file:
//! - Windows:  `%APPDATA%\VentoHub\config.toml`
//! - Linux:    `~/.config/ventohub/config.toml`
//! - macOS:    `~/Library/Application Support/VentoHub/config.toml`
//!
//! Fields annotated with `#[serde(default = "some_fn")]` fall back to the
//! vendor defaults when absent, so the hub works on first run (before a
//! config file exists) and when upgrading from an older file missing newer
//! fields.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use vento_core::{Credentials, DeviceId, BROADCAST_HOST, DEFAULT_DEVICE_PORT, UNASSIGNED_DEVICE_ID};

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level hub configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct HubConfig {
    #[serde(default)]
    pub hub: HubSection,
    #[serde(default)]
    pub device: DeviceSection,
    #[serde(default)]
    pub poll: PollSection,
}

/// General hub behaviour settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HubSection {
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// The device the hub is configured against.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceSection {
    /// Explicit device host, or `"<broadcast>"` to discover one at setup.
    #[serde(default = "default_address")]
    pub address: String,
    /// UDP port the device listens on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Device id, or the factory placeholder when not known in advance.
    #[serde(default = "default_device_id")]
    pub device_id: String,
    /// Device password.  The vendor factory default is `"1111"`.
    #[serde(default = "default_password")]
    pub password: String,
    /// Base display name; the resolved id is appended after setup.
    #[serde(default = "default_name")]
    pub name: String,
}

/// Poll-loop timing settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PollSection {
    /// Seconds between refresh ticks.
    #[serde(default = "default_update_interval")]
    pub update_interval_secs: u64,
    /// Deadline in seconds for one handshake or refresh exchange.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// How long broadcast discovery collects answers, in seconds.
    #[serde(default = "default_discovery_window")]
    pub discovery_window_secs: u64,
}

impl DeviceSection {
    /// The operator credentials this section describes.
    pub fn credentials(&self) -> Credentials {
        Credentials {
            device_id: DeviceId::new(self.device_id.clone()),
            password: self.password.clone(),
            name: self.name.clone(),
        }
    }
}

impl PollSection {
    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn discovery_window(&self) -> Duration {
        Duration::from_secs(self.discovery_window_secs)
    }
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_address() -> String {
    BROADCAST_HOST.to_string()
}
fn default_port() -> u16 {
    DEFAULT_DEVICE_PORT
}
fn default_device_id() -> String {
    UNASSIGNED_DEVICE_ID.to_string()
}
fn default_password() -> String {
    "1111".to_string()
}
fn default_name() -> String {
    "Vento Expert Fan".to_string()
}
fn default_update_interval() -> u64 {
    60
}
fn default_request_timeout() -> u64 {
    10
}
fn default_discovery_window() -> u64 {
    3
}

impl Default for HubSection {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for DeviceSection {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: default_port(),
            device_id: default_device_id(),
            password: default_password(),
            name: default_name(),
        }
    }
}

impl Default for PollSection {
    fn default() -> Self {
        Self {
            update_interval_secs: default_update_interval(),
            request_timeout_secs: default_request_timeout(),
            discovery_window_secs: default_discovery_window(),
        }
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot
/// be determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads [`HubConfig`] from disk, returning `HubConfig::default()` if the
/// file does not yet exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config() -> Result<HubConfig, ConfigError> {
    let path = config_file_path()?;

    match std::fs::read_to_string(&path) {
        Ok(content) => {
            let cfg: HubConfig = toml::from_str(&content)?;
            Ok(cfg)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HubConfig::default()),
        Err(e) => Err(ConfigError::Io { path, source: e }),
    }
}

/// Persists `config` to disk, creating the config directory if needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config(config: &HubConfig) -> Result<(), ConfigError> {
    let path = config_file_path()?;

    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(&path, content).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    Ok(())
}

/// Resolves the platform config base directory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("VentoHub"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("ventohub"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("VentoHub")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
