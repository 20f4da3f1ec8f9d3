//! Session configuration
//!
//! Handles loading and validating the startup configuration: device
//! descriptor, API hostnames, initial versions, key material and optional
//! identifiers carried over from an earlier install.

use crate::error::{ClientError, Result};
use crate::session::{Device, Domains, Versions};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub mod defaults;

pub use defaults::*;

/// Hex-encoded payload key and IV
#[derive(Clone, Serialize, Deserialize)]
pub struct CryptoConfig {
    /// AES key, hex
    pub key: String,
    /// CBC initialization vector, hex
    pub iv: String,
}

impl std::fmt::Debug for CryptoConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CryptoConfig").finish_non_exhaustive()
    }
}

/// HTTP client tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Whole-request timeout in seconds
    #[serde(default = "defaults::default_timeout")]
    pub timeout_secs: u64,

    /// Connect timeout in seconds
    #[serde(default = "defaults::default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

/// Startup configuration of one client session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Device descriptor
    pub device: Device,

    /// API hostnames
    pub domains: Domains,

    /// Initial client versions
    pub versions: Versions,

    /// Payload key material
    pub crypto: CryptoConfig,

    /// Installation id; generated when absent
    #[serde(default)]
    pub install_id: Option<String>,

    /// Client id; generated when absent
    #[serde(default)]
    pub client_id: Option<String>,

    /// Session token from an earlier run
    #[serde(default)]
    pub session_token: Option<String>,

    /// HTTP tuning
    #[serde(default)]
    pub http: HttpConfig,
}

impl SessionConfig {
    /// Load configuration from the default location
    ///
    /// Tries in order:
    /// 1. `SEKAI_CLIENT_CONFIG`
    /// 2. `$XDG_CONFIG_HOME/sekai-client/session.toml`
    /// 3. `~/.config/sekai-client/session.toml`
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| ClientError::ConfigRead {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self =
            toml::from_str(&contents).map_err(|e| ClientError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Get the path to the config file
    pub fn config_path() -> Result<PathBuf> {
        if let Some(path) = std::env::var_os("SEKAI_CLIENT_CONFIG").filter(|p| !p.is_empty()) {
            return Ok(PathBuf::from(path));
        }

        let config_home = std::env::var("XDG_CONFIG_HOME")
            .ok()
            .and_then(|path| if path.is_empty() { None } else { Some(PathBuf::from(path)) })
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")));

        config_home
            .ok_or_else(|| {
                ClientError::InvalidConfig(
                    "Could not determine config directory: XDG_CONFIG_HOME not set and no home directory found"
                        .to_string(),
                )
            })
            .map(|path| path.join("sekai-client").join("session.toml"))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("device.platform", &self.device.platform),
            ("device.device_model", &self.device.device_model),
            ("device.operating_system", &self.device.operating_system),
            ("domains.signature", &self.domains.signature),
            ("domains.api", &self.domains.api),
            ("versions.app_version", &self.versions.app_version),
            ("crypto.key", &self.crypto.key),
            ("crypto.iv", &self.crypto.iv),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(ClientError::InvalidConfig(format!("{name} cannot be empty")));
            }
        }

        if !matches!(self.domains.scheme.as_str(), "http" | "https") {
            return Err(ClientError::InvalidConfig(format!(
                "domains.scheme must be http or https, got {}",
                self.domains.scheme
            )));
        }

        if self.http.timeout_secs == 0 || self.http.connect_timeout_secs == 0 {
            return Err(ClientError::InvalidConfig(
                "http timeouts must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
