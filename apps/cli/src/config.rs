//! CLI configuration.
//!
//! Stored as TOML at `<config dir>/platup/config.toml`. A default file is
//! written on first run.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use platup_transport::TransportConfig;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{CliError, CliErrorKind};

pub const DEFAULT_API_URL: &str = "https://mound.gllc.io";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Platform base URL.
    pub api_url: String,
    /// Skip TLS verification. Local servers only.
    pub accept_invalid_certs: bool,
    pub request_timeout_secs: u64,
    pub upload_timeout_secs: u64,
    /// Target name used in archive file names.
    pub build_target: String,
    /// Deflate archive entries.
    pub compress_builds: bool,
    /// Delete the archive and build directory after a successful upload.
    pub auto_cleanup: bool,

    pub default_app_name: String,
    pub default_description: String,
    pub default_public: bool,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.into(),
            accept_invalid_certs: false,
            request_timeout_secs: platup_transport::DEFAULT_REQUEST_TIMEOUT.as_secs(),
            upload_timeout_secs: platup_transport::DEFAULT_UPLOAD_TIMEOUT.as_secs(),
            build_target: "WebGL".into(),
            compress_builds: true,
            auto_cleanup: true,
            default_app_name: String::new(),
            default_description: String::new(),
            default_public: false,
        }
    }
}

impl CliConfig {
    /// Loads configuration from `path`, or writes and returns the default
    /// if the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = Self::default();
            config.save(path)?;
            debug!(path = %path.display(), "wrote default configuration");
            return Ok(config);
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            CliError::with_source(
                CliErrorKind::Config(format!("failed to read {}", path.display())),
                e,
            )
        })?;
        let config: CliConfig = toml::from_str(&content).map_err(|e| {
            CliError::with_source(
                CliErrorKind::Config(format!("failed to parse {}", path.display())),
                e,
            )
        })?;
        debug!(path = %path.display(), api_url = %config.api_url, "configuration loaded");
        Ok(config)
    }

    /// Saves the configuration, owner-readable only on Unix.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            upload_timeout: Duration::from_secs(self.upload_timeout_secs),
            accept_invalid_certs: self.accept_invalid_certs,
            ..TransportConfig::default()
        }
    }
}

/// `<config dir>/platup/config.toml`.
pub fn default_config_path() -> Result<PathBuf> {
    platup_session::platup_config_dir()
        .map(|d| d.join("config.toml"))
        .ok_or_else(|| {
            CliError::new(CliErrorKind::Config(
                "cannot determine the config directory; pass --config".into(),
            ))
            .into()
        })
}
