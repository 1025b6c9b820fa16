//! Configuration management for idmctl
//!
//! This module handles loading, validating, and saving the YAML document that
//! holds the stored targets, the current target selection, and client
//! settings. Environment variables and CLI flags override file settings.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::auth::catcher::DEFAULT_CALLBACK_PORT;
use crate::error::{IdmError, Result};
use crate::session::{DisplayStyle, DEFAULT_MEDIA_PREFIX};
use crate::target::{Target, Targets};

/// Environment variable naming the config file.
pub const CONFIG_ENV_VAR: &str = "IDMCTL_CONFIG";

/// Main configuration structure for idmctl
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Name of the selected target
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_target: Option<String>,

    /// Stored targets by name
    #[serde(default)]
    pub targets: Targets,

    /// Client behavior settings
    #[serde(default)]
    pub settings: Settings,
}

/// Client behavior settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Rendering of structured output
    #[serde(default)]
    pub output: DisplayStyle,

    /// Log every HTTP request and response
    #[serde(default)]
    pub trace: bool,

    /// Local port for the authorization-code redirect catcher
    #[serde(default = "default_callback_port")]
    pub callback_port: u16,

    /// Upper bound on waiting for the browser redirect; unset waits forever
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_timeout_seconds: Option<u64>,

    /// Vendor prefix for media-type shorthands
    #[serde(default = "default_media_prefix")]
    pub media_prefix: String,
}

fn default_callback_port() -> u16 {
    DEFAULT_CALLBACK_PORT
}

fn default_media_prefix() -> String {
    DEFAULT_MEDIA_PREFIX.to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output: DisplayStyle::default(),
            trace: false,
            callback_port: default_callback_port(),
            authorization_timeout_seconds: None,
            media_prefix: default_media_prefix(),
        }
    }
}

impl Settings {
    /// Redirect wait as a duration.
    pub fn authorization_timeout(&self) -> Option<Duration> {
        self.authorization_timeout_seconds.map(Duration::from_secs)
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &Path, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if path.exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path.display());
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    /// Reads and parses a config file without applying overrides.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| IdmError::Config(format!("Failed to read config file: {}", e)))?;
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&contents)
            .map_err(|e| IdmError::Config(format!("Failed to parse config: {}", e)).into())
    }

    /// Writes the configuration back as YAML, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        tracing::debug!("Saved configuration to {}", path.display());
        Ok(())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(output) = std::env::var("IDMCTL_OUTPUT") {
            match output.parse::<DisplayStyle>() {
                Ok(style) => {
                    self.settings.output = style;
                    tracing::debug!(output = %output, "Env override: IDMCTL_OUTPUT");
                }
                Err(_) => tracing::warn!("Invalid value for IDMCTL_OUTPUT: {}", output),
            }
        }

        if let Ok(trace) = std::env::var("IDMCTL_TRACE") {
            match trace.parse::<bool>() {
                Ok(v) => {
                    self.settings.trace = v;
                    tracing::debug!(trace = v, "Env override: IDMCTL_TRACE");
                }
                Err(_) => tracing::warn!("Invalid value for IDMCTL_TRACE: {}", trace),
            }
        }

        if let Ok(port) = std::env::var("IDMCTL_CALLBACK_PORT") {
            match port.parse::<u16>() {
                Ok(v) => {
                    self.settings.callback_port = v;
                    tracing::debug!(callback_port = v, "Env override: IDMCTL_CALLBACK_PORT");
                }
                Err(_) => tracing::warn!("Invalid value for IDMCTL_CALLBACK_PORT: {}", port),
            }
        }

        if let Ok(timeout) = std::env::var("IDMCTL_AUTH_TIMEOUT") {
            match timeout.parse::<u64>() {
                Ok(v) => {
                    self.settings.authorization_timeout_seconds = Some(v);
                    tracing::debug!(timeout = v, "Env override: IDMCTL_AUTH_TIMEOUT");
                }
                Err(_) => tracing::warn!("Invalid value for IDMCTL_AUTH_TIMEOUT: {}", timeout),
            }
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if cli.trace {
            self.settings.trace = true;
        }
        if let Some(output) = cli.output {
            self.settings.output = output;
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns error if the current target is dangling, the callback port is
    /// zero, or the media prefix is empty
    pub fn validate(&self) -> Result<()> {
        if let Some(current) = &self.current_target {
            if !self.targets.contains_key(current) {
                return Err(IdmError::Config(format!(
                    "current target '{}' is not a stored target",
                    current
                ))
                .into());
            }
        }

        if self.settings.callback_port == 0 {
            return Err(
                IdmError::Config("settings.callback_port must be greater than 0".to_string())
                    .into(),
            );
        }

        if self.settings.media_prefix.trim().is_empty() {
            return Err(
                IdmError::Config("settings.media_prefix cannot be empty".to_string()).into(),
            );
        }

        Ok(())
    }

    /// The selected target and its name.
    ///
    /// # Errors
    ///
    /// Returns [`IdmError::NoCurrentTarget`] when none is selected.
    pub fn current(&self) -> Result<(&str, &Target)> {
        let name = self
            .current_target
            .as_deref()
            .ok_or(IdmError::NoCurrentTarget)?;
        let target = self
            .targets
            .get(name)
            .ok_or_else(|| IdmError::TargetNotFound(name.to_string()))?;
        Ok((name, target))
    }

    /// Mutable access to the selected target.
    pub fn current_mut(&mut self) -> Result<&mut Target> {
        let name = self
            .current_target
            .clone()
            .ok_or(IdmError::NoCurrentTarget)?;
        self.targets
            .get_mut(&name)
            .ok_or_else(|| IdmError::TargetNotFound(name).into())
    }
}

/// Where the config file lives when no path is given.
///
/// Order: `$IDMCTL_CONFIG`, then the platform config directory, then
/// `.idmctl.yaml` in the working directory.
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        return PathBuf::from(path);
    }
    directories::ProjectDirs::from("", "", "idmctl")
        .map(|dirs| dirs.config_dir().join("config.yaml"))
        .unwrap_or_else(|| PathBuf::from(".idmctl.yaml"))
}
