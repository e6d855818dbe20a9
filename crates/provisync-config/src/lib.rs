pub mod error;

pub use error::*;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Environment variable naming a settings file directly
pub const SETTINGS_PATH_ENV: &str = "PROVISYNC_SETTINGS";

pub const RETRY_DELAY_ENV: &str = "MCP_RETRY_DELAY";
pub const RETRY_TIMEOUT_ENV: &str = "MCP_RETRY_TIMEOUT";
pub const ALLOW_SERVER_REBOOT_ENV: &str = "MCP_ALLOW_SERVER_REBOOT";

/// Provider settings. All durations are whole seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// Delay between retries of operations rejected as busy
    pub retry_delay: u64,

    /// Overall bound on retrying a single operation
    pub retry_timeout: u64,

    /// How long to wait for a server to finish applying a sub-resource change
    pub server_update_timeout: u64,

    /// How long to wait for a server to shut down or start
    pub server_shutdown_timeout: u64,

    /// How long to wait for backup status to return to normal
    pub backup_timeout: u64,

    /// Allow servers to be stopped and restarted to apply changes
    pub allow_server_reboot: bool,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            retry_delay: 30,
            retry_timeout: 10 * 60,
            server_update_timeout: 10 * 60,
            server_shutdown_timeout: 5 * 60,
            backup_timeout: 15 * 60,
            allow_server_reboot: true,
        }
    }
}

impl ProviderSettings {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay)
    }

    pub fn retry_timeout(&self) -> Duration {
        Duration::from_secs(self.retry_timeout)
    }

    pub fn server_update_timeout(&self) -> Duration {
        Duration::from_secs(self.server_update_timeout)
    }

    pub fn server_shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server_shutdown_timeout)
    }

    pub fn backup_timeout(&self) -> Duration {
        Duration::from_secs(self.backup_timeout)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let settings: ProviderSettings = serde_yaml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Override settings from `MCP_*` environment variables.
    ///
    /// A value that is set but does not parse is an error rather than being
    /// skipped, so a typo cannot silently fall back to the default.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(value) = env_value::<u64>(RETRY_DELAY_ENV)? {
            tracing::debug!("{} overrides retry_delay: {}", RETRY_DELAY_ENV, value);
            self.retry_delay = value;
        }
        if let Some(value) = env_value::<u64>(RETRY_TIMEOUT_ENV)? {
            tracing::debug!("{} overrides retry_timeout: {}", RETRY_TIMEOUT_ENV, value);
            self.retry_timeout = value;
        }
        if let Some(value) = env_value::<bool>(ALLOW_SERVER_REBOOT_ENV)? {
            tracing::debug!(
                "{} overrides allow_server_reboot: {}",
                ALLOW_SERVER_REBOOT_ENV,
                value
            );
            self.allow_server_reboot = value;
        }

        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        if self.retry_delay == 0 {
            return Err(ConfigError::InvalidSetting(
                "retry_delay must be at least 1 second".to_string(),
            ));
        }
        if self.retry_timeout < self.retry_delay {
            return Err(ConfigError::InvalidSetting(format!(
                "retry_timeout ({}s) must not be shorter than retry_delay ({}s)",
                self.retry_timeout, self.retry_delay
            )));
        }
        Ok(())
    }
}

fn env_value<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) if raw.trim().is_empty() => Ok(None),
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidEnvValue {
                name: name.to_string(),
                value: raw.clone(),
                reason: e.to_string(),
            }),
        Err(_) => Ok(None),
    }
}

/// Default location of the settings file (`<config dir>/provisync/settings.yaml`)
pub fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("provisync").join("settings.yaml"))
}

/// Find the settings file to load, if any.
///
/// 1. `PROVISYNC_SETTINGS` (must exist when set)
/// 2. `<config dir>/provisync/settings.yaml`
pub fn find_settings_file() -> Result<Option<PathBuf>> {
    if let Ok(path) = std::env::var(SETTINGS_PATH_ENV) {
        let path = PathBuf::from(path);
        if !path.exists() {
            return Err(ConfigError::SettingsFileNotFound(path.display().to_string()));
        }
        return Ok(Some(path));
    }

    Ok(default_settings_path().filter(|path| path.exists()))
}

/// Load settings: defaults, then the settings file, then environment overrides.
///
/// An explicit `path` takes precedence over file discovery and must exist.
pub fn load_settings(path: Option<&Path>) -> Result<ProviderSettings> {
    let file = match path {
        Some(path) if !path.exists() => {
            return Err(ConfigError::SettingsFileNotFound(path.display().to_string()));
        }
        Some(path) => Some(path.to_path_buf()),
        None => find_settings_file()?,
    };

    let mut settings = match file {
        Some(file) => {
            tracing::debug!("Loading provider settings from {}", file.display());
            let content = std::fs::read_to_string(&file)?;
            ProviderSettings::from_yaml_str(&content)?
        }
        None => ProviderSettings::default(),
    };

    settings.apply_env_overrides()?;
    Ok(settings)
}
