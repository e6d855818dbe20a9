use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Settings file not found: {0}")]
    SettingsFileNotFound(String),

    #[error("Invalid value for {name}: '{value}' ({reason})")]
    InvalidEnvValue {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Invalid setting: {0}")]
    InvalidSetting(String),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
