use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Fixed location of the gateway settings file
///
/// Deliberately not overridable from the environment.
pub const DEFAULT_SETTINGS_PATH: &str = "/etc/gitcache-ssh/config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid config value: {0}")]
    InvalidValue(String),

    #[error("Git config key {0} is not set")]
    NotSet(String),

    #[error("Git config lookup failed: {0}")]
    LookupFailed(String),
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Directory holding every mirror
    pub cache_root: PathBuf,
    /// Host that bare repository paths are qualified against
    pub default_remote_host: String,
    /// Git binary used for mirror synchronisation and config lookups
    pub git_binary: PathBuf,
    /// Directory used to qualify the dispatched action
    pub git_binary_dir: PathBuf,
    /// `PATH` value installed by the environment sanitizer
    pub safe_path: String,
    pub audit: AuditSettings,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct AuditSettings {
    pub enabled: bool,
    pub log_path: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            cache_root: PathBuf::from("/var/cache/git"),
            default_remote_host: "github.com".to_string(),
            git_binary: PathBuf::from("/usr/bin/git"),
            git_binary_dir: PathBuf::from("/usr/bin"),
            safe_path: "/usr/bin:/bin".to_string(),
            audit: AuditSettings::default(),
        }
    }
}

impl Default for AuditSettings {
    fn default() -> Self {
        AuditSettings {
            enabled: true,
            log_path: PathBuf::from("/var/log/gitcache-ssh/audit.log"),
        }
    }
}

impl Settings {
    /// Load settings from the fixed settings path
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(DEFAULT_SETTINGS_PATH)
    }

    /// Load settings from `path`, falling back to defaults when it is absent
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&contents)?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate settings values
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, path) in [
            ("cache_root", &self.cache_root),
            ("git_binary", &self.git_binary),
            ("git_binary_dir", &self.git_binary_dir),
        ] {
            if !path.is_absolute() {
                return Err(ConfigError::InvalidValue(format!(
                    "{} must be an absolute path, got {}",
                    name,
                    path.display()
                )));
            }
        }

        let host = &self.default_remote_host;
        if host.is_empty()
            || !host
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
            || host.starts_with('.')
        {
            return Err(ConfigError::InvalidValue(format!(
                "default_remote_host must be a plain hostname, got {:?}",
                host
            )));
        }

        if self.safe_path.is_empty() {
            return Err(ConfigError::InvalidValue(
                "safe_path must not be empty".to_string(),
            ));
        }

        if self.audit.enabled && !self.audit.log_path.is_absolute() {
            return Err(ConfigError::InvalidValue(
                "audit.log_path must be an absolute path".to_string(),
            ));
        }

        Ok(())
    }
}
