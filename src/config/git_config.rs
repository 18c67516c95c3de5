use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::debug;

use crate::config::settings::ConfigError;
use crate::security::environment::TrustedEnvironment;

/// Source of persisted git settings
pub trait ConfigSource {
    /// Look up a single key, evaluated against the given environment
    fn lookup(&self, key: &str, env: &TrustedEnvironment) -> Result<String, ConfigError>;
}

/// Reads the invoking user's global git configuration through `git config`
#[derive(Debug, Clone)]
pub struct GitConfigSource {
    git_binary: PathBuf,
}

impl GitConfigSource {
    pub fn new<P: AsRef<Path>>(git_binary: P) -> Self {
        Self {
            git_binary: git_binary.as_ref().to_path_buf(),
        }
    }
}

impl ConfigSource for GitConfigSource {
    fn lookup(&self, key: &str, env: &TrustedEnvironment) -> Result<String, ConfigError> {
        let output = Command::new(&self.git_binary)
            .args(["config", "--global", "--get", key])
            .env_clear()
            .envs(env.iter())
            .stdin(Stdio::null())
            .output()
            .map_err(|e| ConfigError::LookupFailed(format!("Failed to execute git: {}", e)))?;

        match output.status.code() {
            Some(0) => {
                let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
                debug!(key, value = %value, "Read git config");
                Ok(value)
            }
            // git config exits 1 when the key is missing
            Some(1) => Err(ConfigError::NotSet(key.to_string())),
            code => Err(ConfigError::LookupFailed(format!(
                "git config exited with {:?}: {}",
                code,
                String::from_utf8_lossy(&output.stderr).trim()
            ))),
        }
    }
}
