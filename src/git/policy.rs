use tracing::debug;

use crate::config::settings::ConfigError;
use crate::config::{ConfigSource, is_true};
use crate::security::environment::TrustedEnvironment;

/// Environment variable that forces (or suppresses) a sync per invocation
pub const SYNC_OVERRIDE_VAR: &str = "GIT_CACHESSH_SYNC";

/// Git config key holding the persisted sync preference
pub const SYNC_SETTING_KEY: &str = "cache.ssh.sync";

/// Where a sync decision came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncSource {
    /// The override variable was set
    Override,
    /// The persisted git setting was read
    Setting,
    /// Neither was available
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncDecision {
    pub required: bool,
    pub source: SyncSource,
}

impl SyncDecision {
    /// Decision used when the persisted setting could not be read
    pub fn not_required() -> Self {
        Self {
            required: false,
            source: SyncSource::Unavailable,
        }
    }
}

/// Decides whether the mirror must be refreshed before it is served
#[derive(Debug, Clone, Copy)]
pub struct SyncPolicy {
    override_var: &'static str,
    setting_key: &'static str,
}

impl Default for SyncPolicy {
    fn default() -> Self {
        Self {
            override_var: SYNC_OVERRIDE_VAR,
            setting_key: SYNC_SETTING_KEY,
        }
    }
}

impl SyncPolicy {
    /// Evaluate the override variable first, then the persisted setting
    pub fn evaluate(
        &self,
        env: &TrustedEnvironment,
        source: &dyn ConfigSource,
    ) -> Result<SyncDecision, ConfigError> {
        if env.is_set(self.override_var) {
            let value = env.get_str(self.override_var).unwrap_or_default();
            debug!(var = self.override_var, value, "Sync override present");
            return Ok(SyncDecision {
                required: is_true(value),
                source: SyncSource::Override,
            });
        }

        let value = source.lookup(self.setting_key, env)?;
        Ok(SyncDecision {
            required: is_true(&value),
            source: SyncSource::Setting,
        })
    }
}
