use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};

use tracing::debug;

use crate::security::patterns::{PatternError, PatternSet};
use crate::security::TRUSTED_ENVIRONMENT;

/// Immutable snapshot of the environment variables the gateway trusts
///
/// Built once by [`EnvironmentSanitizer`] and threaded through the pipeline.
/// Later stages derive adjusted copies instead of touching process state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrustedEnvironment {
    vars: BTreeMap<String, OsString>,
}

impl TrustedEnvironment {
    pub fn get(&self, name: &str) -> Option<&OsStr> {
        self.vars.get(name).map(OsString::as_os_str)
    }

    /// Value as UTF-8, `None` when unset or not valid UTF-8
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(OsStr::to_str)
    }

    /// True when the variable is present with a non-empty value
    pub fn is_set(&self, name: &str) -> bool {
        self.get(name).is_some_and(|value| !value.is_empty())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.vars.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OsStr)> {
        self.vars
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_os_str()))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Copy of this environment with `name` set to `value`
    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<OsString>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    /// Copy of this environment with `name` removed
    pub fn without(mut self, name: &str) -> Self {
        self.vars.remove(name);
        self
    }

    /// Replace the process environment with this snapshot
    ///
    /// # Safety
    ///
    /// Mutating the process environment is only sound while no other thread
    /// may read or write it. Call this from `main` before spawning anything.
    pub unsafe fn install(&self) {
        let stale: Vec<OsString> = std::env::vars_os()
            .map(|(name, _)| name)
            .filter(|name| name.to_str().is_none_or(|name| !self.contains(name)))
            .collect();

        for name in stale {
            // SAFETY: upheld by the caller.
            unsafe { std::env::remove_var(&name) };
        }
        for (name, value) in &self.vars {
            // SAFETY: upheld by the caller.
            unsafe { std::env::set_var(name, value) };
        }
    }
}

/// Reduces an ambient environment to the trusted allowlist
#[derive(Debug, Clone)]
pub struct EnvironmentSanitizer {
    trusted: PatternSet,
    safe_path: String,
}

impl EnvironmentSanitizer {
    /// Create a sanitizer using the built-in allowlist
    pub fn new(safe_path: impl Into<String>) -> Result<Self, PatternError> {
        Self::with_trusted(TRUSTED_ENVIRONMENT, safe_path)
    }

    pub fn with_trusted(
        trusted_names: &[&str],
        safe_path: impl Into<String>,
    ) -> Result<Self, PatternError> {
        Ok(Self {
            trusted: PatternSet::anchored(trusted_names)?,
            safe_path: safe_path.into(),
        })
    }

    /// Check if a variable name is on the allowlist
    pub fn is_trusted(&self, name: &str) -> bool {
        self.trusted.is_match(name)
    }

    /// Keep only trusted variables, then pin `PATH` to the safe value
    pub fn sanitize<I, K, V>(&self, vars: I) -> TrustedEnvironment
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<OsString>,
        V: Into<OsString>,
    {
        let mut kept = BTreeMap::new();
        let mut dropped = 0usize;

        for (name, value) in vars {
            // Names that are not UTF-8 can never match the allowlist
            match name.into().into_string() {
                Ok(name) if self.is_trusted(&name) => {
                    debug!(name = %name, "Keeping trusted environment variable");
                    kept.insert(name, value.into());
                }
                _ => dropped += 1,
            }
        }

        kept.insert("PATH".to_string(), OsString::from(&self.safe_path));
        debug!(kept = kept.len(), dropped, "Sanitized environment");

        TrustedEnvironment { vars: kept }
    }
}
