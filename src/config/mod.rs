pub mod git_config;
pub mod settings;

pub use git_config::{ConfigSource, GitConfigSource};
pub use settings::{AuditSettings, ConfigError, Settings, DEFAULT_SETTINGS_PATH};

/// Test a string for truthiness
///
/// Accepts the usual boolean spellings (`1`, `t`, `true`, ...) and any
/// positive integer that fits in an `i8`.
pub fn is_true(value: &str) -> bool {
    match value {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => true,
        "0" | "f" | "F" | "FALSE" | "false" | "False" => false,
        other => other.parse::<i8>().is_ok_and(|n| n > 0),
    }
}
