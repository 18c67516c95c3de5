use std::path::PathBuf;
use thiserror::Error;

// Import module-level errors for GatewayError
use crate::config::settings::ConfigError;
use crate::git::dispatch::DispatchError;
use crate::git::locator::ResolutionError;
use crate::git::sync::SyncError;
use crate::security::patterns::PatternError;
use crate::security::privilege::IdentityError;
use crate::security::validator::ValidationError;

/// Top-level gateway error that wraps all module-specific errors
///
/// Every stage of the pipeline reports through its own error type; they all
/// convert into `GatewayError` via `From` so the driver has a single place to
/// turn a failure into a diagnostic and an exit status.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Rejected command: {0}")]
    Validation(#[from] ValidationError),

    #[error("Invalid built-in pattern: {0}")]
    Pattern(#[from] PatternError),

    #[error("Unable to resolve repository: {0}")]
    Resolution(#[from] ResolutionError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),

    #[error("Cache synchronisation error: {0}")]
    Sync(#[from] SyncError),

    #[error("Cached repository {} is unavailable", .0.display())]
    CacheUnavailable(PathBuf),

    #[error("Dispatch failed: {0}")]
    Dispatch(#[from] DispatchError),
}

impl GatewayError {
    /// True when the failure was caused by the client's command rather than
    /// by the host the gateway runs on.
    pub fn is_input_error(&self) -> bool {
        matches!(self, GatewayError::Validation(_) | GatewayError::Resolution(_))
    }
}

/// Result type for gateway-level operations
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;
