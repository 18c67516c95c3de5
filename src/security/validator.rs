use std::collections::HashSet;

use thiserror::Error;
use tracing::{debug, warn};

use crate::security::patterns::{PatternError, PatternSet};
use crate::security::{SHELL_UNSAFE_PATTERNS, TRAVERSAL_SEQUENCES, TRUSTED_GIT_COMMANDS};

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Empty command")]
    EmptyCommand,

    #[error("Unable to parse command: {0}")]
    ParseError(String),

    #[error("Expected 2 arguments (command and repository), found {0}")]
    ArityError(usize),

    #[error("Unrecognized or unauthorized command: {0}")]
    UnauthorizedCommand(String),

    #[error("Unsafe input {token:?} matched {rule}")]
    UnsafeInput { token: String, rule: String },
}

/// A command that passed every authorization check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizedCommand {
    /// Whitelisted action, e.g. `git-upload-pack`
    pub action: String,
    /// Repository reference exactly as the client supplied it
    pub reference: String,
}

/// Split a raw command line into shell words
///
/// Quoting is honoured so a path containing spaces stays one token.
/// Unbalanced quotes or a dangling escape are rejected outright.
pub fn split_command(command: &str) -> Result<Vec<String>, ValidationError> {
    if command.trim().is_empty() {
        return Err(ValidationError::EmptyCommand);
    }

    shlex::split(command).ok_or_else(|| {
        ValidationError::ParseError(format!("unbalanced quoting in {:?}", command))
    })
}

pub struct CommandValidator {
    allowed_actions: HashSet<&'static str>,
    unsafe_patterns: PatternSet,
}

impl CommandValidator {
    pub fn new() -> Result<Self, PatternError> {
        Ok(Self {
            allowed_actions: TRUSTED_GIT_COMMANDS.iter().copied().collect(),
            unsafe_patterns: PatternSet::unanchored(SHELL_UNSAFE_PATTERNS)?,
        })
    }

    /// Parse and authorize a raw command line
    pub fn validate(&self, command: &str) -> Result<AuthorizedCommand, ValidationError> {
        let tokens = split_command(command)?;
        self.authorize(tokens)
    }

    /// Authorize an already split command
    pub fn authorize(&self, tokens: Vec<String>) -> Result<AuthorizedCommand, ValidationError> {
        let [action, reference]: [String; 2] = tokens
            .try_into()
            .map_err(|tokens: Vec<String>| ValidationError::ArityError(tokens.len()))?;

        if !self.is_allowed_action(&action) {
            return Err(ValidationError::UnauthorizedCommand(action));
        }

        for token in [&action, &reference] {
            self.check_token(token)?;
        }

        debug!(action = %action, reference = %reference, "Authorized command");
        Ok(AuthorizedCommand { action, reference })
    }

    /// Check if the action is on the allowlist (exact match only)
    pub fn is_allowed_action(&self, action: &str) -> bool {
        self.allowed_actions.contains(action)
    }

    /// Reject tokens with unsafe characters or traversal sequences
    fn check_token(&self, token: &str) -> Result<(), ValidationError> {
        let rule = self
            .unsafe_patterns
            .first_match(token)
            .or_else(|| {
                TRAVERSAL_SEQUENCES
                    .iter()
                    .copied()
                    .find(|sequence| token.contains(sequence))
            });

        match rule {
            Some(rule) => {
                warn!(token = %token, rule = %rule, "Token matched unsafe input rule");
                Err(ValidationError::UnsafeInput {
                    token: token.to_string(),
                    rule: rule.to_string(),
                })
            }
            None => Ok(()),
        }
    }
}
