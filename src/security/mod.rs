pub mod environment;
pub mod patterns;
pub mod privilege;
pub mod validator;

pub use environment::{EnvironmentSanitizer, TrustedEnvironment};
pub use patterns::{PatternError, PatternSet};
pub use privilege::{
    Credentials, Identity, IdentityContext, IdentityError, IdentityResolver, PasswdResolver,
    PrivilegeAdapter, ProcessCredentials,
};
pub use validator::{split_command, AuthorizedCommand, CommandValidator, ValidationError};

/// Variable sshd uses to hand over the client's requested command when a
/// ForceCommand is configured.
pub const ORIGINAL_COMMAND_VAR: &str = "SSH_ORIGINAL_COMMAND";

/// Allowlist of commands a client may run through the gateway
///
/// Only read-only pack protocol endpoints belong here. Adding an entry
/// requires careful security review.
pub const TRUSTED_GIT_COMMANDS: &[&str] = &[
    "git-upload-pack",    // git clone / fetch
    "git-upload-archive", // git archive
];

/// Environment variable names that survive sanitisation
///
/// Entries are regular expressions matched against the whole name.
pub const TRUSTED_ENVIRONMENT: &[&str] = &[
    "SSH_ORIGINAL_COMMAND",       // Set by sshd when ForceCommand is set
    "GIT_CACHESSH_[a-zA-Z0-9_]+", // Gateway toggles
    "GIT_TRACE",                  // Verbose git and gateway logging
    "GIT_CONFIG",                 // Location of the git config file
    "USER",
    "HOME",
];

/// Patterns that reject a command token when they match anywhere in it
pub const SHELL_UNSAFE_PATTERNS: &[&str] = &[
    r#"[^@a-zA-Z0-9 /:.,_'"-]"#, // Anything outside the safe character set
    r"[$;`!|]",                 // Shell sigils and flow control
];

/// Substrings that indicate a path traversal attempt
pub const TRAVERSAL_SEQUENCES: &[&str] = &["../", "..\\"];
