use std::path::PathBuf;

use nix::unistd::{self, Uid, User};
use thiserror::Error;
use tracing::{debug, info};

use crate::security::environment::TrustedEnvironment;

/// Numeric id of the superuser
pub const ROOT_UID: u32 = 0;

const ROOT_HOME: &str = "/root";
const ROOT_USER: &str = "root";

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("No passwd entry for uid {0}")]
    UnknownUid(u32),

    #[error("Identity lookup for uid {uid} failed: {source}")]
    Lookup {
        uid: u32,
        #[source]
        source: nix::Error,
    },

    #[error("Failed to set real, effective and saved uid to {uid}: {source}")]
    Commit {
        uid: u32,
        #[source]
        source: nix::Error,
    },
}

/// Account details for a numeric user id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub username: String,
    pub home: PathBuf,
}

/// Resolves a numeric user id to an account
pub trait IdentityResolver {
    fn lookup(&self, uid: u32) -> Result<Identity, IdentityError>;
}

/// Looks identities up in the system user database
#[derive(Debug, Default, Clone, Copy)]
pub struct PasswdResolver;

impl IdentityResolver for PasswdResolver {
    fn lookup(&self, uid: u32) -> Result<Identity, IdentityError> {
        match User::from_uid(Uid::from_raw(uid)) {
            Ok(Some(user)) => Ok(Identity {
                username: user.name,
                home: user.dir,
            }),
            Ok(None) => Err(IdentityError::UnknownUid(uid)),
            Err(source) => Err(IdentityError::Lookup { uid, source }),
        }
    }
}

/// Access to the process's real and effective user ids
pub trait Credentials {
    fn real_uid(&self) -> u32;
    fn effective_uid(&self) -> u32;

    /// Set the real, effective and saved ids to `uid`. There is no way back.
    fn commit(&self, uid: u32) -> Result<(), IdentityError>;
}

/// Credentials of the running process
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessCredentials;

impl Credentials for ProcessCredentials {
    fn real_uid(&self) -> u32 {
        unistd::getuid().as_raw()
    }

    fn effective_uid(&self) -> u32 {
        unistd::geteuid().as_raw()
    }

    fn commit(&self, uid: u32) -> Result<(), IdentityError> {
        let target = Uid::from_raw(uid);
        // The saved id goes too, so root cannot be regained later
        unistd::setresuid(target, target, target)
            .map_err(|source| IdentityError::Commit { uid, source })
    }
}

/// Identity the gateway settled on when running with elevated privileges
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityContext {
    pub effective_uid: u32,
    pub home: Option<PathBuf>,
    pub username: Option<String>,
}

/// Normalises identity when the gateway runs setuid
pub struct PrivilegeAdapter<'a> {
    resolver: &'a dyn IdentityResolver,
    credentials: &'a dyn Credentials,
}

impl<'a> PrivilegeAdapter<'a> {
    pub fn new(resolver: &'a dyn IdentityResolver, credentials: &'a dyn Credentials) -> Self {
        Self {
            resolver,
            credentials,
        }
    }

    /// Work out which identity to adopt, without changing anything
    ///
    /// Returns `None` when the real and effective ids already agree.
    pub fn resolve(&self) -> Option<IdentityContext> {
        let euid = self.credentials.effective_uid();
        if euid == self.credentials.real_uid() {
            return None;
        }

        let context = match self.resolver.lookup(euid) {
            Ok(identity) => IdentityContext {
                effective_uid: euid,
                home: Some(identity.home),
                username: Some(identity.username),
            },
            Err(err) if euid == ROOT_UID => {
                debug!(error = %err, "Falling back to superuser defaults");
                IdentityContext {
                    effective_uid: euid,
                    home: Some(PathBuf::from(ROOT_HOME)),
                    username: Some(ROOT_USER.to_string()),
                }
            }
            Err(err) => {
                debug!(error = %err, euid, "Leaving HOME and USER unset");
                IdentityContext {
                    effective_uid: euid,
                    home: None,
                    username: None,
                }
            }
        };

        Some(context)
    }

    /// Adjust the environment for the effective identity and commit to it
    ///
    /// When the ids differ, `HOME` and `USER` are replaced (or dropped when
    /// the identity could not be resolved) and the real id is set to the
    /// effective id.
    pub fn adapt(
        &self,
        env: TrustedEnvironment,
    ) -> Result<(TrustedEnvironment, Option<IdentityContext>), IdentityError> {
        let Some(context) = self.resolve() else {
            return Ok((env, None));
        };

        let env = match (&context.home, &context.username) {
            (Some(home), Some(username)) => env
                .with_var("HOME", home.as_os_str())
                .with_var("USER", username.as_str()),
            _ => env.without("HOME").without("USER"),
        };

        self.credentials.commit(context.effective_uid)?;
        info!(
            uid = context.effective_uid,
            user = context.username.as_deref().unwrap_or("unknown"),
            "Committed to effective identity"
        );

        Ok((env, Some(context)))
    }
}
