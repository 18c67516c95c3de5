//! The authorization and dispatch pipeline
//!
//! Runs every stage that decides what the gateway will become and returns a
//! [`DispatchRequest`]. Replacing the process is left to the caller so the
//! whole decision can be exercised without side effects beyond the cache.

use std::ffi::OsStr;

use tracing::{debug, error, info, warn};

use crate::audit::AuditLogger;
use crate::config::{ConfigSource, Settings};
use crate::error::{GatewayError, GatewayResult};
use crate::git::dispatch::DispatchRequest;
use crate::git::policy::{SyncDecision, SyncPolicy};
use crate::git::resolver::{RepositoryResolver, ResolvedRepository};
use crate::git::sync::Synchronizer;
use crate::security::environment::TrustedEnvironment;
use crate::security::privilege::{Credentials, IdentityResolver, PrivilegeAdapter};
use crate::security::validator::{AuthorizedCommand, CommandValidator, ValidationError};
use crate::security::ORIGINAL_COMMAND_VAR;

/// External collaborators the pipeline talks to
pub struct Collaborators<'a> {
    pub config: &'a dyn ConfigSource,
    pub identities: &'a dyn IdentityResolver,
    pub credentials: &'a dyn Credentials,
    pub synchronizer: &'a dyn Synchronizer,
    pub audit: Option<&'a AuditLogger>,
}

pub struct Gateway<'a> {
    settings: &'a Settings,
    validator: CommandValidator,
    resolver: RepositoryResolver,
    policy: SyncPolicy,
    collaborators: Collaborators<'a>,
}

impl<'a> Gateway<'a> {
    /// Compile the pattern sets and bind the collaborators
    pub fn new(settings: &'a Settings, collaborators: Collaborators<'a>) -> GatewayResult<Self> {
        Ok(Self {
            settings,
            validator: CommandValidator::new()?,
            resolver: RepositoryResolver::from_settings(settings)?,
            policy: SyncPolicy::default(),
            collaborators,
        })
    }

    /// Authorize the original command and resolve its repository
    ///
    /// Does not touch the cache or start any process.
    pub fn authorize(
        &self,
        env: &TrustedEnvironment,
    ) -> GatewayResult<(AuthorizedCommand, ResolvedRepository)> {
        let raw = env.get(ORIGINAL_COMMAND_VAR).unwrap_or_default();
        let result = self.check(raw);

        match &result {
            Ok((command, resolved)) => self.audit(|log| {
                log.log_authorized(
                    &command.action,
                    &command.reference,
                    resolved.remote.as_str(),
                    &resolved.cache_path,
                )
            }),
            Err(err) => {
                self.audit(|log| log.log_rejection(&raw.to_string_lossy(), &err.to_string()))
            }
        }

        result
    }

    fn check(&self, raw: &OsStr) -> GatewayResult<(AuthorizedCommand, ResolvedRepository)> {
        let raw = raw.to_str().ok_or_else(|| {
            ValidationError::ParseError(format!("{} is not valid UTF-8", ORIGINAL_COMMAND_VAR))
        })?;

        let command = self.validator.validate(raw)?;
        let resolved = self.resolver.resolve(&command.reference)?;
        Ok((command, resolved))
    }

    /// Run the full pipeline and return what to execute
    ///
    /// Order matters: the sync decision is taken while the invoking user's
    /// git config is still reachable, identity is committed before git runs
    /// for the first time, and the mirror is synchronised as that identity.
    pub fn prepare(&self, env: TrustedEnvironment) -> GatewayResult<DispatchRequest> {
        let (command, resolved) = self.authorize(&env)?;

        let decision = self.sync_decision(&env);

        let adapter = PrivilegeAdapter::new(
            self.collaborators.identities,
            self.collaborators.credentials,
        );
        let (env, identity) = adapter.adapt(env)?;
        if let Some(identity) = &identity {
            self.audit(|log| {
                log.log_identity(identity.effective_uid, identity.username.as_deref())
            });
        }

        self.synchronize(decision, &resolved, &env)?;

        let request = DispatchRequest::build(
            &command.action,
            &resolved.cache_path,
            env,
            &self.settings.git_binary_dir,
        );
        self.audit(|log| log.log_dispatch(&request.program, &resolved.cache_path));

        Ok(request)
    }

    fn sync_decision(&self, env: &TrustedEnvironment) -> SyncDecision {
        match self.policy.evaluate(env, self.collaborators.config) {
            Ok(decision) => {
                debug!(required = decision.required, source = ?decision.source, "Sync decision");
                decision
            }
            Err(err) => {
                debug!(error = %err, "Sync setting unavailable, not forcing a sync");
                SyncDecision::not_required()
            }
        }
    }

    /// Sync when asked to or when there is no mirror yet
    ///
    /// A failed sync is logged and the existing mirror is served. A mirror
    /// that still does not exist afterwards is fatal.
    fn synchronize(
        &self,
        decision: SyncDecision,
        resolved: &ResolvedRepository,
        env: &TrustedEnvironment,
    ) -> GatewayResult<()> {
        let ResolvedRepository { remote, cache_path } = resolved;

        if !decision.required && cache_path.exists() {
            return Ok(());
        }

        info!("Updating {} from {}", cache_path.display(), remote);
        let outcome = self.collaborators.synchronizer.sync(cache_path, remote, env);

        let detail = match &outcome {
            Ok(operation) => {
                info!("Finished update of {} from {}", cache_path.display(), remote);
                format!("{} succeeded", operation)
            }
            Err(err) => {
                error!("Failed update of {} from {}; {}", cache_path.display(), remote, err);
                err.to_string()
            }
        };
        self.audit(|log| log.log_sync(remote.as_str(), cache_path, &detail));

        if !cache_path.exists() {
            return Err(GatewayError::CacheUnavailable(cache_path.clone()));
        }

        Ok(())
    }

    fn audit<F>(&self, record: F)
    where
        F: FnOnce(&AuditLogger) -> std::io::Result<()>,
    {
        if let Some(log) = self.collaborators.audit {
            if let Err(err) = record(log) {
                warn!(error = %err, path = %log.log_path().display(), "Failed to write audit record");
            }
        }
    }
}
