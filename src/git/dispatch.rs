use std::convert::Infallible;
use std::ffi::OsString;
use std::io;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;
use tracing::debug;

use crate::security::environment::TrustedEnvironment;
use crate::security::ORIGINAL_COMMAND_VAR;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("exec of {} failed: {source}", .program.display())]
    Exec {
        program: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Everything needed to replace the gateway with the authorized git command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchRequest {
    /// Absolute binary to execute
    pub program: PathBuf,
    /// Full argument vector, `argv[0]` included
    pub argv: Vec<OsString>,
    pub env: TrustedEnvironment,
}

impl DispatchRequest {
    /// Build the request for an authorized action served from `cache_path`
    ///
    /// The client's reference is not carried over; git only ever sees the
    /// resolved mirror path.
    pub fn build(
        action: &str,
        cache_path: &Path,
        env: TrustedEnvironment,
        git_binary_dir: &Path,
    ) -> Self {
        let argv = vec![OsString::from(action), cache_path.as_os_str().to_owned()];

        let program = if !action.starts_with('/') || !Path::new(action).exists() {
            git_binary_dir.join(action.trim_start_matches('/'))
        } else {
            PathBuf::from(action)
        };

        Self {
            program,
            argv,
            env: env.without(ORIGINAL_COMMAND_VAR),
        }
    }

    /// Replace the current process image
    ///
    /// Only ever returns on failure.
    pub fn exec(&self) -> Result<Infallible, DispatchError> {
        debug!(
            program = %self.program.display(),
            argv = ?self.argv,
            env = ?self.env.names().collect::<Vec<_>>(),
            "Executing passthrough"
        );

        let mut command = Command::new(&self.program);
        if let Some((arg0, args)) = self.argv.split_first() {
            command.arg0(arg0).args(args);
        }
        let source = command.env_clear().envs(self.env.iter()).exec();

        Err(DispatchError::Exec {
            program: self.program.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::environment::EnvironmentSanitizer;

    fn env() -> TrustedEnvironment {
        EnvironmentSanitizer::new("/usr/bin:/bin").unwrap().sanitize([
            ("SSH_ORIGINAL_COMMAND", "git-upload-pack 'group/project'"),
            ("HOME", "/root"),
        ])
    }

    #[test]
    fn test_build_replaces_reference_with_cache_path() {
        let request = DispatchRequest::build(
            "git-upload-pack",
            Path::new("/var/cache/git/github.com/group/project.git"),
            env(),
            Path::new("/usr/bin"),
        );

        assert_eq!(request.program, PathBuf::from("/usr/bin/git-upload-pack"));
        assert_eq!(
            request.argv,
            vec![
                OsString::from("git-upload-pack"),
                OsString::from("/var/cache/git/github.com/group/project.git"),
            ]
        );
    }

    #[test]
    fn test_build_drops_original_command() {
        let request = DispatchRequest::build(
            "git-upload-archive",
            Path::new("/var/cache/git/github.com/a.git"),
            env(),
            Path::new("/usr/bin"),
        );

        assert!(!request.env.contains("SSH_ORIGINAL_COMMAND"));
        assert_eq!(request.env.get_str("HOME"), Some("/root"));
        assert_eq!(request.env.get_str("PATH"), Some("/usr/bin:/bin"));
    }

    #[test]
    fn test_existing_absolute_action_is_kept() {
        let request = DispatchRequest::build(
            "/bin/sh",
            Path::new("/var/cache/git/x.git"),
            env(),
            Path::new("/usr/bin"),
        );
        assert_eq!(request.program, PathBuf::from("/bin/sh"));
    }

    #[test]
    fn test_missing_absolute_action_is_qualified() {
        let request = DispatchRequest::build(
            "/nonexistent/git-upload-pack",
            Path::new("/var/cache/git/x.git"),
            env(),
            Path::new("/usr/bin"),
        );
        assert_eq!(
            request.program,
            PathBuf::from("/usr/bin/nonexistent/git-upload-pack")
        );
    }

    #[test]
    fn test_exec_failure_is_reported() {
        let request = DispatchRequest::build(
            "git-upload-pack",
            Path::new("/var/cache/git/x.git"),
            env(),
            Path::new("/nonexistent/bin"),
        );

        let err = request.exec().unwrap_err();
        let DispatchError::Exec { program, source } = err;
        assert_eq!(program, PathBuf::from("/nonexistent/bin/git-upload-pack"));
        assert_eq!(source.kind(), io::ErrorKind::NotFound);
    }
}
