use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use thiserror::Error;
use tracing::{debug, error, info};

use crate::git::locator::RemoteLocator;
use crate::security::environment::TrustedEnvironment;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{operation} of {} failed with exit code {code:?}", .path.display())]
    Exited {
        operation: SyncOperation,
        path: PathBuf,
        code: Option<i32>,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Kind of synchronisation performed on a mirror
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOperation {
    /// First-time `clone --mirror`
    Clone,
    /// `remote update --prune` of an existing mirror
    Update,
}

impl fmt::Display for SyncOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncOperation::Clone => f.write_str("Mirror clone"),
            SyncOperation::Update => f.write_str("Remote update"),
        }
    }
}

/// Brings a local mirror up to date with its remote
pub trait Synchronizer {
    fn sync(
        &self,
        cache_path: &Path,
        remote: &RemoteLocator,
        env: &TrustedEnvironment,
    ) -> Result<SyncOperation, SyncError>;
}

/// Synchronises mirrors by running git as a child process
#[derive(Debug, Clone)]
pub struct CacheSynchronizer {
    git_binary: PathBuf,
}

impl CacheSynchronizer {
    pub fn new<P: AsRef<Path>>(git_binary: P) -> Self {
        Self {
            git_binary: git_binary.as_ref().to_path_buf(),
        }
    }

    /// Choose the git invocation for a mirror
    pub fn plan(cache_path: &Path, remote: &str) -> (SyncOperation, Vec<OsString>) {
        if cache_path.exists() {
            (
                SyncOperation::Update,
                vec![
                    "-C".into(),
                    cache_path.as_os_str().to_owned(),
                    "remote".into(),
                    "update".into(),
                    "--prune".into(),
                ],
            )
        } else {
            (
                SyncOperation::Clone,
                vec![
                    "clone".into(),
                    "--mirror".into(),
                    "--".into(),
                    remote.into(),
                    cache_path.as_os_str().to_owned(),
                ],
            )
        }
    }

    /// Clone or update the mirror at `cache_path` from any git remote string
    pub fn sync_from(
        &self,
        cache_path: &Path,
        remote: &str,
        env: &TrustedEnvironment,
    ) -> Result<SyncOperation, SyncError> {
        let (operation, args) = Self::plan(cache_path, remote);

        if operation == SyncOperation::Clone {
            if let Some(parent) = cache_path.parent() {
                fs::create_dir_all(parent)?;
            }
        }

        self.run(operation, cache_path, &args, env)?;
        Ok(operation)
    }

    /// Run git, forwarding its merged stdout and stderr to the log line by line
    fn run(
        &self,
        operation: SyncOperation,
        cache_path: &Path,
        args: &[OsString],
        env: &TrustedEnvironment,
    ) -> Result<(), SyncError> {
        debug!(
            git = %self.git_binary.display(),
            args = ?args,
            "Executing git"
        );

        let (reader, writer) = io::pipe()?;
        let mut child = Command::new(&self.git_binary)
            .args(args)
            .env_clear()
            .envs(env.iter())
            // stdin carries the client's pack protocol
            .stdin(Stdio::null())
            .stdout(writer.try_clone()?)
            .stderr(writer)
            .spawn()
            .map_err(|source| SyncError::Spawn {
                program: self.git_binary.display().to_string(),
                source,
            })?;

        // The Command (and its copies of the write end) is gone by now, so
        // the reader sees EOF once git exits.
        let mut reader = BufReader::new(reader);
        let mut line = Vec::new();
        loop {
            line.clear();
            match reader.read_until(b'\n', &mut line) {
                Ok(0) => break,
                Ok(_) => {
                    let text = String::from_utf8_lossy(&line);
                    let text = text.trim_end();
                    if !text.is_empty() {
                        info!("{}", text);
                    }
                }
                Err(e) => {
                    // Stop reading; the exit status still decides the outcome
                    error!(error = %e, "Failed reading git output");
                    break;
                }
            }
        }

        drop(reader);
        let status = child.wait()?;
        if !status.success() {
            debug!(code = ?status.code(), "git exited unsuccessfully");
            return Err(SyncError::Exited {
                operation,
                path: cache_path.to_path_buf(),
                code: status.code(),
            });
        }

        Ok(())
    }
}

impl Synchronizer for CacheSynchronizer {
    fn sync(
        &self,
        cache_path: &Path,
        remote: &RemoteLocator,
        env: &TrustedEnvironment,
    ) -> Result<SyncOperation, SyncError> {
        self.sync_from(cache_path, remote.as_str(), env)
    }
}
