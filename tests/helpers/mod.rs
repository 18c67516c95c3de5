#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use gitcache_ssh::config::{ConfigError, ConfigSource};
use gitcache_ssh::git::{RemoteLocator, SyncError, SyncOperation, Synchronizer};
use gitcache_ssh::security::{Credentials, Identity, IdentityError, IdentityResolver};
use gitcache_ssh::{EnvironmentSanitizer, TrustedEnvironment};
use tempfile::TempDir;

/// Helper to create a bare repository with one commit to mirror from
pub fn create_source_repo() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let work = temp_dir.path().join("work");
    let bare = temp_dir.path().join("source.git");
    fs::create_dir_all(&work).unwrap();

    git(&work, &["init", "-q"]);
    git(&work, &["config", "user.name", "Test User"]);
    git(&work, &["config", "user.email", "test@example.com"]);
    fs::write(work.join("README.md"), "hello\n").unwrap();
    git(&work, &["add", "README.md"]);
    git(&work, &["commit", "-q", "-m", "Initial commit"]);
    git(
        temp_dir.path(),
        &["clone", "-q", "--bare", work.to_str().unwrap(), bare.to_str().unwrap()],
    );

    (temp_dir, bare)
}

/// Helper to add a commit to a bare repository
pub fn push_commit(bare: &Path, file: &str, message: &str) {
    let temp_dir = TempDir::new().unwrap();
    let work = temp_dir.path().join("work");

    git(
        temp_dir.path(),
        &["clone", "-q", bare.to_str().unwrap(), work.to_str().unwrap()],
    );
    git(&work, &["config", "user.name", "Test User"]);
    git(&work, &["config", "user.email", "test@example.com"]);
    fs::write(work.join(file), message).unwrap();
    git(&work, &["add", file]);
    git(&work, &["commit", "-q", "-m", message]);
    git(&work, &["push", "-q", "origin", "HEAD"]);
}

pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("Failed to run git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Sanitized environment built from literal pairs
pub fn trusted_env(vars: &[(&str, &str)]) -> TrustedEnvironment {
    EnvironmentSanitizer::new("/usr/bin:/bin")
        .unwrap()
        .sanitize(vars.iter().copied())
}

/// Environment as sshd would hand it over for a forced command
pub fn ssh_env(command: &str) -> TrustedEnvironment {
    trusted_env(&[
        ("SSH_ORIGINAL_COMMAND", command),
        ("HOME", "/home/alice"),
        ("USER", "alice"),
        ("LD_PRELOAD", "/tmp/evil.so"),
    ])
}

pub struct FakeCredentials {
    pub real: u32,
    pub effective: u32,
    pub committed: Cell<Option<u32>>,
}

impl FakeCredentials {
    pub fn unprivileged() -> Self {
        Self::new(1000, 1000)
    }

    pub fn new(real: u32, effective: u32) -> Self {
        Self {
            real,
            effective,
            committed: Cell::new(None),
        }
    }
}

impl Credentials for FakeCredentials {
    fn real_uid(&self) -> u32 {
        self.real
    }

    fn effective_uid(&self) -> u32 {
        self.effective
    }

    fn commit(&self, uid: u32) -> Result<(), IdentityError> {
        self.committed.set(Some(uid));
        Ok(())
    }
}

pub struct FakeIdentities(pub Option<Identity>);

impl IdentityResolver for FakeIdentities {
    fn lookup(&self, uid: u32) -> Result<Identity, IdentityError> {
        self.0.clone().ok_or(IdentityError::UnknownUid(uid))
    }
}

pub struct FixedConfig(pub Option<&'static str>);

impl ConfigSource for FixedConfig {
    fn lookup(&self, key: &str, _env: &TrustedEnvironment) -> Result<String, ConfigError> {
        self.0
            .map(str::to_string)
            .ok_or_else(|| ConfigError::NotSet(key.to_string()))
    }
}

/// Records sync calls; creates the mirror directory unless told to fail
#[derive(Default)]
pub struct RecordingSynchronizer {
    pub fail: bool,
    pub calls: RefCell<Vec<(PathBuf, String)>>,
    pub users: RefCell<Vec<Option<String>>>,
}

impl RecordingSynchronizer {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }
}

impl Synchronizer for RecordingSynchronizer {
    fn sync(
        &self,
        cache_path: &Path,
        remote: &RemoteLocator,
        env: &TrustedEnvironment,
    ) -> Result<SyncOperation, SyncError> {
        self.calls
            .borrow_mut()
            .push((cache_path.to_path_buf(), remote.to_string()));
        self.users
            .borrow_mut()
            .push(env.get_str("USER").map(str::to_string));

        if self.fail {
            return Err(SyncError::Exited {
                operation: SyncOperation::Clone,
                path: cache_path.to_path_buf(),
                code: Some(128),
            });
        }

        let operation = if cache_path.exists() {
            SyncOperation::Update
        } else {
            SyncOperation::Clone
        };
        fs::create_dir_all(cache_path)?;
        Ok(operation)
    }
}
