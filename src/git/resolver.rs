use std::path::{Component, Path, PathBuf};

use regex::Regex;
use tracing::debug;

use crate::config::Settings;
use crate::git::locator::{RemoteLocator, ResolutionError};
use crate::security::patterns::PatternError;

/// User assumed when a bare path is qualified against the default host
pub const DEFAULT_REMOTE_USER: &str = "git";

/// Recognises references that already name a remote: `scheme://...` or
/// `host:`-style, optionally behind one leading slash.
const QUALIFIED_REMOTE_PATTERN: &str = r"(?i)^/?((?:[a-z]+://|[\[\]a-z0-9_.@-]+:).+)";

/// A repository reference turned into a remote and its local mirror
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRepository {
    pub remote: RemoteLocator,
    pub cache_path: PathBuf,
}

/// Maps client repository references onto mirrors under the cache root
#[derive(Debug, Clone)]
pub struct RepositoryResolver {
    cache_root: PathBuf,
    default_host: String,
    qualified: Regex,
}

impl RepositoryResolver {
    pub fn new<P: AsRef<Path>>(
        cache_root: P,
        default_host: impl Into<String>,
    ) -> Result<Self, PatternError> {
        Ok(Self {
            cache_root: cache_root.as_ref().to_path_buf(),
            default_host: default_host.into(),
            qualified: Regex::new(QUALIFIED_REMOTE_PATTERN)?,
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, PatternError> {
        Self::new(&settings.cache_root, settings.default_remote_host.as_str())
    }

    /// Fully qualify a reference, using the default host for bare paths
    pub fn qualify(&self, reference: &str) -> String {
        match self.qualified.captures(reference).and_then(|c| c.get(1)) {
            Some(remote) => remote.as_str().to_string(),
            None => format!("{}@{}:{}", DEFAULT_REMOTE_USER, self.default_host, reference),
        }
    }

    /// Resolve a validated reference to its remote and cache path
    pub fn resolve(&self, reference: &str) -> Result<ResolvedRepository, ResolutionError> {
        let remote = RemoteLocator::parse(&self.qualify(reference))?;
        let cache_path = self.cache_path(&remote)?;

        debug!(
            reference,
            remote = %remote,
            style = %remote.style,
            cache_path = %cache_path.display(),
            "Resolved repository"
        );

        Ok(ResolvedRepository { remote, cache_path })
    }

    /// Local mirror location for a remote
    ///
    /// Layout is `<cache_root>/<[user@]host>/<path>`. The conventional `git`
    /// transport user is left out so `git@host:x` and a bare `x` share a
    /// mirror. Repositories on the default host always get a `.git` suffix.
    pub fn cache_path(&self, remote: &RemoteLocator) -> Result<PathBuf, ResolutionError> {
        let host_dir = match remote.user.as_deref() {
            Some(user) if user != DEFAULT_REMOTE_USER => format!("{}@{}", user, remote.host),
            _ => remote.host.clone(),
        };

        let mut host_components = Path::new(&host_dir).components();
        if !matches!(
            (host_components.next(), host_components.next()),
            (Some(Component::Normal(_)), None)
        ) {
            return Err(ResolutionError::EscapesCacheRoot(remote.to_string()));
        }

        let mut repo_path = remote.path.clone();
        if remote.host == self.default_host
            && !repo_path.trim_end_matches('/').ends_with(".git")
        {
            repo_path = format!("{}.git", repo_path.trim_end_matches('/'));
        }

        let mut cache_path = self.cache_root.join(&host_dir);
        let mut pushed = false;
        for component in Path::new(&repo_path).components() {
            match component {
                Component::Normal(part) => {
                    cache_path.push(part);
                    pushed = true;
                }
                Component::RootDir | Component::CurDir => {}
                Component::ParentDir | Component::Prefix(_) => {
                    return Err(ResolutionError::EscapesCacheRoot(remote.to_string()));
                }
            }
        }

        // Only a suffix was left: "git@host:" or "git@host:/"
        if !pushed || repo_path.trim_matches('/') == ".git" {
            return Err(ResolutionError::MissingPath(remote.to_string()));
        }

        Ok(cache_path)
    }
}
