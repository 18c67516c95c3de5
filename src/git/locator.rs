use std::fmt;

use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("Failed to parse remote {locator:?}: {reason}")]
    Unparsable { locator: String, reason: String },

    #[error("Unable to extract a hostname from {0:?}")]
    MissingHost(String),

    #[error("No repository path in {0:?}")]
    MissingPath(String),

    #[error("Remote {0:?} would escape the cache root")]
    EscapesCacheRoot(String),

    #[error("Remote {0:?} could be read as a command line option")]
    OptionLike(String),
}

/// How the remote was written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocatorStyle {
    /// `scheme://[user@]host[:port]/path`
    Url { scheme: String },
    /// `[user@]host:path`
    Scp,
}

impl fmt::Display for LocatorStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocatorStyle::Url { scheme } => write!(f, "{} url", scheme),
            LocatorStyle::Scp => f.write_str("scp"),
        }
    }
}

/// A fully qualified remote repository locator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteLocator {
    raw: String,
    pub style: LocatorStyle,
    pub user: Option<String>,
    pub host: String,
    pub port: Option<u16>,
    pub path: String,
}

impl RemoteLocator {
    /// Parse a URL or scp-style remote
    pub fn parse(locator: &str) -> Result<Self, ResolutionError> {
        let parsed = if locator.contains("://") {
            Self::parse_url(locator)?
        } else {
            Self::parse_scp(locator)?
        };

        if parsed.host.is_empty() {
            return Err(ResolutionError::MissingHost(locator.to_string()));
        }

        let option_like = [Some(locator), parsed.user.as_deref(), Some(parsed.host.as_str())]
            .into_iter()
            .flatten()
            .any(|part| part.starts_with('-'));
        if option_like {
            return Err(ResolutionError::OptionLike(locator.to_string()));
        }

        Ok(parsed)
    }

    fn parse_url(locator: &str) -> Result<Self, ResolutionError> {
        let url = Url::parse(locator).map_err(|e| ResolutionError::Unparsable {
            locator: locator.to_string(),
            reason: e.to_string(),
        })?;

        let user = Some(url.username())
            .filter(|user| !user.is_empty())
            .map(str::to_string);

        Ok(Self {
            raw: locator.to_string(),
            style: LocatorStyle::Url {
                scheme: url.scheme().to_string(),
            },
            user,
            host: url.host_str().unwrap_or_default().to_string(),
            port: url.port(),
            path: url.path().to_string(),
        })
    }

    fn parse_scp(locator: &str) -> Result<Self, ResolutionError> {
        let unparsable = || ResolutionError::Unparsable {
            locator: locator.to_string(),
            reason: "expected [user@]host:path".to_string(),
        };

        let (user, rest) = match locator.split_once('@') {
            Some((user, rest)) if !user.contains(['/', ':']) => (Some(user), rest),
            _ => (None, locator),
        };

        // A bracketed host may itself contain colons. Only direct callers of
        // `parse` get here; command validation never lets brackets through.
        let (host, path) = match rest.strip_prefix('[') {
            Some(bracketed) => {
                let (host, after) = bracketed.split_once(']').ok_or_else(unparsable)?;
                (host, after.strip_prefix(':').ok_or_else(unparsable)?)
            }
            None => rest.split_once(':').ok_or_else(unparsable)?,
        };

        if host.contains('/') {
            return Err(unparsable());
        }

        Ok(Self {
            raw: locator.to_string(),
            style: LocatorStyle::Scp,
            user: user.filter(|user| !user.is_empty()).map(str::to_string),
            host: host.to_string(),
            port: None,
            path: path.to_string(),
        })
    }

    /// The locator exactly as it is handed to git
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for RemoteLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
