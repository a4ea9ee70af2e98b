//! Error types shared across the scraping pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Failure reported by a [`PageDriver`](crate::browser::PageDriver) call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    /// A modal dialog interrupted the page.
    #[error("interrupted by an open dialog")]
    Interrupted,
    /// The element was not found or went stale between lookup and use.
    #[error("element not found: {0}")]
    NotFound(String),
    /// A protocol round-trip timed out.
    #[error("browser request timed out")]
    Timeout,
    /// Any other DevTools protocol failure.
    #[error("browser protocol error: {0}")]
    Protocol(String),
    /// The browser has already been closed.
    #[error("browser is closed")]
    Closed,
}

impl DriverError {
    /// Whether retrying the current attempt might succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DriverError::Interrupted | DriverError::NotFound(_) | DriverError::Timeout
        )
    }
}

#[cfg(feature = "browser")]
impl From<chromiumoxide::error::CdpError> for DriverError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        use chromiumoxide::error::CdpError;
        match err {
            CdpError::NotFound => DriverError::NotFound("element".to_string()),
            CdpError::Timeout => DriverError::Timeout,
            other => DriverError::Protocol(other.to_string()),
        }
    }
}

/// Errors that stop a session or a single page fetch.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("login failed: {0}")]
    Auth(String),
    #[error("failed to fetch {url} after {attempts} attempts")]
    Fetch { url: String, attempts: u32 },
    #[error(transparent)]
    Driver(#[from] DriverError),
    #[error("confirmation prompt failed: {0}")]
    Prompt(#[from] std::io::Error),
    #[error(transparent)]
    Credentials(#[from] CredentialError),
    #[error("failed to save cache {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("run interrupted")]
    Cancelled,
}

/// Credentials could not be loaded.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("failed to read credentials file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("credentials file is not valid YAML: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("no '{0}' entry with username and password in credentials file")]
    MissingKey(String),
    #[error("no credentials: set COURSEGRAB_USERNAME and COURSEGRAB_PASSWORD or configure credentials_path")]
    Missing,
}

/// Why a persisted cache could not be restored.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to read cache file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cache file {0} is empty")]
    Empty(PathBuf),
    #[error("cache file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("unsupported cache format version {0}")]
    UnsupportedVersion(u32),
}

/// A captured page did not have the expected structure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    #[error("missing {what} ({selector})")]
    MissingNode {
        what: &'static str,
        selector: String,
    },
    #[error("invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },
}
