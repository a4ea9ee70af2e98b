//! Site credentials.

use std::env;
use std::fmt;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::error::CredentialError;

/// Default top-level key in the credentials file.
pub const DEFAULT_KEY: &str = "coursera";

/// Login for the target site. Never serialized.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Load credentials, preferring `COURSEGRAB_USERNAME`/`COURSEGRAB_PASSWORD`
    /// over the `key` entry of the YAML file at `path`.
    pub fn load(path: Option<&Path>, key: &str) -> Result<Self, CredentialError> {
        Self::resolve(
            env::var("COURSEGRAB_USERNAME").ok(),
            env::var("COURSEGRAB_PASSWORD").ok(),
            path,
            key,
        )
    }

    fn resolve(
        env_username: Option<String>,
        env_password: Option<String>,
        path: Option<&Path>,
        key: &str,
    ) -> Result<Self, CredentialError> {
        if let (Some(username), Some(password)) = (env_username, env_password) {
            if !username.is_empty() {
                debug!("Using credentials from environment");
                return Ok(Self::new(username, password));
            }
        }

        let path = path.ok_or(CredentialError::Missing)?;
        let text = std::fs::read_to_string(path).map_err(|source| CredentialError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Using credentials from {}", path.display());
        Self::from_yaml(&text, key)
    }

    /// Parse the `key` entry of a YAML document.
    pub fn from_yaml(text: &str, key: &str) -> Result<Self, CredentialError> {
        let doc: serde_yaml::Value = serde_yaml::from_str(text)?;
        let entry = doc
            .get(key)
            .cloned()
            .ok_or_else(|| CredentialError::MissingKey(key.to_string()))?;
        serde_yaml::from_value(entry).map_err(|_| CredentialError::MissingKey(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = "coursera:\n  username: ada@example.com\n  password: hunter2\nother:\n  token: x\n";

    #[test]
    fn reads_keyed_entry() {
        let cred = Credential::from_yaml(YAML, DEFAULT_KEY).unwrap();
        assert_eq!(cred, Credential::new("ada@example.com", "hunter2"));
    }

    #[test]
    fn missing_or_incomplete_entry() {
        assert!(matches!(
            Credential::from_yaml(YAML, "edx"),
            Err(CredentialError::MissingKey(_))
        ));
        assert!(matches!(
            Credential::from_yaml(YAML, "other"),
            Err(CredentialError::MissingKey(_))
        ));
    }

    #[test]
    fn environment_wins_over_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.yml");
        std::fs::write(&path, YAML).unwrap();

        let cred = Credential::resolve(
            Some("env-user".into()),
            Some("env-pass".into()),
            Some(&path),
            DEFAULT_KEY,
        )
        .unwrap();
        assert_eq!(cred.username, "env-user");

        let cred = Credential::resolve(Some("half".into()), None, Some(&path), DEFAULT_KEY).unwrap();
        assert_eq!(cred.username, "ada@example.com");
    }

    #[test]
    fn nothing_configured() {
        assert!(matches!(
            Credential::resolve(None, None, None, DEFAULT_KEY),
            Err(CredentialError::Missing)
        ));
    }

    #[test]
    fn debug_hides_password() {
        let shown = format!("{:?}", Credential::new("ada", "hunter2"));
        assert!(shown.contains("ada"));
        assert!(!shown.contains("hunter2"));
    }
}
