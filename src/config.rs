//! Configuration management for coursegrab using the prefer crate.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::browser::BrowserEngineConfig;
use crate::credentials::DEFAULT_KEY;
use crate::scrape::{ChallengeConfig, CourseConfig, ExtractConfig, FetchConfig, LoginConfig};

/// Default cache file name, relative to the config directory.
pub const DEFAULT_CACHE_FILE: &str = "coursegrab-cache.json";

/// Default credentials file name, relative to the config directory.
pub const DEFAULT_CREDENTIALS_FILE: &str = "credentials.yml";

/// Configuration file structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub course: CourseConfig,
    #[serde(default)]
    pub login: LoginConfig,
    #[serde(default)]
    pub challenge: ChallengeConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub extract: ExtractConfig,
    #[serde(default)]
    pub browser: BrowserEngineConfig,
    /// Cache file location.
    #[serde(default)]
    pub cache_path: Option<String>,
    /// YAML file holding site credentials.
    #[serde(default)]
    pub credentials_path: Option<String>,
    /// Top-level key of the credentials entry.
    #[serde(default = "default_credentials_key")]
    pub credentials_key: String,

    /// Path the config was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

fn default_credentials_key() -> String {
    DEFAULT_KEY.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            course: CourseConfig::default(),
            login: LoginConfig::default(),
            challenge: ChallengeConfig::default(),
            fetch: FetchConfig::default(),
            extract: ExtractConfig::default(),
            browser: BrowserEngineConfig::default(),
            cache_path: None,
            credentials_path: None,
            credentials_key: default_credentials_key(),
            source_path: None,
        }
    }
}

impl Config {
    /// Load configuration using prefer crate for discovery.
    /// Automatically discovers coursegrab config files in standard locations.
    pub async fn load() -> Result<Self, String> {
        match prefer::load("coursegrab").await {
            Ok(pref_config) => match pref_config.source_path() {
                Some(path) => Self::load_from_path(path).await,
                None => Ok(Self::default_with_env()),
            },
            // No config file found, use defaults with env overrides
            Err(_) => Ok(Self::default_with_env()),
        }
    }

    /// Create a default config with environment variable overrides applied.
    pub fn default_with_env() -> Self {
        let mut config = Self::default();
        config.browser = config.browser.with_env_overrides();
        config
    }

    /// Load configuration from a specific file path.
    /// Supports JSON, TOML and YAML based on file extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, String> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config file {}: {}", path.display(), e))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

        let mut config: Config = match ext {
            "toml" => toml::from_str(&contents)
                .map_err(|e| format!("Failed to parse TOML config: {}", e))?,
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .map_err(|e| format!("Failed to parse YAML config: {}", e))?,
            _ => serde_json::from_str(&contents)
                .map_err(|e| format!("Failed to parse JSON config: {}", e))?,
        };

        config.source_path = Some(path.to_path_buf());
        config.browser = config.browser.with_env_overrides();
        Ok(config)
    }

    /// Get the base directory for resolving relative paths.
    /// Returns the config file's parent directory if available, otherwise None.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to the config file.
    /// - Absolute paths are returned as-is
    /// - Paths starting with ~ are expanded
    /// - Relative paths are resolved relative to `base_dir`
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Cache file location.
    pub fn cache_file(&self, base_dir: &Path) -> PathBuf {
        self.resolve_path(
            self.cache_path.as_deref().unwrap_or(DEFAULT_CACHE_FILE),
            base_dir,
        )
    }

    /// Credentials file: the configured one, or `credentials.yml` next to the
    /// config if it exists.
    pub fn credentials_file(&self, base_dir: &Path) -> Option<PathBuf> {
        match self.credentials_path {
            Some(ref path) => Some(self.resolve_path(path, base_dir)),
            None => Some(base_dir.join(DEFAULT_CREDENTIALS_FILE)).filter(|p| p.exists()),
        }
    }

    /// Resolve the extension path in place.
    pub fn resolve_extension(&mut self, base_dir: &Path) {
        if let Some(ext) = self.browser.extension.take() {
            let resolved = self.resolve_path(&ext.to_string_lossy(), base_dir);
            self.browser.extension = Some(resolved);
        }
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), String> {
        if self.course.base_url.trim().is_empty() {
            return Err("course.base_url must not be empty".to_string());
        }
        url::Url::parse(&self.course.base_url)
            .map_err(|e| format!("course.base_url is not a valid URL: {}", e))?;
        url::Url::parse(&self.login.url)
            .map_err(|e| format!("login.url is not a valid URL: {}", e))?;
        if self.challenge.max_attempts == 0 {
            return Err("challenge.max_attempts must be at least 1".to_string());
        }
        if self.fetch.max_attempts == 0 {
            return Err("fetch.max_attempts must be at least 1".to_string());
        }
        self.challenge
            .backoff
            .validate_budget(self.challenge.max_attempts)
            .map_err(|e| format!("challenge: {}", e))?;
        self.fetch
            .backoff
            .validate_budget(self.fetch.max_attempts)
            .map_err(|e| format!("fetch: {}", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn loads_toml_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("coursegrab.toml");
        std::fs::write(
            &path,
            r#"
cache_path = "state/pages.json"

[course]
base_url = "https://example.com/learn/x/week/"
from_week = 1
to_week = 3

[challenge]
max_attempts = 10

[challenge.backoff]
multiplier = 1.5
"#,
        )
        .unwrap();

        let config = Config::load_from_path(&path).await.unwrap();

        assert_eq!(config.course.urls().len(), 3);
        assert_eq!(config.challenge.max_attempts, 10);
        assert_eq!(config.challenge.backoff.multiplier, 1.5);
        assert_eq!(config.challenge.backoff.base_ms, 1_000);
        assert_eq!(config.fetch.max_attempts, 5);
        assert_eq!(config.credentials_key, "coursera");
        assert_eq!(config.base_dir().as_deref(), Some(dir.path()));
        assert_eq!(
            config.cache_file(dir.path()),
            dir.path().join("state/pages.json")
        );
    }

    #[tokio::test]
    async fn loads_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("coursegrab.yml");
        std::fs::write(
            &path,
            "fetch:\n  readiness_selector: '#content'\n  timeout: 30\ncredentials_key: edx\n",
        )
        .unwrap();

        let config = Config::load_from_path(&path).await.unwrap();
        assert_eq!(config.fetch.readiness_selector, "#content");
        assert_eq!(config.fetch.timeout, 30);
        assert_eq!(config.credentials_key, "edx");
    }

    #[tokio::test]
    async fn reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("coursegrab.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = Config::load_from_path(&path).await.unwrap_err();
        assert!(err.contains("JSON"));
    }

    #[test]
    fn resolves_relative_and_absolute_paths() {
        let config = Config::default();
        let base = Path::new("/srv/grab");
        assert_eq!(
            config.resolve_path("cache.json", base),
            PathBuf::from("/srv/grab/cache.json")
        );
        assert_eq!(
            config.resolve_path("/tmp/cache.json", base),
            PathBuf::from("/tmp/cache.json")
        );
        assert_eq!(config.cache_file(base), base.join(DEFAULT_CACHE_FILE));
    }

    #[test]
    fn credentials_file_falls_back_to_existing_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        assert!(config.credentials_file(dir.path()).is_none());

        std::fs::write(dir.path().join(DEFAULT_CREDENTIALS_FILE), "coursera: {}").unwrap();
        assert_eq!(
            config.credentials_file(dir.path()),
            Some(dir.path().join(DEFAULT_CREDENTIALS_FILE))
        );
    }

    #[test]
    fn validation() {
        assert!(Config::default().validate().is_ok());

        let mut config = Config::default();
        config.challenge.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.fetch.backoff.multiplier = 0.9;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.challenge.backoff.multiplier = 1.0;
        assert!(config.validate().unwrap_err().starts_with("challenge:"));

        let mut config = Config::default();
        config.challenge.max_attempts = 10;
        assert!(config.validate().is_ok());
        config.challenge.backoff.max_ms = 120_000;
        assert!(config.validate().unwrap_err().starts_with("challenge:"));

        let mut config = Config::default();
        config.fetch.max_attempts = 12;
        assert!(config.validate().unwrap_err().starts_with("fetch:"));

        let mut config = Config::default();
        config.course.base_url = "  ".into();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.course.base_url = "week/".into();
        assert!(config.validate().unwrap_err().contains("base_url"));
    }
}
