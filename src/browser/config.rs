//! Browser engine configuration types.

use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Browser engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrowserEngineConfig {
    /// Run in headless mode (default: false).
    /// Challenge solving and the manual fallback need a visible window.
    #[serde(default)]
    pub headless: bool,

    /// Proxy server URL (e.g., "socks5://127.0.0.1:1080").
    #[serde(default)]
    pub proxy: Option<String>,

    /// DevTools request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Persistent browser profile directory.
    #[serde(default)]
    pub profile_dir: Option<PathBuf>,

    /// Unpacked challenge-assist extension to load at launch.
    #[serde(default)]
    pub extension: Option<PathBuf>,

    /// Pause for confirmation after the extension is loaded, so it can be
    /// configured by hand before logging in.
    #[serde(default = "default_confirm_extension")]
    pub confirm_extension_setup: bool,

    /// Additional Chrome arguments.
    #[serde(default)]
    pub chrome_args: Vec<String>,

    /// Remote Chrome DevTools URL (e.g., "ws://localhost:9222").
    /// If set, connects to existing browser instead of launching one.
    #[serde(default)]
    pub remote_url: Option<String>,
}

impl Default for BrowserEngineConfig {
    fn default() -> Self {
        Self {
            headless: false,
            proxy: None,
            timeout: default_timeout(),
            profile_dir: None,
            extension: None,
            confirm_extension_setup: default_confirm_extension(),
            chrome_args: Vec::new(),
            remote_url: None,
        }
    }
}

pub fn default_timeout() -> u64 {
    30
}

fn default_confirm_extension() -> bool {
    true
}

impl BrowserEngineConfig {
    /// Apply environment variable overrides.
    ///
    /// - `COURSEGRAB_BROWSER_URL` - remote DevTools endpoint
    /// - `COURSEGRAB_HEADLESS` - "1"/"true" to run headless
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = env::var("COURSEGRAB_BROWSER_URL") {
            if !url.is_empty() {
                self.remote_url = Some(url);
            }
        }

        if let Ok(value) = env::var("COURSEGRAB_HEADLESS") {
            self.headless = value == "1" || value.eq_ignore_ascii_case("true");
        }

        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_from_empty_json() {
        let config: BrowserEngineConfig = serde_json::from_str("{}").unwrap();
        assert!(!config.headless);
        assert_eq!(config.timeout, 30);
        assert!(config.confirm_extension_setup);
        assert!(config.extension.is_none());
        assert_eq!(config, BrowserEngineConfig::default());
    }
}
