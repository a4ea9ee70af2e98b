//! Browser automation boundary.
//!
//! The scraping core talks to the browser only through [`PageDriver`]. The
//! Chrome implementation lives in [`chrome`] and is compiled with the
//! `browser` feature; tests drive the core with a scripted driver instead.

#[cfg(feature = "browser")]
mod chrome;
mod config;
#[cfg(test)]
pub(crate) mod scripted;

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::DriverError;

#[cfg(feature = "browser")]
pub use chrome::{ChromeDriver, ChromeLauncher};
pub use config::BrowserEngineConfig;

pub type DriverResult<T> = Result<T, DriverError>;

/// Operations the scraper needs from an automated browser page.
///
/// Selector lookups cover the top document and every script-accessible
/// nested frame.
#[async_trait]
pub trait PageDriver: Send {
    /// Navigate the page to `url`.
    async fn goto(&mut self, url: &str) -> DriverResult<()>;

    /// Wait up to `timeout` for `selector` to match. Returns `false` on timeout.
    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> DriverResult<bool>;

    /// Check whether `selector` currently matches.
    async fn exists(&mut self, selector: &str) -> DriverResult<bool>;

    /// Click the first match of `selector`, holding the button for `hold`.
    async fn click(&mut self, selector: &str, hold: Duration) -> DriverResult<()>;

    /// Type `text` into the form field matched by `selector`.
    async fn fill(&mut self, selector: &str, text: &str) -> DriverResult<()>;

    /// Scroll to the end of the document, returning its height.
    async fn scroll_to_end(&mut self) -> DriverResult<u64>;

    /// Rendered HTML of the current page.
    async fn content(&mut self) -> DriverResult<String>;

    /// Accept an open modal dialog. Returns `false` if none was open.
    async fn dismiss_dialog(&mut self) -> DriverResult<bool>;

    /// Unload the challenge-assist capability, if one was loaded.
    async fn remove_assist(&mut self) -> DriverResult<()>;

    /// Close the browser. Further calls fail with [`DriverError::Closed`].
    async fn close(&mut self) -> DriverResult<()>;
}

/// Creates browser drivers.
#[async_trait]
pub trait DriverLauncher: Send + Sync {
    type Driver: PageDriver;

    /// Start a browser, loading the challenge-assist extension at `assist` if given.
    async fn launch(&self, assist: Option<&Path>) -> DriverResult<Self::Driver>;
}
