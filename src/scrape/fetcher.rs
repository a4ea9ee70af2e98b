//! Single-page capture with bounded retries.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::backoff::Backoff;
use crate::browser::PageDriver;
use crate::error::{DriverError, ScrapeError};
use crate::models::CapturedPage;

/// Page fetch settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Element whose appearance means the page has rendered.
    #[serde(default = "default_readiness_selector")]
    pub readiness_selector: String,
    /// Bounded wait for the readiness marker, in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    /// Pause after the marker appears, in milliseconds.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default)]
    pub backoff: Backoff,
    /// Upper bound on scroll passes while waiting for lazy content.
    #[serde(default = "default_max_scroll_passes")]
    pub max_scroll_passes: u32,
    /// Pause between scroll passes, in milliseconds.
    #[serde(default = "default_scroll_pause_ms")]
    pub scroll_pause_ms: u64,
}

fn default_readiness_selector() -> String {
    ".card-headline-text".to_string()
}
fn default_timeout() -> u64 {
    10
}
fn default_settle_ms() -> u64 {
    3_000
}
fn default_max_attempts() -> u32 {
    5
}
fn default_max_scroll_passes() -> u32 {
    5
}
fn default_scroll_pause_ms() -> u64 {
    500
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            readiness_selector: default_readiness_selector(),
            timeout: default_timeout(),
            settle_ms: default_settle_ms(),
            max_attempts: default_max_attempts(),
            backoff: Backoff::default(),
            max_scroll_passes: default_max_scroll_passes(),
            scroll_pause_ms: default_scroll_pause_ms(),
        }
    }
}

/// Captures fully rendered pages.
///
/// The fetcher knows nothing about the cache; calling it twice for one URL
/// yields two independent snapshots.
#[derive(Debug, Clone)]
pub struct PageFetcher {
    config: FetchConfig,
}

impl PageFetcher {
    pub fn new(config: FetchConfig) -> Self {
        Self { config }
    }

    /// Navigate to `url` and snapshot it once the readiness marker shows.
    pub async fn fetch<D: PageDriver + ?Sized>(
        &self,
        driver: &mut D,
        url: &str,
    ) -> Result<CapturedPage, ScrapeError> {
        let max_attempts = self.config.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            match self.try_fetch(driver, url).await {
                Ok(Some(page)) => {
                    debug!(url, attempt, bytes = page.content.len(), "Captured page");
                    return Ok(page);
                }
                Ok(None) => {
                    warn!(url, attempt, max_attempts, "Page never became ready");
                }
                Err(DriverError::Interrupted) => {
                    warn!(url, attempt, "Dialog interrupted page load, dismissing");
                    driver.dismiss_dialog().await?;
                }
                Err(e) if e.is_transient() => {
                    warn!(url, attempt, error = %e, "Transient failure while fetching");
                }
                Err(e) => return Err(e.into()),
            }

            if attempt < max_attempts {
                let delay = self.config.backoff.delay(attempt);
                debug!(url, ?delay, "Backing off before refetch");
                tokio::time::sleep(delay).await;
            }
        }

        Err(ScrapeError::Fetch {
            url: url.to_string(),
            attempts: max_attempts,
        })
    }

    /// One attempt. `Ok(None)` means the readiness wait timed out.
    async fn try_fetch<D: PageDriver + ?Sized>(
        &self,
        driver: &mut D,
        url: &str,
    ) -> Result<Option<CapturedPage>, DriverError> {
        driver.goto(url).await?;

        let timeout = Duration::from_secs(self.config.timeout);
        if !driver
            .wait_for(&self.config.readiness_selector, timeout)
            .await?
        {
            return Ok(None);
        }

        tokio::time::sleep(Duration::from_millis(self.config.settle_ms)).await;
        self.realize(driver).await?;

        let content = driver.content().await?;
        Ok(Some(CapturedPage::new(url, content)))
    }

    /// Scroll until the document stops growing so lazy sections render.
    async fn realize<D: PageDriver + ?Sized>(&self, driver: &mut D) -> Result<(), DriverError> {
        let mut height = driver.scroll_to_end().await?;
        for _ in 1..self.config.max_scroll_passes {
            tokio::time::sleep(Duration::from_millis(self.config.scroll_pause_ms)).await;
            let next = driver.scroll_to_end().await?;
            if next == height {
                break;
            }
            height = next;
        }
        Ok(())
    }
}
