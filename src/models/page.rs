//! Raw page snapshots as captured from the browser.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A fully rendered page snapshot.
///
/// Values are never mutated after capture; refetching a URL produces a new
/// `CapturedPage` that replaces the old one in the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedPage {
    /// URL that was requested (the cache key).
    pub url: String,
    /// Rendered HTML at capture time.
    pub content: String,
    /// When the snapshot was taken.
    pub captured_at: DateTime<Utc>,
}

impl CapturedPage {
    /// Capture `content` for `url` now.
    pub fn new(url: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            content: content.into(),
            captured_at: Utc::now(),
        }
    }
}
