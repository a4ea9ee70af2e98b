//! Requested-URL generation for numbered course pages.

use serde::{Deserialize, Serialize};

/// Which numbered pages to scrape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseConfig {
    /// Address the page number is appended to.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_from_week")]
    pub from_week: u32,
    #[serde(default = "default_to_week")]
    pub to_week: u32,
}

fn default_base_url() -> String {
    "https://www.coursera.org/learn/astro/home/week/".to_string()
}

fn default_from_week() -> u32 {
    5
}

fn default_to_week() -> u32 {
    11
}

impl Default for CourseConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            from_week: default_from_week(),
            to_week: default_to_week(),
        }
    }
}

impl CourseConfig {
    /// Requested URLs for the configured range.
    pub fn urls(&self) -> Vec<String> {
        week_urls(&self.base_url, self.from_week, self.to_week)
    }
}

/// One URL per index in the inclusive range `[from, to]`, built by appending
/// the index to `base`. Indices run downwards when `from > to`.
pub fn week_urls(base: &str, from: u32, to: u32) -> Vec<String> {
    let indices: Box<dyn Iterator<Item = u32>> = if from <= to {
        Box::new(from..=to)
    } else {
        Box::new((to..=from).rev())
    };
    indices.map(|week| format!("{base}{week}")).collect()
}

/// Trailing page number of a requested URL.
pub fn week_number(url: &str) -> Option<u32> {
    let trimmed = url.trim_end_matches('/');
    let digits = trimmed
        .bytes()
        .rev()
        .take_while(u8::is_ascii_digit)
        .count();
    if digits == 0 {
        return None;
    }
    trimmed[trimmed.len() - digits..].parse().ok()
}
