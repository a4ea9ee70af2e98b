//! Exponential backoff between retry attempts.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Backoff policy shared by challenge solving and page fetching.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Backoff {
    /// Delay before the first retry, in milliseconds.
    #[serde(default = "default_base_ms")]
    pub base_ms: u64,
    /// Multiplier applied per further retry.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    /// Ceiling for a single delay, in milliseconds.
    #[serde(default = "default_max_ms")]
    pub max_ms: u64,
}

fn default_base_ms() -> u64 {
    1_000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_max_ms() -> u64 {
    300_000
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base_ms: default_base_ms(),
            multiplier: default_multiplier(),
            max_ms: default_max_ms(),
        }
    }
}

impl Backoff {
    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let millis = self.base_ms as f64 * self.multiplier.powi(exponent);
        Duration::from_millis(millis.min(self.max_ms as f64) as u64)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.multiplier.is_nan() || self.multiplier <= 1.0 {
            return Err(format!(
                "backoff multiplier must be greater than 1.0, got {}",
                self.multiplier
            ));
        }
        if self.base_ms > self.max_ms {
            return Err(format!(
                "backoff base ({}ms) exceeds its ceiling ({}ms)",
                self.base_ms, self.max_ms
            ));
        }
        Ok(())
    }

    /// Check that every delay slept within `max_attempts` stays below the
    /// ceiling, so consecutive delays strictly increase.
    pub fn validate_budget(&self, max_attempts: u32) -> Result<(), String> {
        self.validate()?;
        if max_attempts < 2 {
            return Ok(());
        }
        let last = max_attempts - 1;
        let millis = self.base_ms as f64 * self.multiplier.powi(last as i32 - 1);
        if millis > self.max_ms as f64 {
            return Err(format!(
                "backoff delay before attempt {} ({}ms) exceeds its ceiling ({}ms); \
                 raise max_ms or lower max_attempts",
                max_attempts, millis as u64, self.max_ms
            ));
        }
        Ok(())
    }
}
