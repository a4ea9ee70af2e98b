//! Bounded-retry state machine for the interactive verification step.
//!
//! One invocation walks `Idle → Attempting → AwaitingResolution → Verifying`
//! and ends in `Solved` or `Failed`. A timeout, a missing authenticated
//! marker or a transient driver failure (an unexpected dialog included) sends
//! the machine back to `Idle` after a backoff delay, until the attempt budget
//! is spent. `Failed` is an outcome, not an error: the caller decides how to
//! fall back.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::backoff::Backoff;
use crate::browser::PageDriver;
use crate::error::DriverError;

/// Challenge detection and solving settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengeConfig {
    /// Element whose presence after login means a challenge is showing.
    #[serde(default = "default_frame_selector")]
    pub frame_selector: String,
    /// How long to look for the challenge after submitting credentials, in seconds.
    #[serde(default = "default_detect_timeout")]
    pub detect_timeout: u64,
    /// Control that switches the challenge to its automatable variant, if any.
    #[serde(default = "default_assist_selector")]
    pub assist_selector: Option<String>,
    /// Pause after engaging the assist control, in milliseconds.
    #[serde(default = "default_assist_settle_ms")]
    pub assist_settle_ms: u64,
    /// Affordance that appears once the challenge can be resolved.
    #[serde(default = "default_resolve_selector")]
    pub resolve_selector: String,
    /// Bounded wait for the resolve affordance, in seconds.
    #[serde(default = "default_resolve_timeout")]
    pub resolve_timeout: u64,
    /// Pause after triggering resolution before verifying, in milliseconds.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    /// Marker that is only present for an authenticated session.
    #[serde(default = "default_authenticated_selector")]
    pub authenticated_selector: String,
    /// Total attempts per invocation.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default)]
    pub backoff: Backoff,
}

fn default_frame_selector() -> String {
    r#"iframe[src^="https://www.google.com/recaptcha/api2/bframe"]"#.to_string()
}
fn default_detect_timeout() -> u64 {
    10
}
fn default_assist_selector() -> Option<String> {
    Some("#recaptcha-audio-button".to_string())
}
fn default_assist_settle_ms() -> u64 {
    5_000
}
fn default_resolve_selector() -> String {
    "#solver-button".to_string()
}
fn default_resolve_timeout() -> u64 {
    10
}
fn default_settle_ms() -> u64 {
    20_000
}
fn default_authenticated_selector() -> String {
    "#logout-btn".to_string()
}
fn default_max_attempts() -> u32 {
    5
}

impl Default for ChallengeConfig {
    fn default() -> Self {
        Self {
            frame_selector: default_frame_selector(),
            detect_timeout: default_detect_timeout(),
            assist_selector: default_assist_selector(),
            assist_settle_ms: default_assist_settle_ms(),
            resolve_selector: default_resolve_selector(),
            resolve_timeout: default_resolve_timeout(),
            settle_ms: default_settle_ms(),
            authenticated_selector: default_authenticated_selector(),
            max_attempts: default_max_attempts(),
            backoff: Backoff::default(),
        }
    }
}

/// States of one solver invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeState {
    Idle,
    Attempting,
    AwaitingResolution,
    Verifying,
    Solved,
    Failed,
}

/// Why an attempt was abandoned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryReason {
    /// The resolve affordance never appeared.
    ResolveTimeout,
    /// Resolution was triggered but the session is not authenticated.
    MarkerAbsent,
    /// A dialog interrupted the attempt and was dismissed.
    Interrupted,
    /// Another transient driver failure.
    Transient(DriverError),
}

/// Result of a single step of the machine.
#[derive(Debug)]
enum Step {
    Next(ChallengeState),
    Retry(RetryReason),
}

/// Terminal outcome of an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeOutcome {
    Solved,
    Failed,
}

/// What happened during one invocation.
#[derive(Debug, Clone)]
pub struct ChallengeReport {
    pub outcome: ChallengeOutcome,
    /// Attempts started, never more than the configured budget.
    pub attempts: u32,
    /// Backoff delays slept between attempts, in order.
    pub delays: Vec<Duration>,
    /// Why each abandoned attempt was abandoned, in order.
    pub retries: Vec<RetryReason>,
}

/// Resolves the interactive challenge on an already-open page.
#[derive(Debug, Clone)]
pub struct ChallengeSolver {
    config: ChallengeConfig,
}

impl ChallengeSolver {
    pub fn new(config: ChallengeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ChallengeConfig {
        &self.config
    }

    /// Whether a challenge is currently showing.
    ///
    /// Dialogs that interrupt the check are dismissed and the check is
    /// repeated. If every check within the attempt budget is interrupted,
    /// the challenge is assumed to be present.
    pub async fn detect<D: PageDriver + ?Sized>(&self, driver: &mut D) -> Result<bool, DriverError> {
        let timeout = Duration::from_secs(self.config.detect_timeout);
        let max_checks = self.config.max_attempts.max(1);
        for check in 1..=max_checks {
            match driver.wait_for(&self.config.frame_selector, timeout).await {
                Ok(found) => return Ok(found),
                Err(DriverError::Interrupted) => {
                    driver.dismiss_dialog().await?;
                    debug!(check, "Dialog interrupted challenge detection");
                }
                Err(e) if e.is_transient() => {
                    debug!(check, error = %e, "Challenge detection failed, checking again");
                }
                Err(e) => return Err(e),
            }
        }
        warn!("Challenge detection kept failing, attempting to solve anyway");
        Ok(true)
    }

    /// Run the state machine until `Solved` or the attempt budget is spent.
    ///
    /// Only non-transient driver failures are returned as errors.
    pub async fn solve<D: PageDriver + ?Sized>(
        &self,
        driver: &mut D,
    ) -> Result<ChallengeReport, DriverError> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut report = ChallengeReport {
            outcome: ChallengeOutcome::Failed,
            attempts: 0,
            delays: Vec::new(),
            retries: Vec::new(),
        };
        let mut state = ChallengeState::Idle;

        loop {
            let step = match state {
                ChallengeState::Idle => {
                    report.attempts += 1;
                    debug!(attempt = report.attempts, max_attempts, "Starting challenge attempt");
                    Step::Next(ChallengeState::Attempting)
                }
                ChallengeState::Attempting => {
                    let result = self.engage_assist(driver).await;
                    self.recover(driver, result).await?
                }
                ChallengeState::AwaitingResolution => {
                    let result = self.await_resolution(driver).await;
                    self.recover(driver, result).await?
                }
                ChallengeState::Verifying => {
                    let result = self.verify(driver).await;
                    self.recover(driver, result).await?
                }
                ChallengeState::Solved => {
                    info!(attempts = report.attempts, "Challenge solved");
                    report.outcome = ChallengeOutcome::Solved;
                    return Ok(report);
                }
                ChallengeState::Failed => {
                    warn!(attempts = report.attempts, "Challenge not solved, giving up");
                    report.outcome = ChallengeOutcome::Failed;
                    return Ok(report);
                }
            };

            state = match step {
                Step::Next(next) => next,
                Step::Retry(reason) => {
                    warn!(
                        attempt = report.attempts,
                        max_attempts,
                        reason = ?reason,
                        "Challenge attempt failed"
                    );
                    report.retries.push(reason);
                    if report.attempts >= max_attempts {
                        ChallengeState::Failed
                    } else {
                        let delay = self.config.backoff.delay(report.attempts);
                        debug!(?delay, "Backing off before next challenge attempt");
                        tokio::time::sleep(delay).await;
                        report.delays.push(delay);
                        ChallengeState::Idle
                    }
                }
            };
        }
    }

    /// Turn transient failures into a retry, dismissing any open dialog.
    async fn recover<D: PageDriver + ?Sized>(
        &self,
        driver: &mut D,
        result: Result<Step, DriverError>,
    ) -> Result<Step, DriverError> {
        match result {
            Ok(step) => Ok(step),
            Err(DriverError::Interrupted) => {
                driver.dismiss_dialog().await?;
                Ok(Step::Retry(RetryReason::Interrupted))
            }
            Err(e) if e.is_transient() => Ok(Step::Retry(RetryReason::Transient(e))),
            Err(e) => Err(e),
        }
    }

    async fn engage_assist<D: PageDriver + ?Sized>(&self, driver: &mut D) -> Result<Step, DriverError> {
        if let Some(ref assist) = self.config.assist_selector {
            if driver.exists(assist).await? {
                debug!("Engaging challenge assist via {}", assist);
                driver.click(assist, press_duration()).await?;
                tokio::time::sleep(Duration::from_millis(self.config.assist_settle_ms)).await;
            }
        }
        Ok(Step::Next(ChallengeState::AwaitingResolution))
    }

    async fn await_resolution<D: PageDriver + ?Sized>(
        &self,
        driver: &mut D,
    ) -> Result<Step, DriverError> {
        let timeout = Duration::from_secs(self.config.resolve_timeout);
        if !driver.wait_for(&self.config.resolve_selector, timeout).await? {
            return Ok(Step::Retry(RetryReason::ResolveTimeout));
        }

        driver
            .click(&self.config.resolve_selector, press_duration())
            .await?;
        tokio::time::sleep(Duration::from_millis(self.config.settle_ms)).await;

        // Resolution sometimes ends with an alert; accept it before verifying.
        driver.dismiss_dialog().await?;
        Ok(Step::Next(ChallengeState::Verifying))
    }

    async fn verify<D: PageDriver + ?Sized>(&self, driver: &mut D) -> Result<Step, DriverError> {
        if driver.exists(&self.config.authenticated_selector).await? {
            Ok(Step::Next(ChallengeState::Solved))
        } else {
            Ok(Step::Retry(RetryReason::MarkerAbsent))
        }
    }
}

/// Random press-and-hold duration for challenge controls.
fn press_duration() -> Duration {
    Duration::from_millis(rand::thread_rng().gen_range(100..1000))
}
