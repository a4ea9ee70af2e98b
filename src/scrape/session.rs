//! Authenticated browser session lifecycle.
//!
//! [`SessionController`] launches the browser, logs in and hands out a
//! [`Session`]. Teardown (unloading the challenge-assist extension and
//! closing the browser) runs exactly once on every exit path of
//! [`SessionController::scoped`], including errors and cancellation.

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::challenge::{ChallengeConfig, ChallengeOutcome, ChallengeSolver};
use crate::browser::{DriverLauncher, PageDriver};
use crate::checkpoint::{Checkpoint, Pause};
use crate::credentials::Credential;
use crate::error::{DriverError, ScrapeError};

/// Login form settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginConfig {
    #[serde(default = "default_login_url")]
    pub url: String,
    #[serde(default = "default_username_selector")]
    pub username_selector: String,
    #[serde(default = "default_password_selector")]
    pub password_selector: String,
    #[serde(default = "default_submit_selector")]
    pub submit_selector: String,
    /// Bounded wait for the submit control, in seconds.
    #[serde(default = "default_wait")]
    pub wait: u64,
}

fn default_login_url() -> String {
    "https://www.coursera.org/?authMode=login".to_string()
}
fn default_username_selector() -> String {
    "input[name=email]".to_string()
}
fn default_password_selector() -> String {
    "input[name=password]".to_string()
}
fn default_submit_selector() -> String {
    "[data-js=submit]".to_string()
}
fn default_wait() -> u64 {
    10
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            url: default_login_url(),
            username_selector: default_username_selector(),
            password_selector: default_password_selector(),
            submit_selector: default_submit_selector(),
            wait: default_wait(),
        }
    }
}

/// An authenticated browser context.
///
/// Call [`Session::teardown`] before dropping; it is idempotent.
pub struct Session<D: PageDriver> {
    driver: D,
    assist_loaded: bool,
    torn_down: bool,
}

impl<D: PageDriver> Session<D> {
    fn new(driver: D, assist_loaded: bool) -> Self {
        Self {
            driver,
            assist_loaded,
            torn_down: false,
        }
    }

    pub fn driver(&mut self) -> &mut D {
        &mut self.driver
    }

    /// Unload the assist extension and close the browser. Later calls are no-ops.
    pub async fn teardown(&mut self) -> Result<(), DriverError> {
        if self.torn_down {
            return Ok(());
        }
        self.torn_down = true;

        if self.assist_loaded {
            if let Err(e) = self.driver.remove_assist().await {
                warn!("Failed to unload challenge-assist extension: {}", e);
            }
        }
        self.driver.close().await?;
        debug!("Session closed");
        Ok(())
    }
}

impl<D: PageDriver> Drop for Session<D> {
    fn drop(&mut self) {
        if !self.torn_down {
            warn!("Session dropped without teardown");
        }
    }
}

/// Work performed inside an authenticated session.
#[async_trait]
pub trait SessionWork<D: PageDriver>: Send {
    async fn run(&mut self, driver: &mut D) -> Result<(), ScrapeError>;
}

/// Owns session creation, login and teardown.
pub struct SessionController<L, C> {
    launcher: L,
    checkpoint: C,
    login: LoginConfig,
    solver: ChallengeSolver,
    assist: Option<PathBuf>,
    confirm_assist: bool,
}

impl<L, C> SessionController<L, C>
where
    L: DriverLauncher,
    C: Checkpoint,
{
    pub fn new(launcher: L, checkpoint: C, login: LoginConfig, challenge: ChallengeConfig) -> Self {
        Self {
            launcher,
            checkpoint,
            login,
            solver: ChallengeSolver::new(challenge),
            assist: None,
            confirm_assist: false,
        }
    }

    /// Load the challenge-assist extension at launch, optionally pausing so
    /// it can be set up by hand.
    pub fn with_assist(mut self, extension: Option<PathBuf>, confirm: bool) -> Self {
        self.assist = extension;
        self.confirm_assist = confirm;
        self
    }

    /// Launch and log in. On failure the browser is torn down before returning.
    pub async fn open(&self, credential: &Credential) -> Result<Session<L::Driver>, ScrapeError> {
        let mut session = self.launch().await?;
        match self.login(session.driver(), credential).await {
            Ok(()) => Ok(session),
            Err(e) => {
                Self::finish(&mut session).await;
                Err(e)
            }
        }
    }

    /// Open a session, run `work` in it and tear it down on every exit path.
    ///
    /// If `shutdown` completes first, login or work is abandoned and
    /// [`ScrapeError::Cancelled`] is returned after teardown.
    pub async fn scoped<W, F>(
        &self,
        credential: &Credential,
        work: &mut W,
        shutdown: F,
    ) -> Result<(), ScrapeError>
    where
        W: SessionWork<L::Driver>,
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let mut session = tokio::select! {
            launched = self.launch() => launched?,
            _ = &mut shutdown => return Err(ScrapeError::Cancelled),
        };

        let outcome = {
            let driver = session.driver();
            tokio::select! {
                result = async {
                    self.login(driver, credential).await?;
                    work.run(driver).await
                } => result,
                _ = &mut shutdown => {
                    warn!("Interrupted, closing browser");
                    Err(ScrapeError::Cancelled)
                }
            }
        };

        Self::finish(&mut session).await;
        outcome
    }

    async fn launch(&self) -> Result<Session<L::Driver>, ScrapeError> {
        let driver = self.launcher.launch(self.assist.as_deref()).await?;
        Ok(Session::new(driver, self.assist.is_some()))
    }

    async fn finish(session: &mut Session<L::Driver>) {
        if let Err(e) = session.teardown().await {
            warn!("Browser teardown failed: {}", e);
        }
    }

    async fn login(&self, driver: &mut L::Driver, credential: &Credential) -> Result<(), ScrapeError> {
        if self.assist.is_some() && self.confirm_assist {
            self.checkpoint.confirm(Pause::AssistSetup).await?;
        }

        info!("Logging in as {}", credential.username);
        driver.goto(&self.login.url).await?;

        let wait = Duration::from_secs(self.login.wait);
        if !driver.wait_for(&self.login.submit_selector, wait).await? {
            return Err(ScrapeError::Auth(format!(
                "submit control {} did not appear within {}s",
                self.login.submit_selector, self.login.wait
            )));
        }

        driver
            .fill(&self.login.username_selector, &credential.username)
            .await?;
        driver
            .fill(&self.login.password_selector, &credential.password)
            .await?;
        driver
            .click(&self.login.submit_selector, Duration::ZERO)
            .await?;

        if !self.solver.detect(driver).await? {
            debug!("No challenge after login");
            return Ok(());
        }

        info!("Challenge detected, attempting to solve");
        let report = self.solver.solve(driver).await?;
        if report.outcome == ChallengeOutcome::Failed {
            warn!(
                attempts = report.attempts,
                "Automatic challenge solving failed, waiting for manual confirmation"
            );
            self.checkpoint.confirm(Pause::ManualChallenge).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::scripted::{ScriptedDriver, ScriptedLauncher, Signal};
    use crate::checkpoint::RecordingCheckpoint;

    const SUBMIT: &str = "[data-js=submit]";
    const FRAME: &str = r#"iframe[src^="https://www.google.com/recaptcha/api2/bframe"]"#;
    const RESOLVE: &str = "#solver-button";
    const AUTHED: &str = "#logout-btn";

    fn controller(
        driver: &ScriptedDriver,
        checkpoint: &RecordingCheckpoint,
    ) -> SessionController<ScriptedLauncher, RecordingCheckpoint> {
        SessionController::new(
            ScriptedLauncher::new(driver.clone()),
            checkpoint.clone(),
            LoginConfig::default(),
            ChallengeConfig::default(),
        )
    }

    fn credential() -> Credential {
        Credential::new("ada@example.com", "hunter2")
    }

    struct Visit(&'static str);

    #[async_trait]
    impl SessionWork<ScriptedDriver> for Visit {
        async fn run(&mut self, driver: &mut ScriptedDriver) -> Result<(), ScrapeError> {
            driver.goto(self.0).await?;
            Ok(())
        }
    }

    struct Stall;

    #[async_trait]
    impl SessionWork<ScriptedDriver> for Stall {
        async fn run(&mut self, _driver: &mut ScriptedDriver) -> Result<(), ScrapeError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
    }

    struct Broken;

    #[async_trait]
    impl SessionWork<ScriptedDriver> for Broken {
        async fn run(&mut self, _driver: &mut ScriptedDriver) -> Result<(), ScrapeError> {
            Err(DriverError::Protocol("target crashed".into()).into())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn logs_in_without_challenge() {
        let driver = ScriptedDriver::new().present(SUBMIT);
        let checkpoint = RecordingCheckpoint::default();

        let mut session = controller(&driver, &checkpoint)
            .open(&credential())
            .await
            .unwrap();
        session.teardown().await.unwrap();

        let state = driver.state();
        assert_eq!(state.visits, vec![LoginConfig::default().url]);
        assert_eq!(
            state.fills,
            vec![
                ("input[name=email]".to_string(), "ada@example.com".to_string()),
                ("input[name=password]".to_string(), "hunter2".to_string()),
            ]
        );
        assert_eq!(state.clicks, vec![SUBMIT.to_string()]);
        assert_eq!(state.closes, 1);
        assert_eq!(state.assist_removals, 0);
        assert!(checkpoint.pauses().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn missing_submit_control_is_auth_error_and_closes() {
        let driver = ScriptedDriver::new();
        let checkpoint = RecordingCheckpoint::default();

        let result = controller(&driver, &checkpoint).open(&credential()).await;

        assert!(matches!(result, Err(ScrapeError::Auth(_))));
        let state = driver.state();
        assert_eq!(state.closes, 1);
        assert!(state.fills.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn solves_detected_challenge() {
        let driver = ScriptedDriver::new()
            .present(SUBMIT)
            .present(FRAME)
            .present(RESOLVE)
            .present(AUTHED);
        let checkpoint = RecordingCheckpoint::default();

        let mut session = controller(&driver, &checkpoint)
            .open(&credential())
            .await
            .unwrap();
        session.teardown().await.unwrap();

        assert_eq!(
            driver.state().clicks,
            vec![SUBMIT.to_string(), RESOLVE.to_string()]
        );
        assert!(checkpoint.pauses().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn dialog_after_submit_is_dismissed_before_solving() {
        let driver = ScriptedDriver::new()
            .present(SUBMIT)
            .script(FRAME, &[Signal::Dialog])
            .present(FRAME)
            .present(RESOLVE)
            .present(AUTHED);
        let checkpoint = RecordingCheckpoint::default();

        let mut session = controller(&driver, &checkpoint)
            .open(&credential())
            .await
            .unwrap();
        session.teardown().await.unwrap();

        let state = driver.state();
        assert_eq!(state.dialogs_dismissed, 1);
        assert_eq!(state.clicks, vec![SUBMIT.to_string(), RESOLVE.to_string()]);
        assert!(checkpoint.pauses().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn unsolved_challenge_falls_back_to_manual_confirmation() {
        let driver = ScriptedDriver::new().present(SUBMIT).present(FRAME);
        let checkpoint = RecordingCheckpoint::default();

        let mut session = controller(&driver, &checkpoint)
            .open(&credential())
            .await
            .unwrap();
        session.teardown().await.unwrap();

        assert_eq!(checkpoint.pauses(), vec![Pause::ManualChallenge]);
    }

    #[tokio::test(start_paused = true)]
    async fn assist_extension_is_loaded_confirmed_and_removed() {
        let driver = ScriptedDriver::new().present(SUBMIT);
        let checkpoint = RecordingCheckpoint::default();
        let controller = controller(&driver, &checkpoint)
            .with_assist(Some(PathBuf::from("/opt/assist")), true);

        controller
            .scoped(&credential(), &mut Visit("https://example.com/week/5"), std::future::pending())
            .await
            .unwrap();

        let state = driver.state();
        assert_eq!(state.launches, 1);
        assert_eq!(state.assist, Some(PathBuf::from("/opt/assist")));
        assert_eq!(state.assist_removals, 1);
        assert_eq!(state.closes, 1);
        assert_eq!(state.visits.last().unwrap(), "https://example.com/week/5");
        assert_eq!(checkpoint.pauses(), vec![Pause::AssistSetup]);
    }

    #[tokio::test(start_paused = true)]
    async fn work_failure_still_tears_down() {
        let driver = ScriptedDriver::new().present(SUBMIT);
        let checkpoint = RecordingCheckpoint::default();

        let result = controller(&driver, &checkpoint)
            .scoped(&credential(), &mut Broken, std::future::pending())
            .await;

        assert!(matches!(result, Err(ScrapeError::Driver(DriverError::Protocol(_)))));
        assert_eq!(driver.state().closes, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn login_failure_in_scope_tears_down_once() {
        let driver = ScriptedDriver::new().script(SUBMIT, &[Signal::Absent]);
        let checkpoint = RecordingCheckpoint::default();

        let result = controller(&driver, &checkpoint)
            .scoped(&credential(), &mut Visit("unused"), std::future::pending())
            .await;

        assert!(matches!(result, Err(ScrapeError::Auth(_))));
        assert_eq!(driver.state().closes, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_tears_down() {
        let driver = ScriptedDriver::new().present(SUBMIT);
        let checkpoint = RecordingCheckpoint::default();

        let result = controller(&driver, &checkpoint)
            .scoped(
                &credential(),
                &mut Stall,
                tokio::time::sleep(Duration::from_secs(30)),
            )
            .await;

        assert!(matches!(result, Err(ScrapeError::Cancelled)));
        assert_eq!(driver.state().closes, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_is_idempotent() {
        let driver = ScriptedDriver::new().present(SUBMIT);
        let checkpoint = RecordingCheckpoint::default();

        let mut session = controller(&driver, &checkpoint)
            .open(&credential())
            .await
            .unwrap();
        session.teardown().await.unwrap();
        session.teardown().await.unwrap();

        assert_eq!(driver.state().closes, 1);
    }
}
