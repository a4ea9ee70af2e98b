//! Scripted [`PageDriver`] for tests.
//!
//! Selector checks replay a per-selector queue of [`Signal`]s and fall back
//! to a fixed set of always-present selectors once the queue is drained.
//! Every call is recorded so tests can assert on navigation, clicks and
//! teardown.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use super::{DriverLauncher, DriverResult, PageDriver};
use crate::error::DriverError;

/// Response to one selector check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Signal {
    Present,
    Absent,
    /// A dialog pops up during the check.
    Dialog,
}

#[derive(Debug, Default)]
pub(crate) struct ScriptState {
    present: HashSet<String>,
    scripts: HashMap<String, VecDeque<Signal>>,
    pages: HashMap<String, String>,
    current_url: Option<String>,
    dialog_open: bool,
    closed: bool,
    pub launches: usize,
    pub assist: Option<PathBuf>,
    pub visits: Vec<String>,
    pub clicks: Vec<String>,
    pub fills: Vec<(String, String)>,
    pub scrolls: usize,
    pub dialogs_dismissed: usize,
    pub assist_removals: usize,
    pub closes: usize,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct ScriptedDriver {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `selector` match whenever its script queue is empty.
    pub fn present(self, selector: &str) -> Self {
        self.state().present.insert(selector.to_string());
        self
    }

    /// Queue responses for `selector`.
    pub fn script(self, selector: &str, signals: &[Signal]) -> Self {
        self.state()
            .scripts
            .entry(selector.to_string())
            .or_default()
            .extend(signals.iter().copied());
        self
    }

    /// Serve `html` when the page is at `url`.
    pub fn page(self, url: &str, html: &str) -> Self {
        self.state()
            .pages
            .insert(url.to_string(), html.to_string());
        self
    }

    pub fn state(&self) -> MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap()
    }

    fn usable(state: &ScriptState) -> DriverResult<()> {
        if state.closed {
            return Err(DriverError::Closed);
        }
        if state.dialog_open {
            return Err(DriverError::Interrupted);
        }
        Ok(())
    }

    fn signal(&self, selector: &str) -> DriverResult<bool> {
        let mut state = self.state();
        Self::usable(&state)?;
        let next = state
            .scripts
            .get_mut(selector)
            .and_then(|queue| queue.pop_front());
        match next {
            Some(Signal::Present) => Ok(true),
            Some(Signal::Absent) => Ok(false),
            Some(Signal::Dialog) => {
                state.dialog_open = true;
                Err(DriverError::Interrupted)
            }
            None => Ok(state.present.contains(selector)),
        }
    }
}

#[async_trait]
impl PageDriver for ScriptedDriver {
    async fn goto(&mut self, url: &str) -> DriverResult<()> {
        let mut state = self.state();
        Self::usable(&state)?;
        state.visits.push(url.to_string());
        state.current_url = Some(url.to_string());
        Ok(())
    }

    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> DriverResult<bool> {
        let found = self.signal(selector)?;
        if !found {
            tokio::time::sleep(timeout).await;
        }
        Ok(found)
    }

    async fn exists(&mut self, selector: &str) -> DriverResult<bool> {
        self.signal(selector)
    }

    async fn click(&mut self, selector: &str, _hold: Duration) -> DriverResult<()> {
        let mut state = self.state();
        Self::usable(&state)?;
        state.clicks.push(selector.to_string());
        Ok(())
    }

    async fn fill(&mut self, selector: &str, text: &str) -> DriverResult<()> {
        let mut state = self.state();
        Self::usable(&state)?;
        state.fills.push((selector.to_string(), text.to_string()));
        Ok(())
    }

    async fn scroll_to_end(&mut self) -> DriverResult<u64> {
        let mut state = self.state();
        Self::usable(&state)?;
        state.scrolls += 1;
        Ok(1000)
    }

    async fn content(&mut self) -> DriverResult<String> {
        let state = self.state();
        Self::usable(&state)?;
        Ok(state
            .current_url
            .as_ref()
            .and_then(|url| state.pages.get(url).cloned())
            .unwrap_or_else(|| "<html></html>".to_string()))
    }

    async fn dismiss_dialog(&mut self) -> DriverResult<bool> {
        let mut state = self.state();
        if state.closed {
            return Err(DriverError::Closed);
        }
        if !state.dialog_open {
            return Ok(false);
        }
        state.dialog_open = false;
        state.dialogs_dismissed += 1;
        Ok(true)
    }

    async fn remove_assist(&mut self) -> DriverResult<()> {
        let mut state = self.state();
        if state.closed {
            return Err(DriverError::Closed);
        }
        state.assist_removals += 1;
        Ok(())
    }

    async fn close(&mut self) -> DriverResult<()> {
        let mut state = self.state();
        if state.closed {
            return Err(DriverError::Closed);
        }
        state.closed = true;
        state.closes += 1;
        Ok(())
    }
}

/// Hands out clones of one scripted driver.
#[derive(Debug, Clone, Default)]
pub(crate) struct ScriptedLauncher {
    pub driver: ScriptedDriver,
}

impl ScriptedLauncher {
    pub fn new(driver: ScriptedDriver) -> Self {
        Self { driver }
    }
}

#[async_trait]
impl DriverLauncher for ScriptedLauncher {
    type Driver = ScriptedDriver;

    async fn launch(&self, assist: Option<&Path>) -> DriverResult<ScriptedDriver> {
        {
            let mut state = self.driver.state();
            state.launches += 1;
            state.assist = assist.map(Path::to_path_buf);
        }
        Ok(self.driver.clone())
    }
}
