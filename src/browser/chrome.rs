//! Chrome DevTools implementation of [`PageDriver`].
//!
//! Launches a local Chrome/Chromium (or connects to a remote one) with
//! chromiumoxide and drives a single page for the lifetime of a session.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::dom::GetContentQuadsParams;
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchMouseEventParams, DispatchMouseEventType, MouseButton,
};
use chromiumoxide::cdp::browser_protocol::page::{
    CreateIsolatedWorldParams, EventJavascriptDialogOpening, FrameId, GetFrameTreeParams,
    HandleJavaScriptDialogParams,
};
use chromiumoxide::cdp::browser_protocol::target::CloseTargetParams;
use chromiumoxide::cdp::js_protocol::runtime::{
    EvaluateParams, ExecutionContextId, ReleaseObjectParams, RemoteObjectId,
};
use chromiumoxide::handler::HandlerConfig;
use chromiumoxide::{Browser, BrowserConfig, Handler, Page};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{BrowserEngineConfig, DriverLauncher, DriverResult, PageDriver};
use crate::error::DriverError;

/// Poll interval for [`PageDriver::wait_for`].
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Name of the isolated world created in every frame for selector lookups.
const WORLD_NAME: &str = "coursegrab";

/// Center of an element in top-level viewport coordinates.
#[derive(Debug)]
struct ElementCenter {
    x: f64,
    y: f64,
}

impl ElementCenter {
    /// Average of the corners of a content quad (x1, y1, ... x4, y4).
    fn of_quad(points: &[f64]) -> Option<Self> {
        if points.len() < 8 {
            return None;
        }
        Some(Self {
            x: (points[0] + points[2] + points[4] + points[6]) / 4.0,
            y: (points[1] + points[3] + points[5] + points[7]) / 4.0,
        })
    }
}

/// Launches or connects to Chrome.
pub struct ChromeLauncher {
    config: BrowserEngineConfig,
}

impl ChromeLauncher {
    /// Common Chrome executable paths to check.
    const CHROME_PATHS: &'static [&'static str] = &[
        // Linux
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        // macOS
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        // Common install locations
        "/opt/google/chrome/google-chrome",
    ];

    pub fn new(config: BrowserEngineConfig) -> Self {
        Self { config }
    }

    /// Find Chrome executable.
    fn find_chrome() -> DriverResult<PathBuf> {
        for path in Self::CHROME_PATHS {
            let p = Path::new(path);
            if p.exists() {
                info!("Found Chrome at: {}", path);
                return Ok(p.to_path_buf());
            }
        }

        for cmd in [
            "google-chrome",
            "google-chrome-stable",
            "chromium",
            "chromium-browser",
        ] {
            if let Ok(path) = which::which(cmd) {
                info!("Found Chrome in PATH: {}", path.display());
                return Ok(path);
            }
        }

        Err(DriverError::Protocol(
            "Chrome/Chromium not found. Please install it:\n\
             - Arch/Manjaro: sudo pacman -S chromium\n\
             - Ubuntu/Debian: sudo apt install chromium-browser\n\
             - Fedora: sudo dnf install chromium\n\
             - Or download from: https://www.google.com/chrome/"
                .to_string(),
        ))
    }

    async fn launch_local(&self, assist: Option<&Path>) -> DriverResult<(Browser, Handler)> {
        info!("Launching browser (headless={})", self.config.headless);

        let chrome_path = Self::find_chrome()?;
        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .request_timeout(Duration::from_secs(self.config.timeout));

        // Set headless mode (with_head means NOT headless, confusingly)
        if !self.config.headless {
            builder = builder.with_head();
        }

        if let Some(ref profile) = self.config.profile_dir {
            builder = builder.user_data_dir(profile);
        }

        if let Some(ref proxy) = self.config.proxy {
            builder = builder.arg(format!("--proxy-server={}", proxy));
        }

        builder = builder
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-infobars")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-sync")
            .arg("--disable-translate")
            // Keep cross-origin frames in this page's process so they show up
            // in its frame tree and quads use top-level viewport coordinates.
            .arg("--disable-site-isolation-trials")
            .arg("--disable-features=IsolateOrigins,site-per-process");

        if let Some(extension) = assist {
            if self.config.headless {
                warn!("Extensions are not loaded in headless mode; challenge assist may be missing");
            }
            // The default argument set disables all extensions
            let dir = extension.display().to_string();
            builder = builder
                .disable_default_args()
                .arg(format!("--disable-extensions-except={}", dir))
                .arg(format!("--load-extension={}", dir));
        }

        for arg in &self.config.chrome_args {
            builder = builder.arg(arg);
        }

        let config = builder
            .build()
            .map_err(|e| DriverError::Protocol(format!("Failed to build browser config: {}", e)))?;

        Ok(Browser::launch(config).await?)
    }

    /// Connect to a remote Chrome instance.
    async fn connect_remote(&self, url: &str) -> DriverResult<(Browser, Handler)> {
        info!(
            "Connecting to remote browser at {} (timeout: {}s)",
            url, self.config.timeout
        );

        // Get WebSocket URL from the /json/version endpoint
        let http_url = url
            .replace("ws://", "http://")
            .replace("wss://", "https://");
        let version_url = format!("{}/json/version", http_url.trim_end_matches('/'));

        let resp: serde_json::Value = reqwest::Client::new()
            .get(&version_url)
            .send()
            .await
            .map_err(|e| DriverError::Protocol(format!("Failed to reach remote browser: {}", e)))?
            .json()
            .await
            .map_err(|e| {
                DriverError::Protocol(format!("Failed to parse browser version info: {}", e))
            })?;

        let ws_url = resp
            .get("webSocketDebuggerUrl")
            .and_then(|v| v.as_str())
            .ok_or_else(|| DriverError::Protocol("No webSocketDebuggerUrl in response".into()))?;

        info!("Connecting to WebSocket: {}", ws_url);

        let handler_config = HandlerConfig {
            request_timeout: Duration::from_secs(self.config.timeout),
            ..Default::default()
        };

        Ok(Browser::connect_with_config(ws_url, handler_config).await?)
    }
}

#[async_trait]
impl DriverLauncher for ChromeLauncher {
    type Driver = ChromeDriver;

    async fn launch(&self, assist: Option<&Path>) -> DriverResult<ChromeDriver> {
        let (browser, mut handler) = match self.config.remote_url.as_deref() {
            Some(remote) => {
                if assist.is_some() {
                    warn!("Remote browser: the challenge-assist extension must already be installed there");
                }
                self.connect_remote(remote).await?
            }
            None => self.launch_local(assist).await?,
        };

        let handler_task = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        let page = browser.new_page("about:blank").await?;

        let dialog_open = Arc::new(AtomicBool::new(false));
        let mut dialogs = page
            .event_listener::<EventJavascriptDialogOpening>()
            .await?;
        let flag = dialog_open.clone();
        let dialog_task = tokio::spawn(async move {
            while let Some(event) = dialogs.next().await {
                warn!(message = %event.message, "Page opened a dialog");
                flag.store(true, Ordering::SeqCst);
            }
        });

        Ok(ChromeDriver {
            browser: Some(browser),
            page,
            handler_task,
            dialog_task,
            dialog_open,
            worlds: HashMap::new(),
            assist_loaded: assist.is_some() && self.config.remote_url.is_none(),
        })
    }
}

/// A single Chrome page driven over DevTools.
pub struct ChromeDriver {
    browser: Option<Browser>,
    page: Page,
    handler_task: JoinHandle<()>,
    dialog_task: JoinHandle<()>,
    dialog_open: Arc<AtomicBool>,
    /// Isolated world per frame id, dropped on navigation.
    worlds: HashMap<String, ExecutionContextId>,
    assist_loaded: bool,
}

impl Drop for ChromeDriver {
    fn drop(&mut self) {
        self.dialog_task.abort();
        self.handler_task.abort();
    }
}

impl ChromeDriver {
    fn ensure_usable(&self) -> DriverResult<()> {
        if self.browser.is_none() {
            return Err(DriverError::Closed);
        }
        if self.dialog_open.load(Ordering::SeqCst) {
            return Err(DriverError::Interrupted);
        }
        Ok(())
    }

    async fn eval<T: serde::de::DeserializeOwned>(&self, script: String) -> DriverResult<T> {
        self.page
            .evaluate(script)
            .await?
            .into_value::<T>()
            .map_err(|e| DriverError::Protocol(format!("Unexpected script result: {}", e)))
    }

    /// Frame ids in document order, top-level frame first.
    async fn frame_ids(&self) -> DriverResult<Vec<FrameId>> {
        let tree = self
            .page
            .execute(GetFrameTreeParams::default())
            .await?
            .result
            .frame_tree;
        let mut ids = Vec::new();
        let mut stack = vec![tree];
        while let Some(node) = stack.pop() {
            ids.push(node.frame.id);
            if let Some(children) = node.child_frames {
                stack.extend(children.into_iter().rev());
            }
        }
        Ok(ids)
    }

    /// Execution context for scripts inside `frame`, created on first use.
    async fn world(&mut self, frame: &FrameId) -> DriverResult<ExecutionContextId> {
        if let Some(context) = self.worlds.get(frame.inner()) {
            return Ok(context.clone());
        }
        let mut params = CreateIsolatedWorldParams::new(frame.clone());
        params.world_name = Some(WORLD_NAME.to_string());
        let context = self.page.execute(params).await?.result.execution_context_id;
        self.worlds.insert(frame.inner().clone(), context.clone());
        Ok(context)
    }

    /// Evaluate `expression` in one frame and return the resulting object.
    async fn eval_in(
        &self,
        context: ExecutionContextId,
        expression: &str,
    ) -> DriverResult<Option<RemoteObjectId>> {
        let params = EvaluateParams::builder()
            .expression(expression)
            .context_id(context)
            .build()
            .map_err(DriverError::Protocol)?;
        let evaluated = self.page.execute(params).await?.result;
        if let Some(exception) = evaluated.exception_details {
            return Err(DriverError::Protocol(exception.text));
        }
        Ok(evaluated.result.object_id)
    }

    /// Find `selector` in the first frame that contains it, optionally
    /// scrolling it into view. Cross-origin frames are searched in their own
    /// execution context, which a script in the top document cannot reach.
    async fn find_in_frames(
        &mut self,
        selector: &str,
        scroll: bool,
    ) -> DriverResult<Option<RemoteObjectId>> {
        let expression = format!(
            "(() => {{ const el = document.querySelector({sel}); {scroll} return el; }})()",
            sel = selector_literal(selector),
            scroll = if scroll {
                "if (el) el.scrollIntoView({ block: 'center' });"
            } else {
                ""
            }
        );

        for frame in self.frame_ids().await? {
            let context = match self.world(&frame).await {
                Ok(context) => context,
                Err(e) => {
                    debug!("No script context for frame {}: {}", frame.inner(), e);
                    continue;
                }
            };
            match self.eval_in(context, &expression).await {
                Ok(Some(object)) => return Ok(Some(object)),
                Ok(None) => {}
                Err(e) => {
                    // The frame navigated and took its world with it.
                    debug!("Lookup failed in frame {}: {}", frame.inner(), e);
                    self.worlds.remove(frame.inner());
                }
            }
        }
        Ok(None)
    }

    async fn release(&self, object: RemoteObjectId) {
        if let Err(e) = self.page.execute(ReleaseObjectParams::new(object)).await {
            debug!("Could not release remote object: {}", e);
        }
    }

    async fn center_of(&self, object: &RemoteObjectId) -> DriverResult<Option<ElementCenter>> {
        let mut params = GetContentQuadsParams::default();
        params.object_id = Some(object.clone());
        let quads = self.page.execute(params).await?.result.quads;
        Ok(quads
            .first()
            .and_then(|quad| ElementCenter::of_quad(quad.inner())))
    }

    async fn dispatch_mouse(
        &self,
        kind: DispatchMouseEventType,
        at: &ElementCenter,
    ) -> DriverResult<()> {
        let mut params = DispatchMouseEventParams::new(kind, at.x, at.y);
        params.button = Some(MouseButton::Left);
        params.click_count = Some(1);
        self.page.execute(params).await?;
        Ok(())
    }
}

fn selector_literal(selector: &str) -> String {
    serde_json::to_string(selector).unwrap_or_else(|_| "\"\"".to_string())
}

#[async_trait]
impl PageDriver for ChromeDriver {
    async fn goto(&mut self, url: &str) -> DriverResult<()> {
        self.ensure_usable()?;
        debug!("Navigating to {}", url);
        self.worlds.clear();
        self.page.goto(url).await?;
        Ok(())
    }

    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> DriverResult<bool> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.exists(selector).await? {
                return Ok(true);
            }
            if tokio::time::Instant::now() >= deadline {
                debug!("Timed out after {:?} waiting for {}", timeout, selector);
                return Ok(false);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn exists(&mut self, selector: &str) -> DriverResult<bool> {
        self.ensure_usable()?;
        match self.find_in_frames(selector, false).await? {
            Some(object) => {
                self.release(object).await;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn click(&mut self, selector: &str, hold: Duration) -> DriverResult<()> {
        self.ensure_usable()?;
        let object = self
            .find_in_frames(selector, true)
            .await?
            .ok_or_else(|| DriverError::NotFound(selector.to_string()))?;
        let center = self.center_of(&object).await;
        self.release(object).await;
        let center = center?.ok_or_else(|| DriverError::NotFound(selector.to_string()))?;

        self.dispatch_mouse(DispatchMouseEventType::MouseMoved, &center)
            .await?;
        self.dispatch_mouse(DispatchMouseEventType::MousePressed, &center)
            .await?;
        tokio::time::sleep(hold).await;
        self.dispatch_mouse(DispatchMouseEventType::MouseReleased, &center)
            .await
    }

    async fn fill(&mut self, selector: &str, text: &str) -> DriverResult<()> {
        self.ensure_usable()?;
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|_| DriverError::NotFound(selector.to_string()))?;
        element.click().await?;
        element.type_str(text).await?;
        Ok(())
    }

    async fn scroll_to_end(&mut self) -> DriverResult<u64> {
        self.ensure_usable()?;
        self.eval(
            "window.scrollTo(0, document.body.scrollHeight); document.body.scrollHeight"
                .to_string(),
        )
        .await
    }

    async fn content(&mut self) -> DriverResult<String> {
        self.ensure_usable()?;
        Ok(self.page.content().await?)
    }

    async fn dismiss_dialog(&mut self) -> DriverResult<bool> {
        if self.browser.is_none() {
            return Err(DriverError::Closed);
        }
        if !self.dialog_open.swap(false, Ordering::SeqCst) {
            return Ok(false);
        }
        self.page
            .execute(HandleJavaScriptDialogParams::new(true))
            .await?;
        info!("Accepted page dialog");
        Ok(true)
    }

    async fn remove_assist(&mut self) -> DriverResult<()> {
        let browser = self.browser.as_mut().ok_or(DriverError::Closed)?;
        if !self.assist_loaded {
            return Ok(());
        }

        let targets = browser.fetch_targets().await?;
        let mut closed = 0;
        for target in targets
            .into_iter()
            .filter(|t| t.url.starts_with("chrome-extension://"))
        {
            match browser
                .execute(CloseTargetParams::new(target.target_id.clone()))
                .await
            {
                Ok(_) => closed += 1,
                Err(e) => debug!("Could not close extension target {}: {}", target.url, e),
            }
        }

        self.assist_loaded = false;
        info!("Unloaded challenge-assist extension ({} targets)", closed);
        Ok(())
    }

    async fn close(&mut self) -> DriverResult<()> {
        let mut browser = self.browser.take().ok_or(DriverError::Closed)?;
        let result = browser.close().await;
        let _ = browser.wait().await;
        self.dialog_task.abort();
        self.handler_task.abort();
        result?;
        Ok(())
    }
}
