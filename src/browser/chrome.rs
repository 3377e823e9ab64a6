use super::script::{self, NetworkActivity};
use crate::core::{BrowserConfig, BrowserTrait, ElementPath, WaitUntil};
use crate::errors::{PilotError, Result};
use crate::selectors::Candidate;
use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde_json::Value;
use std::ffi::OsStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// No open requests and no finished ones for this long counts as network idle.
const NETWORK_QUIET_WINDOW: Duration = Duration::from_millis(500);
const NAVIGATION_POLL: Duration = Duration::from_millis(100);

/// Chrome driven over CDP, bound to a persistent profile directory
pub struct ChromeBrowser {
    browser: Option<Browser>,
}

impl ChromeBrowser {
    pub fn new() -> Self {
        Self { browser: None }
    }

    /// Evaluates one of the [`script`] snippets and decodes its JSON payload.
    fn evaluate_json(tab: &Tab, script: &str) -> Result<Value> {
        match Self::evaluate_raw(tab, script)? {
            Value::String(encoded) => Ok(serde_json::from_str(&encoded)?),
            other => Ok(other),
        }
    }

    fn evaluate_raw(tab: &Tab, expression: &str) -> Result<Value> {
        let result = tab
            .evaluate(expression, false)
            .map_err(|e| PilotError::JavaScriptFailed(e.to_string()))?;
        Ok(result.value.unwrap_or(Value::Null))
    }

    fn run_action(tab: &Tab, script: &str, what: &str) -> Result<()> {
        let result = Self::evaluate_json(tab, script)?;
        script::action_outcome(&result)
            .map_err(|error| PilotError::JavaScriptFailed(format!("{what} failed: {error}")))
    }

    async fn wait_for_network_idle(tab: &Tab, deadline: Instant) -> Result<()> {
        let mut quiet = QuietWindow::new();

        loop {
            let activity: NetworkActivity =
                serde_json::from_value(Self::evaluate_json(tab, script::NETWORK_ACTIVITY)?)?;
            if quiet.observe(activity) {
                return Ok(());
            }

            if Instant::now() >= deadline {
                return Err(PilotError::Timeout(
                    "network never went idle after navigation".to_string(),
                ));
            }
            tokio::time::sleep(NAVIGATION_POLL).await;
        }
    }

    async fn wait_for_dom_content_loaded(tab: &Tab, deadline: Instant) -> Result<()> {
        loop {
            let state = Self::evaluate_raw(tab, script::READY_STATE)?;
            if matches!(state.as_str(), Some("interactive") | Some("complete")) {
                return Ok(());
            }

            if Instant::now() >= deadline {
                return Err(PilotError::Timeout(
                    "document never finished parsing".to_string(),
                ));
            }
            tokio::time::sleep(NAVIGATION_POLL).await;
        }
    }
}

/// Network samples that must hold still for [`NETWORK_QUIET_WINDOW`].
struct QuietWindow {
    last_finished: Option<u64>,
    quiet_since: Instant,
}

impl QuietWindow {
    fn new() -> Self {
        Self {
            last_finished: None,
            quiet_since: Instant::now(),
        }
    }

    /// True once nothing was open and nothing new finished for the whole window.
    fn observe(&mut self, activity: NetworkActivity) -> bool {
        let now = Instant::now();
        if activity.pending > 0 || self.last_finished != Some(activity.finished) {
            self.last_finished = Some(activity.finished);
            self.quiet_since = now;
            return false;
        }
        now.duration_since(self.quiet_since) >= NETWORK_QUIET_WINDOW
    }
}

impl Default for ChromeBrowser {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrowserTrait for ChromeBrowser {
    type TabHandle = Arc<Tab>;

    async fn launch(&mut self, config: &BrowserConfig) -> Result<()> {
        // Chrome refuses to start on a profile path whose parent is missing
        std::fs::create_dir_all(&config.profile_dir)?;

        let window_size_arg = format!(
            "--window-size={},{}",
            config.viewport.width, config.viewport.height
        );

        let user_agent_arg = config
            .user_agent
            .as_ref()
            .map(|ua| format!("--user-agent={}", ua));

        let mut args = vec![
            OsStr::new("--no-sandbox"),
            OsStr::new("--disable-dev-shm-usage"),
            OsStr::new(&window_size_arg),
        ];

        if let Some(ref ua_arg) = user_agent_arg {
            args.push(OsStr::new(ua_arg));
        }

        for arg in &config.args {
            args.push(OsStr::new(arg));
        }

        let launch_options = LaunchOptions::default_builder()
            .headless(config.headless)
            .user_data_dir(Some(config.profile_dir.clone()))
            .idle_browser_timeout(Duration::from_secs(300))
            .args(args)
            .build()
            .map_err(|e| PilotError::LaunchFailed(e.to_string()))?;

        let browser =
            Browser::new(launch_options).map_err(|e| PilotError::LaunchFailed(e.to_string()))?;

        debug!(profile = %config.profile_dir.display(), headless = config.headless, "chrome launched");
        self.browser = Some(browser);
        Ok(())
    }

    async fn new_tab(&self) -> Result<Self::TabHandle> {
        let browser = self
            .browser
            .as_ref()
            .ok_or_else(|| PilotError::LaunchFailed("browser not launched".to_string()))?;

        browser
            .new_tab()
            .map_err(|e| PilotError::LaunchFailed(format!("tab creation failed: {e}")))
    }

    async fn set_default_timeout(&self, tab: &Self::TabHandle, timeout: Duration) -> Result<()> {
        tab.set_default_timeout(timeout);
        Ok(())
    }

    async fn navigate(
        &self,
        tab: &Self::TabHandle,
        url: &str,
        wait_until: WaitUntil,
        timeout: Duration,
    ) -> Result<()> {
        let deadline = Instant::now() + timeout;

        tab.navigate_to(url)
            .map_err(|e| PilotError::NavigationFailed(e.to_string()))?;

        match wait_until {
            WaitUntil::NetworkIdle => {
                tab.wait_until_navigated()
                    .map_err(|e| PilotError::Timeout(format!("load of {url}: {e}")))?;
                Self::wait_for_network_idle(tab, deadline).await
            }
            WaitUntil::DomContentLoaded => {
                if let Err(e) = tab.wait_until_navigated() {
                    debug!(%url, error = %e, "load event missed, checking readyState");
                }
                Self::wait_for_dom_content_loaded(tab, deadline).await
            }
        }
    }

    async fn get_url(&self, tab: &Self::TabHandle) -> Result<String> {
        Ok(tab.get_url())
    }

    async fn count(
        &self,
        tab: &Self::TabHandle,
        scope: Option<&ElementPath>,
        candidate: &Candidate,
    ) -> Result<usize> {
        let result = Self::evaluate_json(tab, &script::count(scope, candidate))?;
        script::match_count(&result)
            .map_err(|reason| PilotError::InvalidSelector(format!("{candidate}: {reason}")))
    }

    async fn inner_text(
        &self,
        tab: &Self::TabHandle,
        path: &ElementPath,
    ) -> Result<Option<String>> {
        let result = Self::evaluate_json(tab, &script::inner_text(path))?;
        Ok(result.as_str().map(|s| s.to_string()))
    }

    async fn click(&self, tab: &Self::TabHandle, path: &ElementPath) -> Result<()> {
        Self::run_action(tab, &script::click(path), "click")
    }

    async fn fill(&self, tab: &Self::TabHandle, path: &ElementPath, text: &str) -> Result<()> {
        Self::run_action(tab, &script::fill(path, text), "fill")
    }

    async fn press(&self, tab: &Self::TabHandle, path: &ElementPath, key: &str) -> Result<()> {
        Self::run_action(tab, &script::focus(path), "focus")?;
        // headless_chrome errors are anyhow; they land as ChromeError
        tab.press_key(key)?;
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.browser.is_some()
    }

    async fn close(&mut self) -> Result<()> {
        // dropping the handle kills the process and frees the profile lock
        self.browser = None;
        Ok(())
    }
}
