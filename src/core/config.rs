use crate::errors::{PilotError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://notebooklm.google.com";
pub const DEFAULT_IDENTITY_HOST: &str = "accounts.google.com";
pub const DEFAULT_PROFILE_DIR: &str = "chrome-user-data";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub browser: BrowserConfig,
    pub timeouts: TimeoutConfig,
    pub app: AppConfig,
    /// JSON selector catalog overriding built-in slots
    pub catalog_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    pub headless: bool,
    pub profile_dir: PathBuf,
    pub viewport: Viewport,
    pub user_agent: Option<String>,
    pub args: Vec<String>,
    pub default_timeout_ms: u64,
}

/// Every bounded wait the automation performs, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Per-candidate wait for secondary controls
    pub candidate_ms: u64,
    /// Per-candidate wait for the primary control of an operation
    pub primary_control_ms: u64,
    /// Per-candidate wait for the chat send button before falling back to Enter
    pub chat_submit_ms: u64,
    /// Per-candidate wait for the optional notebook name input
    pub name_input_ms: u64,
    /// Ceiling for a page to settle after an explicit navigation
    pub settle_ms: u64,
    /// Ceiling for the address to change after clicking a notebook row
    pub discovery_settle_ms: u64,
    pub auth_redirect_ms: u64,
    pub auth_indicator_ms: u64,
    /// How long to watch for the in-progress indicator to appear
    pub indicator_appear_ms: u64,
    /// Ceiling for the in-progress indicator to disappear
    pub completion_ceiling_ms: u64,
    /// Ceiling for the generic loading indicators to disappear
    pub fallback_ceiling_ms: u64,
    /// Fixed delay before extracting a generated result
    pub grace_ms: u64,
    pub source_processing_ms: u64,
    pub guide_trigger_ms: u64,
    pub audio_trigger_ms: u64,
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub base_url: String,
    pub identity_provider_host: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Config {
    /// Defaults overlaid with `NOTEBOOKLM_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Config::default();

        if let Some(value) = lookup("NOTEBOOKLM_HEADLESS") {
            config.browser.headless = value.eq_ignore_ascii_case("true");
        }
        if let Some(dir) = lookup("NOTEBOOKLM_PROFILE_DIR") {
            config.browser.profile_dir = PathBuf::from(dir);
        }
        if let Some(timeout) = lookup("NOTEBOOKLM_TIMEOUT_MS") {
            config.browser.default_timeout_ms = timeout.parse().map_err(|_| {
                PilotError::Configuration(format!(
                    "NOTEBOOKLM_TIMEOUT_MS must be milliseconds, got '{timeout}'"
                ))
            })?;
        }
        if let Some(base_url) = lookup("NOTEBOOKLM_BASE_URL") {
            url::Url::parse(&base_url).map_err(|e| {
                PilotError::Configuration(format!("NOTEBOOKLM_BASE_URL '{base_url}': {e}"))
            })?;
            config.app.base_url = base_url.trim_end_matches('/').to_string();
        }
        if let Some(path) = lookup("NOTEBOOKLM_SELECTORS") {
            config.catalog_path = Some(PathBuf::from(path));
        }

        Ok(config)
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.browser.default_timeout_ms)
    }
}

impl AppConfig {
    pub fn notebook_url(&self, notebook_id: &str) -> String {
        format!("{}/notebook/{}", self.base_url, notebook_id)
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            profile_dir: PathBuf::from(DEFAULT_PROFILE_DIR),
            viewport: Viewport::default(),
            user_agent: None,
            args: vec!["--disable-blink-features=AutomationControlled".to_string()],
            default_timeout_ms: 30000,
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            candidate_ms: 5000,
            primary_control_ms: 10000,
            chat_submit_ms: 3000,
            name_input_ms: 5000,
            settle_ms: 2000,
            discovery_settle_ms: 2000,
            auth_redirect_ms: 2000,
            auth_indicator_ms: 5000,
            indicator_appear_ms: 1000,
            completion_ceiling_ms: 45000,
            fallback_ceiling_ms: 10000,
            grace_ms: 2000,
            source_processing_ms: 3000,
            guide_trigger_ms: 5000,
            audio_trigger_ms: 3000,
            poll_interval_ms: 100,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            identity_provider_host: DEFAULT_IDENTITY_HOST.to_string(),
        }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
        }
    }
}
