use crate::core::config::BrowserConfig;
use crate::errors::Result;
use crate::selectors::Candidate;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

/// Completion condition for a navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitUntil {
    /// Document loaded and no network activity for a short quiet window.
    NetworkIdle,
    /// Initial document parsed.
    DomContentLoaded,
}

/// One hop of an [`ElementPath`]: the `index`-th visible match of `candidate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathStep {
    pub candidate: Candidate,
    pub index: usize,
}

/// Position-addressed route to a DOM node, re-evaluated on every use.
///
/// Nothing here points at a live node: each step queries inside the node the
/// previous step selected (the document for the first step). A path built
/// before a navigation may address a different node afterwards, which is why
/// the session refuses to act on paths from an earlier navigation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ElementPath {
    steps: Vec<PathStep>,
}

impl ElementPath {
    pub fn root(candidate: Candidate, index: usize) -> Self {
        Self {
            steps: vec![PathStep { candidate, index }],
        }
    }

    pub fn child(&self, candidate: Candidate, index: usize) -> Self {
        let mut steps = self.steps.clone();
        steps.push(PathStep { candidate, index });
        Self { steps }
    }

    pub fn steps(&self) -> &[PathStep] {
        &self.steps
    }
}

#[async_trait]
pub trait BrowserTrait: Send + Sync {
    type TabHandle: Send + Sync;

    /// Launch the browser against the configured profile directory
    async fn launch(&mut self, config: &BrowserConfig) -> Result<()>;

    /// Create a new tab/page
    async fn new_tab(&self) -> Result<Self::TabHandle>;

    /// Default timeout for every driver-level wait on this tab
    async fn set_default_timeout(&self, tab: &Self::TabHandle, timeout: Duration) -> Result<()>;

    /// Navigate and block until `wait_until` holds; `PilotError::Timeout` when
    /// the condition is not met within `timeout`
    async fn navigate(
        &self,
        tab: &Self::TabHandle,
        url: &str,
        wait_until: WaitUntil,
        timeout: Duration,
    ) -> Result<()>;

    /// Get current URL
    async fn get_url(&self, tab: &Self::TabHandle) -> Result<String>;

    /// Number of visible matches of `candidate` inside `scope` (the document when `None`)
    async fn count(
        &self,
        tab: &Self::TabHandle,
        scope: Option<&ElementPath>,
        candidate: &Candidate,
    ) -> Result<usize>;

    /// Rendered text of the node, `None` when the path no longer resolves
    async fn inner_text(&self, tab: &Self::TabHandle, path: &ElementPath)
        -> Result<Option<String>>;

    async fn click(&self, tab: &Self::TabHandle, path: &ElementPath) -> Result<()>;

    /// Replace the node's value (or text for contenteditable) with `text`
    async fn fill(&self, tab: &Self::TabHandle, path: &ElementPath, text: &str) -> Result<()>;

    /// Focus the node and send a single key press
    async fn press(&self, tab: &Self::TabHandle, path: &ElementPath, key: &str) -> Result<()>;

    /// Check if browser is still running
    fn is_running(&self) -> bool;

    /// Close the browser and release the profile lock
    async fn close(&mut self) -> Result<()>;
}
