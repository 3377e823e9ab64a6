use crate::core::{BrowserTrait, Config, ElementPath, WaitUntil};
use crate::errors::{PilotError, Result};
use crate::resolver::ElementResolver;
use crate::selectors::{Candidate, Slot};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// One launched browser context plus its single page, exclusive to one operation.
pub struct Session<B: BrowserTrait> {
    session_id: String,
    browser: B,
    tab: B::TabHandle,
    config: Config,
    /// Bumped on every explicit navigation; elements carry the value they were resolved under.
    navigation_epoch: AtomicU64,
}

/// A DOM node located for a slot, addressed by position rather than by handle.
///
/// Valid only until the page it came from navigates again.
#[derive(Debug, Clone)]
pub struct ResolvedElement {
    slot: Slot,
    path: ElementPath,
    epoch: u64,
}

impl ResolvedElement {
    pub fn slot(&self) -> Slot {
        self.slot
    }

    pub fn path(&self) -> &ElementPath {
        &self.path
    }

    /// Candidate that produced the match.
    pub fn candidate(&self) -> Option<&Candidate> {
        self.path.steps().last().map(|step| &step.candidate)
    }

    pub fn index(&self) -> usize {
        self.path.steps().last().map(|step| step.index).unwrap_or(0)
    }
}

impl<B: BrowserTrait> Session<B> {
    /// Launches against the persistent profile and opens the one page.
    pub async fn open(mut browser: B, config: Config) -> Result<Self> {
        browser.launch(&config.browser).await?;
        let tab = browser.new_tab().await?;
        browser
            .set_default_timeout(&tab, config.default_timeout())
            .await?;

        let session_id = uuid::Uuid::new_v4().to_string();
        debug!(%session_id, profile = %config.browser.profile_dir.display(), "session opened");

        Ok(Self {
            session_id,
            browser,
            tab,
            config,
            navigation_epoch: AtomicU64::new(0),
        })
    }

    pub fn id(&self) -> &str {
        &self.session_id
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Navigates waiting for network quiescence, falling back once to a plain
    /// DOMContentLoaded wait. NotebookLM polls in the background forever, so the
    /// strict wait timing out is the normal case on a healthy page.
    pub async fn navigate(&self, url: &str) -> Result<()> {
        self.navigation_epoch.fetch_add(1, Ordering::SeqCst);
        let timeout = self.config.default_timeout();

        match self
            .browser
            .navigate(&self.tab, url, WaitUntil::NetworkIdle, timeout)
            .await
        {
            Err(PilotError::Timeout(reason)) => {
                debug!(%url, %reason, "network never idle, retrying with relaxed wait");
                self.browser
                    .navigate(&self.tab, url, WaitUntil::DomContentLoaded, timeout)
                    .await
            }
            other => other,
        }
    }

    pub async fn current_url(&self) -> Result<String> {
        self.browser.get_url(&self.tab).await
    }

    /// Polls the address until `accept` holds or `ceiling` elapses.
    pub async fn wait_for_url<F>(&self, accept: F, ceiling: Duration) -> Result<Option<String>>
    where
        F: Fn(&str) -> bool,
    {
        let deadline = Instant::now() + ceiling;
        loop {
            let url = self.current_url().await?;
            if accept(&url) {
                return Ok(Some(url));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(self.poll_interval()).await;
        }
    }

    /// Heuristic sign-in check: a redirect to the identity provider means
    /// signed out; otherwise some signed-in UI must show up in time.
    pub async fn is_authenticated(&self, resolver: &ElementResolver) -> bool {
        let app = &self.config.app;
        let timeouts = &self.config.timeouts;

        if let Err(e) = self.navigate(&app.base_url).await {
            warn!(error = %e, "could not reach NotebookLM while checking sign-in");
            return false;
        }

        let on_identity_provider = |url: &str| is_on_host(url, &app.identity_provider_host);
        match self
            .wait_for_url(
                on_identity_provider,
                Duration::from_millis(timeouts.auth_redirect_ms),
            )
            .await
        {
            Ok(Some(url)) => {
                info!(%url, "redirected to sign-in");
                return false;
            }
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "could not read address while checking sign-in");
                return false;
            }
        }

        // one deadline shared by every indicator candidate
        let signed_in = resolver
            .await_any(
                self,
                Slot::SignedInIndicator,
                Duration::from_millis(timeouts.auth_indicator_ms),
            )
            .await;
        if !signed_in {
            debug!("no signed-in UI found");
            return false;
        }

        match self.current_url().await {
            Ok(url) => !on_identity_provider(&url),
            Err(_) => false,
        }
    }

    pub(crate) fn element(&self, slot: Slot, path: ElementPath) -> ResolvedElement {
        ResolvedElement {
            slot,
            path,
            epoch: self.navigation_epoch.load(Ordering::SeqCst),
        }
    }

    fn ensure_fresh(&self, element: &ResolvedElement) -> Result<()> {
        if element.epoch != self.navigation_epoch.load(Ordering::SeqCst) {
            return Err(PilotError::StaleElement {
                slot: element.slot.to_string(),
            });
        }
        Ok(())
    }

    pub(crate) fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.config.timeouts.poll_interval_ms)
    }

    /// Visible matches of `candidate` in the document or inside `scope`.
    pub async fn count(
        &self,
        scope: Option<&ResolvedElement>,
        candidate: &Candidate,
    ) -> Result<usize> {
        if let Some(scope) = scope {
            self.ensure_fresh(scope)?;
        }
        self.browser
            .count(&self.tab, scope.map(|s| &s.path), candidate)
            .await
    }

    pub async fn inner_text(&self, element: &ResolvedElement) -> Result<Option<String>> {
        self.ensure_fresh(element)?;
        self.browser.inner_text(&self.tab, &element.path).await
    }

    pub async fn click(&self, element: &ResolvedElement) -> Result<()> {
        self.ensure_fresh(element)?;
        debug!(slot = %element.slot, index = element.index(), "click");
        self.browser.click(&self.tab, &element.path).await
    }

    pub async fn fill(&self, element: &ResolvedElement, text: &str) -> Result<()> {
        self.ensure_fresh(element)?;
        debug!(slot = %element.slot, chars = text.chars().count(), "fill");
        self.browser.fill(&self.tab, &element.path, text).await
    }

    pub async fn press(&self, element: &ResolvedElement, key: &str) -> Result<()> {
        self.ensure_fresh(element)?;
        self.browser.press(&self.tab, &element.path, key).await
    }

    pub fn is_running(&self) -> bool {
        self.browser.is_running()
    }

    /// Tears down the page and the browser context.
    pub async fn close(mut self) -> Result<()> {
        debug!(session_id = %self.session_id, "closing session");
        self.browser.close().await
    }
}

/// Runs `body` against a fresh session and tears the session down afterwards,
/// whatever `body` returned. Dropping the returned future (cancellation) drops
/// the session, and with it the browser process.
pub async fn with_session<B, T, F, Fut>(browser: B, config: &Config, body: F) -> Result<T>
where
    B: BrowserTrait,
    F: FnOnce(Arc<Session<B>>) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let session = Arc::new(Session::open(browser, config.clone()).await?);
    let outcome = body(Arc::clone(&session)).await;

    match Arc::try_unwrap(session) {
        Ok(session) => {
            if let Err(e) = session.close().await {
                warn!(error = %e, "session teardown failed");
            }
        }
        Err(_) => warn!("session still referenced after the operation, teardown left to drop"),
    }

    outcome
}

/// Host match on the parsed address, falling back to a substring test for
/// addresses that do not parse.
pub fn is_on_host(url: &str, host: &str) -> bool {
    match url::Url::parse(url) {
        Ok(parsed) => parsed
            .host_str()
            .map(|h| h == host || h.ends_with(&format!(".{host}")))
            .unwrap_or(false),
        Err(_) => url.contains(host),
    }
}
