//! In-memory [`BrowserTrait`] backend for exercising the automation flows
//! without Chrome.
//!
//! Pages are plain HTML parsed with `scraper` on every query. A few data
//! attributes stand in for page behavior:
//!
//! - `data-visible-from` / `data-visible-until`: milliseconds after the page
//!   loaded during which the element (and its subtree) is visible
//! - `hidden`: never visible
//! - `data-navigate`: clicking the element, or anything inside it, moves the
//!   page to that address
//!
//! Dropping a launched fixture without closing it records
//! [`FixtureEvent::Closed`], the way a browser process dies with its owner.

use crate::core::{BrowserConfig, BrowserTrait, ElementPath, WaitUntil};
use crate::errors::{PilotError, Result};
use crate::selectors::Candidate;
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

const BLANK_PAGE: &str = "<html><head></head><body></body></html>";

/// Something the automation did to the fixture, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum FixtureEvent {
    Launched {
        headless: bool,
        profile_dir: PathBuf,
    },
    Navigated {
        url: String,
        wait_until: WaitUntil,
    },
    Clicked {
        target: String,
    },
    Filled {
        target: String,
        text: String,
    },
    Pressed {
        target: String,
        key: String,
    },
    Closed,
}

struct LoadedPage {
    url: String,
    html: String,
    loaded_at: Instant,
}

#[derive(Default)]
struct Site {
    pages: HashMap<String, String>,
    /// Page served on each successive navigation; the last one repeats.
    sequences: HashMap<String, Vec<String>>,
    redirects: HashMap<String, String>,
    never_idle: HashSet<String>,
    failing_loads: HashSet<(String, usize)>,
}

struct Shared {
    site: Site,
    current: Mutex<LoadedPage>,
    events: Mutex<Vec<FixtureEvent>>,
    /// Navigations so far, per requested address.
    loads: Mutex<HashMap<String, usize>>,
    failing_queries: AtomicUsize,
}

/// Cloning shares the site and the event log, so a test can keep a handle
/// while the automation owns another. Configure pages before cloning.
#[derive(Clone)]
pub struct FixtureBrowser {
    shared: Arc<Shared>,
    running: bool,
}

impl FixtureBrowser {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                site: Site::default(),
                current: Mutex::new(LoadedPage {
                    url: "about:blank".to_string(),
                    html: BLANK_PAGE.to_string(),
                    loaded_at: Instant::now(),
                }),
                events: Mutex::new(Vec::new()),
                loads: Mutex::new(HashMap::new()),
                failing_queries: AtomicUsize::new(0),
            }),
            running: false,
        }
    }

    pub fn page(mut self, url: &str, html: &str) -> Self {
        self.site_mut()
            .pages
            .insert(url.to_string(), html.to_string());
        self
    }

    /// Serves `variants[n]` on the n-th navigation to `url` (counting from
    /// zero), and the last variant on every navigation after those.
    pub fn page_sequence(mut self, url: &str, variants: &[String]) -> Self {
        self.site_mut()
            .sequences
            .insert(url.to_string(), variants.to_vec());
        self
    }

    /// The n-th navigation to `url` (counting from zero) fails outright.
    pub fn failing_load(mut self, url: &str, nth: usize) -> Self {
        self.site_mut()
            .failing_loads
            .insert((url.to_string(), nth));
        self
    }

    /// The next `n` element queries fail the way they do while a page swaps
    /// its execution context.
    pub fn failing_queries(self, n: usize) -> Self {
        self.shared.failing_queries.store(n, Ordering::SeqCst);
        self
    }

    pub fn redirect(mut self, from: &str, to: &str) -> Self {
        self.site_mut()
            .redirects
            .insert(from.to_string(), to.to_string());
        self
    }

    /// Navigations to `url` never reach network idle.
    pub fn never_idle(mut self, url: &str) -> Self {
        self.site_mut().never_idle.insert(url.to_string());
        self
    }

    fn site_mut(&mut self) -> &mut Site {
        match Arc::get_mut(&mut self.shared) {
            Some(shared) => &mut shared.site,
            None => panic!("fixture pages must be configured before the fixture is cloned"),
        }
    }

    pub async fn events(&self) -> Vec<FixtureEvent> {
        self.shared.events.lock().await.clone()
    }

    /// Requested addresses, one per navigation call.
    pub async fn navigations(&self) -> Vec<String> {
        self.events()
            .await
            .into_iter()
            .filter_map(|event| match event {
                FixtureEvent::Navigated { url, .. } => Some(url),
                _ => None,
            })
            .collect()
    }

    pub async fn filled(&self) -> Vec<String> {
        self.events()
            .await
            .into_iter()
            .filter_map(|event| match event {
                FixtureEvent::Filled { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    async fn record(&self, event: FixtureEvent) {
        self.shared.events.lock().await.push(event);
    }

    async fn snapshot(&self) -> (String, u64) {
        let current = self.shared.current.lock().await;
        let elapsed = current.loaded_at.elapsed().as_millis() as u64;
        (current.html.clone(), elapsed)
    }

    async fn next_load(&self, url: &str) -> usize {
        let mut loads = self.shared.loads.lock().await;
        let count = loads.entry(url.to_string()).or_insert(0);
        let nth = *count;
        *count += 1;
        nth
    }

    fn take_query_failure(&self) -> bool {
        self.shared
            .failing_queries
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
    }

    async fn load(&self, url: &str, nth: Option<usize>) {
        let site = &self.shared.site;
        let variant = nth.and_then(|nth| {
            site.sequences
                .get(url)
                .and_then(|variants| variants.get(nth).or_else(|| variants.last()))
        });
        let html = variant
            .or_else(|| site.pages.get(url))
            .cloned()
            .unwrap_or_else(|| BLANK_PAGE.to_string());
        *self.shared.current.lock().await = LoadedPage {
            url: url.to_string(),
            html,
            loaded_at: Instant::now(),
        };
    }
}

impl Default for FixtureBrowser {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for FixtureBrowser {
    fn drop(&mut self) {
        if !self.running {
            return;
        }
        if let Ok(mut events) = self.shared.events.try_lock() {
            events.push(FixtureEvent::Closed);
        }
    }
}

fn parse_selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| PilotError::InvalidSelector(format!("{css}: {e:?}")))
}

fn shown_at(element: ElementRef<'_>, elapsed_ms: u64) -> bool {
    let el = element.value();
    if el.attr("hidden").is_some() {
        return false;
    }
    let from = el
        .attr("data-visible-from")
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0);
    let until = el
        .attr("data-visible-until")
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(u64::MAX);
    from <= elapsed_ms && elapsed_ms < until
}

fn is_visible(element: ElementRef<'_>, elapsed_ms: u64) -> bool {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .chain(std::iter::once(element))
        .all(|el| shown_at(el, elapsed_ms))
}

fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<String>()
}

/// Visible matches of one candidate below `root`, in document order.
fn query<'a>(root: ElementRef<'a>, candidate: &Candidate, elapsed_ms: u64) -> Result<Vec<ElementRef<'a>>> {
    let selector = parse_selector(candidate.css_part())?;
    let needle = candidate.text_part().map(str::to_lowercase);

    Ok(root
        .select(&selector)
        .filter(|el| is_visible(*el, elapsed_ms))
        .filter(|el| match &needle {
            Some(needle) => text_of(*el).to_lowercase().contains(needle),
            None => true,
        })
        .collect())
}

fn resolve<'a>(document: &'a Html, path: &ElementPath, elapsed_ms: u64) -> Result<Option<ElementRef<'a>>> {
    let mut node = document.root_element();
    for step in path.steps() {
        match query(node, &step.candidate, elapsed_ms)?.get(step.index) {
            Some(next) => node = *next,
            None => return Ok(None),
        }
    }
    Ok(Some(node))
}

fn describe(path: &ElementPath) -> String {
    path.steps()
        .iter()
        .map(|step| format!("{}[{}]", step.candidate, step.index))
        .collect::<Vec<_>>()
        .join(" > ")
}

fn not_found(action: &str) -> PilotError {
    PilotError::JavaScriptFailed(format!("{action} failed: Element not found"))
}

#[async_trait]
impl BrowserTrait for FixtureBrowser {
    type TabHandle = ();

    async fn launch(&mut self, config: &BrowserConfig) -> Result<()> {
        self.running = true;
        self.record(FixtureEvent::Launched {
            headless: config.headless,
            profile_dir: config.profile_dir.clone(),
        })
        .await;
        Ok(())
    }

    async fn new_tab(&self) -> Result<Self::TabHandle> {
        if !self.running {
            return Err(PilotError::LaunchFailed("browser not launched".to_string()));
        }
        Ok(())
    }

    async fn set_default_timeout(&self, _tab: &Self::TabHandle, _timeout: Duration) -> Result<()> {
        Ok(())
    }

    async fn navigate(
        &self,
        _tab: &Self::TabHandle,
        url: &str,
        wait_until: WaitUntil,
        timeout: Duration,
    ) -> Result<()> {
        self.record(FixtureEvent::Navigated {
            url: url.to_string(),
            wait_until,
        })
        .await;

        let site = &self.shared.site;
        let nth = self.next_load(url).await;
        if site.failing_loads.contains(&(url.to_string(), nth)) {
            return Err(PilotError::NavigationFailed(format!("{url}: net::ERR_CONNECTION_RESET")));
        }
        let target = site
            .redirects
            .get(url)
            .cloned()
            .unwrap_or_else(|| url.to_string());
        self.load(&target, Some(nth)).await;

        if wait_until == WaitUntil::NetworkIdle && site.never_idle.contains(url) {
            tokio::time::sleep(timeout).await;
            return Err(PilotError::Timeout(format!("{url} never went idle")));
        }
        Ok(())
    }

    async fn get_url(&self, _tab: &Self::TabHandle) -> Result<String> {
        Ok(self.shared.current.lock().await.url.clone())
    }

    async fn count(
        &self,
        _tab: &Self::TabHandle,
        scope: Option<&ElementPath>,
        candidate: &Candidate,
    ) -> Result<usize> {
        if self.take_query_failure() {
            return Err(PilotError::JavaScriptFailed(
                "Execution context was destroyed".to_string(),
            ));
        }
        let (html, elapsed) = self.snapshot().await;
        let document = Html::parse_document(&html);
        let root = match scope {
            Some(path) => match resolve(&document, path, elapsed)? {
                Some(node) => node,
                None => return Ok(0),
            },
            None => document.root_element(),
        };
        Ok(query(root, candidate, elapsed)?.len())
    }

    async fn inner_text(
        &self,
        _tab: &Self::TabHandle,
        path: &ElementPath,
    ) -> Result<Option<String>> {
        let (html, elapsed) = self.snapshot().await;
        let document = Html::parse_document(&html);
        Ok(resolve(&document, path, elapsed)?.map(text_of))
    }

    async fn click(&self, _tab: &Self::TabHandle, path: &ElementPath) -> Result<()> {
        let (html, elapsed) = self.snapshot().await;
        let destination = {
            let document = Html::parse_document(&html);
            let target = resolve(&document, path, elapsed)?.ok_or_else(|| not_found("click"))?;
            std::iter::once(target)
                .chain(target.ancestors().filter_map(ElementRef::wrap))
                .find_map(|el| el.value().attr("data-navigate").map(str::to_string))
        };

        self.record(FixtureEvent::Clicked {
            target: describe(path),
        })
        .await;

        if let Some(url) = destination {
            self.load(&url, None).await;
        }
        Ok(())
    }

    async fn fill(&self, _tab: &Self::TabHandle, path: &ElementPath, text: &str) -> Result<()> {
        let (html, elapsed) = self.snapshot().await;
        let found = resolve(&Html::parse_document(&html), path, elapsed)?.is_some();
        if !found {
            return Err(not_found("fill"));
        }
        self.record(FixtureEvent::Filled {
            target: describe(path),
            text: text.to_string(),
        })
        .await;
        Ok(())
    }

    async fn press(&self, _tab: &Self::TabHandle, path: &ElementPath, key: &str) -> Result<()> {
        let (html, elapsed) = self.snapshot().await;
        let found = resolve(&Html::parse_document(&html), path, elapsed)?.is_some();
        if !found {
            return Err(not_found("focus"));
        }
        self.record(FixtureEvent::Pressed {
            target: describe(path),
            key: key.to_string(),
        })
        .await;
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running
    }

    async fn close(&mut self) -> Result<()> {
        self.running = false;
        self.record(FixtureEvent::Closed).await;
        Ok(())
    }
}
