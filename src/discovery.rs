use crate::browser::{ResolvedElement, Session};
use crate::core::{AppConfig, BrowserTrait, Config, TimeoutConfig};
use crate::errors::Result;
use crate::resolver::ElementResolver;
use crate::selectors::Slot;
use crate::types::{extract_notebook_id, Notebook, UNTITLED};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Recovers notebook ids, which list rows do not expose, by opening each row
/// and reading the id off the detail page address.
///
/// Every row costs a fresh load of the list: the click leaves the list page,
/// so positions are re-resolved from scratch instead of reusing old elements.
pub struct NotebookDiscoveryEngine {
    resolver: ElementResolver,
    timeouts: TimeoutConfig,
    app: AppConfig,
}

impl NotebookDiscoveryEngine {
    pub fn new(resolver: ElementResolver, config: &Config) -> Self {
        Self {
            resolver,
            timeouts: config.timeouts.clone(),
            app: config.app.clone(),
        }
    }

    /// Notebooks in list order. Rows that cannot be opened are left out.
    pub async fn discover<B: BrowserTrait>(&self, session: &Session<B>) -> Result<Vec<Notebook>> {
        let total = self.list_rows(session).await?.len();
        info!(total, "notebook rows on list page");

        let mut notebooks = Vec::with_capacity(total);
        for position in 0..total {
            match self.discover_row(session, position).await {
                Ok(Some(notebook)) => {
                    debug!(position, id = %notebook.id, "notebook discovered");
                    notebooks.push(notebook);
                }
                Ok(None) => {}
                Err(e) => warn!(position, error = %e, "skipping notebook row"),
            }
        }

        Ok(notebooks)
    }

    async fn list_rows<B: BrowserTrait>(&self, session: &Session<B>) -> Result<Vec<ResolvedElement>> {
        session.navigate(&self.app.base_url).await?;
        self.resolver
            .resolve_all(
                session,
                Slot::NotebookRow,
                Duration::from_millis(self.timeouts.candidate_ms),
            )
            .await
    }

    async fn discover_row<B: BrowserTrait>(
        &self,
        session: &Session<B>,
        position: usize,
    ) -> Result<Option<Notebook>> {
        let rows = self.list_rows(session).await?;
        let Some(row) = rows.get(position) else {
            debug!(position, remaining = rows.len(), "list shrank during discovery");
            return Ok(None);
        };

        let title = self.row_title(session, row).await?;

        let target = match self
            .resolver
            .resolve_within(session, row, Slot::NotebookRowLink, Duration::ZERO)
            .await
        {
            Ok(link) => link,
            Err(_) => row.clone(),
        };
        session.click(&target).await?;

        let landed = session
            .wait_for_url(
                |url| extract_notebook_id(url).is_some(),
                Duration::from_millis(self.timeouts.discovery_settle_ms),
            )
            .await?;

        let Some(url) = landed else {
            debug!(position, %title, "row did not open a notebook page");
            return Ok(None);
        };
        let Some(id) = extract_notebook_id(&url) else {
            return Ok(None);
        };

        Ok(Some(Notebook { id, title, url }))
    }

    async fn row_title<B: BrowserTrait>(
        &self,
        session: &Session<B>,
        row: &ResolvedElement,
    ) -> Result<String> {
        let title = match self
            .resolver
            .resolve_within(session, row, Slot::NotebookRowTitle, Duration::ZERO)
            .await
        {
            Ok(element) => session.inner_text(&element).await?,
            Err(_) => None,
        };

        Ok(title
            .map(|t| t.trim().to_string())
            .unwrap_or_else(|| UNTITLED.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selectors::SelectorCatalog;
    use crate::testing::FixtureBrowser;
    use std::sync::Arc;

    const ROOT: &str = "https://notebooklm.google.com";

    fn engine(config: &Config) -> NotebookDiscoveryEngine {
        let resolver = ElementResolver::new(
            Arc::new(SelectorCatalog::builtin()),
            Duration::from_millis(config.timeouts.poll_interval_ms),
        );
        NotebookDiscoveryEngine::new(resolver, config)
    }

    fn row(target: Option<&str>, title: Option<&str>) -> String {
        let navigate = target
            .map(|t| format!(r#" data-navigate="{ROOT}/notebook/{t}?authuser=0""#))
            .unwrap_or_default();
        let title = title
            .map(|t| format!(r#"<span class="project-table-title">{t}</span>"#))
            .unwrap_or_default();
        format!(r#"<tr mat-row><td class="title-column"{navigate}>{title}</td><td>3 sources</td></tr>"#)
    }

    fn list_page(rows: &[String]) -> String {
        format!("<html><body><table>{}</table></body></html>", rows.concat())
    }

    #[tokio::test(start_paused = true)]
    async fn discovers_ids_from_detail_page_addresses() {
        let config = Config::default();
        let browser = FixtureBrowser::new().page(
            ROOT,
            &list_page(&[
                row(Some("aaa"), Some("  Research notes \n")),
                row(Some("bbb"), None),
            ]),
        );
        let session = Session::open(browser.clone(), config.clone()).await.unwrap();

        let notebooks = engine(&config).discover(&session).await.unwrap();

        assert_eq!(notebooks.len(), 2);
        assert_eq!(notebooks[0].id, "aaa");
        assert_eq!(notebooks[0].title, "Research notes");
        assert_eq!(notebooks[0].url, format!("{ROOT}/notebook/aaa?authuser=0"));
        assert_eq!(notebooks[1].id, "bbb");
        assert_eq!(notebooks[1].title, UNTITLED);
    }

    #[tokio::test(start_paused = true)]
    async fn reloads_the_list_before_every_row() {
        let config = Config::default();
        let rows: Vec<String> = ["a", "b", "c"].into_iter().map(|id| row(Some(id), Some(id))).collect();
        let browser = FixtureBrowser::new().page(ROOT, &list_page(&rows));
        let session = Session::open(browser.clone(), config.clone()).await.unwrap();

        engine(&config).discover(&session).await.unwrap();

        let list_loads = browser
            .navigations()
            .await
            .iter()
            .filter(|url| url.as_str() == ROOT)
            .count();
        assert_eq!(list_loads, 1 + rows.len());
    }

    #[tokio::test(start_paused = true)]
    async fn rows_that_do_not_open_a_notebook_are_skipped() {
        let config = Config::default();
        let browser = FixtureBrowser::new().page(
            ROOT,
            &list_page(&[
                row(Some("first"), Some("First")),
                row(None, Some("Broken")),
                row(Some("third"), Some("Third")),
            ]),
        );
        let session = Session::open(browser, config.clone()).await.unwrap();

        let notebooks = engine(&config).discover(&session).await.unwrap();

        let ids: Vec<&str> = notebooks.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["first", "third"]);
    }

    #[tokio::test(start_paused = true)]
    async fn positions_past_a_shrunken_list_are_skipped() {
        let config = Config::default();
        let full = list_page(&[
            row(Some("a"), Some("A")),
            row(Some("b"), Some("B")),
            row(Some("c"), Some("C")),
        ]);
        let shrunk = list_page(&[row(Some("a"), Some("A")), row(Some("b"), Some("B"))]);
        // count, then rows 0 and 1 see three rows; row 2's reload sees two
        let browser = FixtureBrowser::new().page_sequence(
            ROOT,
            &[full.clone(), full.clone(), full, shrunk],
        );
        let session = Session::open(browser, config.clone()).await.unwrap();

        let notebooks = engine(&config).discover(&session).await.unwrap();

        let ids: Vec<&str> = notebooks.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn an_error_on_one_row_does_not_stop_the_rest() {
        let config = Config::default();
        // load 0 counts the rows, load 2 is the reload for row 1
        let browser = FixtureBrowser::new()
            .page(
                ROOT,
                &list_page(&[
                    row(Some("first"), Some("First")),
                    row(Some("second"), Some("Second")),
                    row(Some("third"), Some("Third")),
                ]),
            )
            .failing_load(ROOT, 2);
        let session = Session::open(browser, config.clone()).await.unwrap();

        let notebooks = engine(&config).discover(&session).await.unwrap();

        let titles: Vec<&str> = notebooks.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, vec!["First", "Third"]);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_list_yields_no_notebooks() {
        let config = Config::default();
        let browser = FixtureBrowser::new().page(ROOT, "<html><body><p>No notebooks yet</p></body></html>");
        let session = Session::open(browser, config.clone()).await.unwrap();

        assert!(engine(&config).discover(&session).await.unwrap().is_empty());
    }
}
