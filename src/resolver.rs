use crate::browser::{ResolvedElement, Session};
use crate::core::{BrowserTrait, ElementPath};
use crate::errors::{PilotError, Result};
use crate::selectors::{Candidate, SelectorCatalog, Slot};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

/// Maps a slot to live elements by walking its candidate list in order.
///
/// Each candidate gets its own bounded wait, so the worst case for a miss is
/// `candidates * per_candidate`. The first candidate with a visible match wins
/// even when a later one would also match.
#[derive(Debug, Clone)]
pub struct ElementResolver {
    catalog: Arc<SelectorCatalog>,
    poll_interval: Duration,
}

impl ElementResolver {
    pub fn new(catalog: Arc<SelectorCatalog>, poll_interval: Duration) -> Self {
        Self {
            catalog,
            poll_interval,
        }
    }

    pub fn catalog(&self) -> &SelectorCatalog {
        &self.catalog
    }

    /// First visible match of the first candidate that produces one.
    pub async fn resolve_one<B: BrowserTrait>(
        &self,
        session: &Session<B>,
        slot: Slot,
        per_candidate: Duration,
    ) -> Result<ResolvedElement> {
        self.first_match(session, None, slot, per_candidate).await
    }

    /// Like [`resolve_one`](Self::resolve_one) but searching inside `parent` only.
    pub async fn resolve_within<B: BrowserTrait>(
        &self,
        session: &Session<B>,
        parent: &ResolvedElement,
        slot: Slot,
        per_candidate: Duration,
    ) -> Result<ResolvedElement> {
        self.first_match(session, Some(parent), slot, per_candidate)
            .await
    }

    /// Every visible match of the first candidate that matches anything, in
    /// document order. No match is an empty list, not an error.
    pub async fn resolve_all<B: BrowserTrait>(
        &self,
        session: &Session<B>,
        slot: Slot,
        per_candidate: Duration,
    ) -> Result<Vec<ResolvedElement>> {
        for candidate in self.catalog.get(slot).candidates() {
            if !self
                .await_visible(session, None, candidate, per_candidate)
                .await?
            {
                continue;
            }

            let found = session.count(None, candidate).await?;
            debug!(%slot, %candidate, found, "resolved all");
            return Ok((0..found)
                .map(|index| session.element(slot, ElementPath::root(candidate.clone(), index)))
                .collect());
        }

        debug!(%slot, "no candidate matched");
        Ok(Vec::new())
    }

    /// Single check across every candidate, no waiting.
    pub async fn any_visible<B: BrowserTrait>(&self, session: &Session<B>, slot: Slot) -> bool {
        for candidate in self.catalog.get(slot).candidates() {
            match session.count(None, candidate).await {
                Ok(found) if found > 0 => return true,
                Ok(_) => {}
                Err(e) => trace!(%slot, %candidate, error = %e, "presence check failed"),
            }
        }
        false
    }

    /// Polls all candidates of `slot` together until one is visible or
    /// `ceiling` passes. The candidates share one deadline.
    pub async fn await_any<B: BrowserTrait>(
        &self,
        session: &Session<B>,
        slot: Slot,
        ceiling: Duration,
    ) -> bool {
        let deadline = Instant::now() + ceiling;
        loop {
            if self.any_visible(session, slot).await {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                trace!(%slot, "nothing visible before the deadline");
                return false;
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }

    async fn first_match<B: BrowserTrait>(
        &self,
        session: &Session<B>,
        scope: Option<&ResolvedElement>,
        slot: Slot,
        per_candidate: Duration,
    ) -> Result<ResolvedElement> {
        let set = self.catalog.get(slot);

        for candidate in set.candidates() {
            if self
                .await_visible(session, scope, candidate, per_candidate)
                .await?
            {
                debug!(%slot, %candidate, "resolved");
                let path = match scope {
                    Some(parent) => parent.path().child(candidate.clone(), 0),
                    None => ElementPath::root(candidate.clone(), 0),
                };
                return Ok(session.element(slot, path));
            }
        }

        Err(PilotError::NotFound {
            slot: slot.to_string(),
            tried: set.describe(),
        })
    }

    /// Polls until `candidate` has a visible match or `wait` runs out. A zero
    /// wait is a single check. A selector the page rejects ends the wait at
    /// once so it cannot hide the candidates after it. Other driver errors
    /// (a page swapping its execution context, say) are retried until the
    /// deadline. A stale scope is the caller's bug and propagates.
    async fn await_visible<B: BrowserTrait>(
        &self,
        session: &Session<B>,
        scope: Option<&ResolvedElement>,
        candidate: &Candidate,
        wait: Duration,
    ) -> Result<bool> {
        let deadline = Instant::now() + wait;

        loop {
            match session.count(scope, candidate).await {
                Ok(found) if found > 0 => return Ok(true),
                Ok(_) => {}
                Err(e @ PilotError::StaleElement { .. }) => return Err(e),
                Err(PilotError::InvalidSelector(reason)) => {
                    warn!(%candidate, %reason, "candidate rejected by the page");
                    return Ok(false);
                }
                Err(e) => debug!(%candidate, error = %e, "candidate query failed, retrying"),
            }

            let now = Instant::now();
            if now >= deadline {
                trace!(%candidate, "candidate timed out");
                return Ok(false);
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Config;
    use crate::selectors::SelectorSet;
    use crate::testing::FixtureBrowser;
    use tokio_test::assert_err;

    const PAGE: &str = "https://notebooklm.google.com/notebook/nb1";

    async fn session_on(html: &str) -> Session<FixtureBrowser> {
        let browser = FixtureBrowser::new().page(PAGE, html);
        let session = Session::open(browser, Config::default()).await.unwrap();
        session.navigate(PAGE).await.unwrap();
        session
    }

    fn resolver() -> ElementResolver {
        ElementResolver::new(Arc::new(SelectorCatalog::builtin()), Duration::from_millis(100))
    }

    #[tokio::test(start_paused = true)]
    async fn falls_back_to_later_candidates_in_order() {
        let session = session_on(
            r#"<html><body><button data-testid="send-message">Go</button></body></html>"#,
        )
        .await;

        let submit = resolver()
            .resolve_one(&session, Slot::ChatSubmit, Duration::from_millis(300))
            .await
            .unwrap();

        assert_eq!(
            submit.candidate(),
            Some(&Candidate::css(r#"[data-testid="send-message"]"#))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn earlier_candidate_wins_over_later_ones() {
        let session = session_on(
            r#"<html><body>
                <button type="submit">Submit</button>
                <button aria-label="Send">Send</button>
            </body></html>"#,
        )
        .await;

        let submit = resolver()
            .resolve_one(&session, Slot::ChatSubmit, Duration::ZERO)
            .await
            .unwrap();

        assert_eq!(submit.candidate(), Some(&Candidate::css(r#"[aria-label*="send" i]"#)));
    }

    #[tokio::test(start_paused = true)]
    async fn each_candidate_gets_its_own_bounded_wait() {
        let session = session_on("<html><body></body></html>").await;
        let per_candidate = Duration::from_millis(500);
        let started = Instant::now();

        let err = assert_err!(
            resolver()
                .resolve_one(&session, Slot::ChatSubmit, per_candidate)
                .await
        );

        let elapsed = started.elapsed();
        assert!(elapsed >= per_candidate * 3);
        assert!(elapsed < per_candidate * 4);
        match err {
            PilotError::NotFound { slot, tried } => {
                assert_eq!(slot, "chat_submit");
                assert_eq!(tried.len(), 3);
                assert!(tried[0].contains("send"));
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn waits_for_late_elements_within_the_bound() {
        let session = session_on(
            r#"<html><body><div class="thinking-message" data-visible-from="400">…</div></body></html>"#,
        )
        .await;

        let found = resolver()
            .resolve_one(&session, Slot::ThinkingIndicator, Duration::from_millis(1000))
            .await;
        assert!(found.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn hidden_matches_do_not_count() {
        let session = session_on(
            r#"<html><body><div hidden><textarea></textarea></div></body></html>"#,
        )
        .await;

        let err = assert_err!(
            resolver()
                .resolve_one(&session, Slot::ChatInput, Duration::ZERO)
                .await
        );
        assert!(err.is_ui_timeout());
    }

    #[tokio::test(start_paused = true)]
    async fn resolve_all_returns_every_match_of_the_winning_candidate() {
        let session = session_on(
            r#"<html><body>
                <li class="source-row" data-testid="source-item">one</li>
                <li class="source-row" data-testid="source-item">two</li>
                <li class="source-row">three</li>
            </body></html>"#,
        )
        .await;

        let sources = resolver()
            .resolve_all(&session, Slot::SourcesList, Duration::ZERO)
            .await
            .unwrap();

        assert_eq!(sources.len(), 2);
        assert_eq!(sources[1].index(), 1);
        assert_eq!(
            session.inner_text(&sources[1]).await.unwrap().as_deref(),
            Some("two")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn resolve_all_with_no_match_is_empty() {
        let session = session_on("<html><body><p>nothing</p></body></html>").await;

        let rows = resolver()
            .resolve_all(&session, Slot::NotebookRow, Duration::from_millis(200))
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn resolve_within_searches_inside_the_parent() {
        let session = session_on(
            r#"<html><body><table>
                <tr mat-row><td class="title-column"><span class="project-table-title">First</span></td></tr>
                <tr mat-row><td class="title-column"><span class="project-table-title">Second</span></td></tr>
            </table></body></html>"#,
        )
        .await;
        let resolver = resolver();

        let rows = resolver
            .resolve_all(&session, Slot::NotebookRow, Duration::ZERO)
            .await
            .unwrap();
        let title = resolver
            .resolve_within(&session, &rows[1], Slot::NotebookRowTitle, Duration::ZERO)
            .await
            .unwrap();

        assert_eq!(
            session.inner_text(&title).await.unwrap().as_deref(),
            Some("Second")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn broken_override_candidates_are_skipped() {
        let catalog = SelectorCatalog::builtin().with_set(
            Slot::ChatInput,
            SelectorSet::new(vec![Candidate::css("textarea[[["), Candidate::css("textarea")])
                .unwrap(),
        );
        let resolver = ElementResolver::new(Arc::new(catalog), Duration::from_millis(100));
        let session = session_on("<html><body><textarea></textarea></body></html>").await;

        let input = resolver
            .resolve_one(&session, Slot::ChatInput, Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(input.candidate(), Some(&Candidate::css("textarea")));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_query_errors_are_retried_within_the_bound() {
        let browser = FixtureBrowser::new()
            .page(PAGE, r#"<html><body><button aria-label="Send">Send</button></body></html>"#)
            .failing_queries(3);
        let session = Session::open(browser, Config::default()).await.unwrap();
        session.navigate(PAGE).await.unwrap();

        let submit = resolver()
            .resolve_one(&session, Slot::ChatSubmit, Duration::from_millis(1000))
            .await
            .unwrap();

        assert_eq!(submit.candidate(), Some(&Candidate::css(r#"[aria-label*="send" i]"#)));
    }

    #[tokio::test(start_paused = true)]
    async fn await_any_shares_one_deadline_across_candidates() {
        let session = session_on("<html><body></body></html>").await;
        let ceiling = Duration::from_millis(500);
        let started = Instant::now();

        assert!(
            !resolver()
                .await_any(&session, Slot::SignedInIndicator, ceiling)
                .await
        );
        assert_eq!(started.elapsed(), ceiling);
    }

    #[tokio::test(start_paused = true)]
    async fn await_any_sees_late_indicators() {
        let session = session_on(
            r#"<html><body><div class="notebook" data-visible-from="300"></div></body></html>"#,
        )
        .await;

        assert!(
            resolver()
                .await_any(&session, Slot::SignedInIndicator, Duration::from_secs(1))
                .await
        );
    }
}
