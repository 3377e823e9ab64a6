use crate::browser::{with_session, ChromeBrowser, Session};
use crate::core::{BrowserTrait, Config};
use crate::discovery::NotebookDiscoveryEngine;
use crate::errors::{PilotError, Result};
use crate::resolver::ElementResolver;
use crate::selectors::{SelectorCatalog, Slot};
use crate::types::{
    extract_notebook_id, truncate_title, validate_notebook_id, GuideType, Notebook, SourceEntry,
    SourceType, StatusRecord,
};
use crate::waiter::{Completion, CompletionWaiter};
use serde::Serialize;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

pub const NOT_AUTHENTICATED: &str = "Not authenticated. Run: notebook-pilot login";
pub const AUDIO_NOTE: &str = "Audio generation is async and may take several minutes";

type Launcher<B> = Box<dyn Fn() -> B + Send + Sync>;

/// Result of the configuration-only health check.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub headless: bool,
    pub profile_dir: PathBuf,
    pub catalog_version: String,
}

/// Entry point for every NotebookLM operation.
///
/// Each call launches its own browser against the configured profile, checks
/// sign-in, runs its protocol and tears the browser down again. Calls against
/// the same profile directory must not overlap: Chrome holds a lock on it.
pub struct NotebookClient<B: BrowserTrait> {
    config: Config,
    resolver: ElementResolver,
    launcher: Launcher<B>,
}

impl NotebookClient<ChromeBrowser> {
    /// Chrome-backed client, loading the selector catalog override if one is configured.
    pub fn new(config: Config) -> Result<Self> {
        let catalog = match &config.catalog_path {
            Some(path) => SelectorCatalog::load(path)?,
            None => SelectorCatalog::builtin(),
        };
        info!(version = catalog.version(), "selector catalog loaded");
        Ok(Self::with_launcher(config, catalog, ChromeBrowser::new))
    }
}

impl<B: BrowserTrait> NotebookClient<B> {
    pub fn with_launcher(
        config: Config,
        catalog: SelectorCatalog,
        launcher: impl Fn() -> B + Send + Sync + 'static,
    ) -> Self {
        let resolver = ElementResolver::new(
            Arc::new(catalog),
            Duration::from_millis(config.timeouts.poll_interval_ms),
        );
        Self {
            config,
            resolver,
            launcher: Box::new(launcher),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn health(&self) -> HealthReport {
        HealthReport {
            status: "healthy",
            headless: self.config.browser.headless,
            profile_dir: self.config.browser.profile_dir.clone(),
            catalog_version: self.resolver.catalog().version().to_string(),
        }
    }

    #[instrument(skip(self))]
    pub async fn list_notebooks(&self) -> Result<Vec<Notebook>> {
        self.run("Failed to list notebooks", |session| async move {
            let engine = NotebookDiscoveryEngine::new(self.resolver.clone(), &self.config);
            let notebooks = engine.discover(&session).await?;
            info!(count = notebooks.len(), "listed notebooks");
            Ok(notebooks)
        })
        .await
    }

    #[instrument(skip(self))]
    pub async fn create_notebook(&self, name: &str) -> Result<Notebook> {
        const OPERATION: &str = "Failed to create notebook";
        let name = name.trim();
        if name.is_empty() {
            return Err(invalid("notebook name must not be empty").at_boundary(OPERATION));
        }

        self.run(OPERATION, |session| async move {
            let t = &self.config.timeouts;
            session.navigate(&self.config.app.base_url).await?;

            let create = self
                .resolver
                .resolve_one(&session, Slot::CreateNotebookButton, ms(t.primary_control_ms))
                .await?;
            session.click(&create).await?;

            match self
                .resolver
                .resolve_one(&session, Slot::NotebookNameInput, ms(t.name_input_ms))
                .await
            {
                Ok(input) => {
                    session.fill(&input, name).await?;
                    session.press(&input, "Enter").await?;
                }
                Err(e) if e.is_ui_timeout() => {
                    debug!("no name field, notebook keeps its default name");
                }
                Err(e) => return Err(e),
            }

            let landed = session
                .wait_for_url(|url| extract_notebook_id(url).is_some(), ms(t.settle_ms))
                .await?;

            match landed.as_deref().and_then(|url| extract_notebook_id(url).map(|id| (url, id))) {
                Some((url, id)) => {
                    info!(%id, "notebook created");
                    Ok(Notebook {
                        id,
                        title: name.to_string(),
                        url: url.to_string(),
                    })
                }
                None => Err(PilotError::NavigationMismatch {
                    expected: self.config.app.notebook_url("<id>"),
                    actual: session.current_url().await?,
                }),
            }
        })
        .await
    }

    #[instrument(skip(self, content), fields(content_len = content.len()))]
    pub async fn add_source(
        &self,
        notebook_id: &str,
        source_type: SourceType,
        content: &str,
    ) -> Result<StatusRecord> {
        const OPERATION: &str = "Failed to add source";
        check_notebook_id(notebook_id).map_err(|e| e.at_boundary(OPERATION))?;
        check_source_content(source_type, content).map_err(|e| e.at_boundary(OPERATION))?;

        self.run(OPERATION, |session| async move {
            let t = &self.config.timeouts;
            self.open_notebook(&session, notebook_id).await?;

            self.click_slot(&session, Slot::AddSourceButton, ms(t.primary_control_ms))
                .await?;

            let (type_slot, input_slot) = source_slots(source_type);
            self.click_slot(&session, type_slot, ms(t.candidate_ms)).await?;

            let input = self
                .resolver
                .resolve_one(&session, input_slot, ms(t.candidate_ms))
                .await?;
            session.fill(&input, content).await?;

            self.click_slot(&session, Slot::SubmitButton, ms(t.candidate_ms))
                .await?;

            let waiter = self.waiter();
            if waiter
                .wait_for_start(&session, ms(t.source_processing_ms))
                .await
            {
                let outcome = waiter.wait(&session).await;
                debug!(?outcome, "source processing");
            }

            Ok(StatusRecord::success(
                notebook_id,
                format!("Added {source_type} source to notebook"),
            ))
        })
        .await
    }

    #[instrument(skip(self, query), fields(query_len = query.len()))]
    pub async fn query_notebook(&self, notebook_id: &str, query: &str) -> Result<String> {
        const OPERATION: &str = "Failed to query notebook";
        check_notebook_id(notebook_id).map_err(|e| e.at_boundary(OPERATION))?;
        if query.trim().is_empty() {
            return Err(invalid("query must not be empty").at_boundary(OPERATION));
        }

        self.run(OPERATION, |session| async move {
            let t = &self.config.timeouts;
            self.open_notebook(&session, notebook_id).await?;

            let input = self
                .resolver
                .resolve_one(&session, Slot::ChatInput, ms(t.primary_control_ms))
                .await?;
            session.fill(&input, query).await?;

            match self
                .resolver
                .resolve_one(&session, Slot::ChatSubmit, ms(t.chat_submit_ms))
                .await
            {
                Ok(submit) => session.click(&submit).await?,
                Err(e) if e.is_ui_timeout() => {
                    debug!("no send button, submitting with Enter");
                    session.press(&input, "Enter").await?;
                }
                Err(e) => return Err(e),
            }

            let outcome = self.waiter().wait(&session).await;
            if outcome != Completion::Finished {
                debug!(?outcome, "reading response without a confirmed completion");
            }

            let responses = self
                .resolver
                .resolve_all(&session, Slot::ChatResponse, ms(t.primary_control_ms))
                .await?;

            let answer = match responses.last() {
                Some(latest) => session.inner_text(latest).await?,
                None => None,
            };

            match answer.map(|text| text.trim().to_string()) {
                Some(text) if !text.is_empty() => Ok(text),
                _ => Err(PilotError::OperationFailed(
                    "No response received from NotebookLM".to_string(),
                )),
            }
        })
        .await
    }

    #[instrument(skip(self))]
    pub async fn generate_study_guide(
        &self,
        notebook_id: &str,
        guide_type: GuideType,
    ) -> Result<StatusRecord> {
        const OPERATION: &str = "Failed to generate study guide";
        check_notebook_id(notebook_id).map_err(|e| e.at_boundary(OPERATION))?;

        self.run(OPERATION, |session| async move {
            let t = &self.config.timeouts;
            self.open_notebook(&session, notebook_id).await?;

            self.click_slot(&session, Slot::GenerateGuideButton, ms(t.primary_control_ms))
                .await?;
            self.click_slot(&session, guide_slot(guide_type), ms(t.candidate_ms))
                .await?;

            let started = self
                .waiter()
                .wait_for_start(&session, ms(t.guide_trigger_ms))
                .await;
            debug!(started, "study guide triggered");

            Ok(StatusRecord::success(
                notebook_id,
                format!("Generated {guide_type} study guide"),
            )
            .with_guide_type(guide_type))
        })
        .await
    }

    #[instrument(skip(self))]
    pub async fn generate_audio_overview(&self, notebook_id: &str) -> Result<StatusRecord> {
        const OPERATION: &str = "Failed to generate audio overview";
        check_notebook_id(notebook_id).map_err(|e| e.at_boundary(OPERATION))?;

        self.run(OPERATION, |session| async move {
            let t = &self.config.timeouts;
            self.open_notebook(&session, notebook_id).await?;

            self.click_slot(&session, Slot::GenerateAudioButton, ms(t.primary_control_ms))
                .await?;

            let started = self
                .waiter()
                .wait_for_start(&session, ms(t.audio_trigger_ms))
                .await;
            debug!(started, "audio overview triggered");

            Ok(
                StatusRecord::success(notebook_id, "Audio overview generation started")
                    .with_note(AUDIO_NOTE),
            )
        })
        .await
    }

    #[instrument(skip(self))]
    pub async fn get_notebook_sources(&self, notebook_id: &str) -> Result<Vec<SourceEntry>> {
        const OPERATION: &str = "Failed to get notebook sources";
        check_notebook_id(notebook_id).map_err(|e| e.at_boundary(OPERATION))?;

        self.run(OPERATION, |session| async move {
            let t = &self.config.timeouts;
            self.open_notebook(&session, notebook_id).await?;

            let elements = self
                .resolver
                .resolve_all(&session, Slot::SourcesList, ms(t.primary_control_ms))
                .await?;

            let mut sources = Vec::with_capacity(elements.len());
            for (position, element) in elements.iter().enumerate() {
                match session.inner_text(element).await {
                    Ok(Some(text)) => sources.push(SourceEntry {
                        index: position + 1,
                        title: truncate_title(&text),
                    }),
                    Ok(None) => debug!(position, "source row vanished"),
                    Err(e) => debug!(position, error = %e, "source title unreadable"),
                }
            }
            Ok(sources)
        })
        .await
    }

    /// Opens a headed browser on the profile so an operator can sign in by
    /// hand, then reports whether the session is signed in once
    /// `operator_done` resolves.
    pub async fn login<F>(&self, operator_done: F) -> Result<bool>
    where
        F: Future<Output = ()>,
    {
        let mut config = self.config.clone();
        config.browser.headless = false;
        let resolver = self.resolver.clone();

        with_session((self.launcher)(), &config, |session| async move {
            session.navigate(&session.config().app.base_url).await?;
            info!("browser open, sign in to your Google account");
            operator_done.await;

            let signed_in = session.is_authenticated(&resolver).await;
            if signed_in {
                info!(profile = %session.config().browser.profile_dir.display(), "session saved");
            } else {
                warn!("sign-in not detected");
            }
            Ok(signed_in)
        })
        .await
    }

    /// Session scope plus the sign-in gate shared by every operation; errors
    /// leave through [`PilotError::at_boundary`].
    async fn run<T, F, Fut>(&self, operation: &'static str, body: F) -> Result<T>
    where
        F: FnOnce(Arc<Session<B>>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let resolver = &self.resolver;
        with_session((self.launcher)(), &self.config, |session| async move {
            if !session.is_authenticated(resolver).await {
                return Err(PilotError::Authentication(NOT_AUTHENTICATED.to_string()));
            }
            body(session).await
        })
        .await
        .map_err(|e| {
            if !e.is_authentication() {
                warn!(%operation, error = %e, "operation failed");
            }
            e.at_boundary(operation)
        })
    }

    async fn open_notebook(&self, session: &Session<B>, notebook_id: &str) -> Result<()> {
        session
            .navigate(&self.config.app.notebook_url(notebook_id))
            .await
    }

    async fn click_slot(&self, session: &Session<B>, slot: Slot, wait: Duration) -> Result<()> {
        let element = self.resolver.resolve_one(session, slot, wait).await?;
        session.click(&element).await
    }

    fn waiter(&self) -> CompletionWaiter {
        CompletionWaiter::new(self.resolver.clone(), self.config.timeouts.clone())
    }
}

fn source_slots(source_type: SourceType) -> (Slot, Slot) {
    match source_type {
        SourceType::Website => (Slot::SourceTypeWebsite, Slot::SourceUrlInput),
        SourceType::Youtube => (Slot::SourceTypeYoutube, Slot::SourceUrlInput),
        SourceType::Text => (Slot::SourceTypeText, Slot::SourceTextInput),
    }
}

fn guide_slot(guide_type: GuideType) -> Slot {
    match guide_type {
        GuideType::Faq => Slot::GuideTypeFaq,
        GuideType::BriefingDoc => Slot::GuideTypeBriefing,
        GuideType::TableOfContents => Slot::GuideTypeToc,
    }
}

fn check_notebook_id(notebook_id: &str) -> Result<()> {
    if validate_notebook_id(notebook_id) {
        Ok(())
    } else {
        Err(invalid(format!("'{notebook_id}' is not a notebook id")))
    }
}

fn check_source_content(source_type: SourceType, content: &str) -> Result<()> {
    if content.trim().is_empty() {
        return Err(invalid("source content must not be empty"));
    }
    if source_type.takes_url() {
        let parsed = url::Url::parse(content.trim())
            .map_err(|e| invalid(format!("{source_type} source needs a URL: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(invalid(format!(
                "{source_type} source needs an http(s) URL, got {}",
                parsed.scheme()
            )));
        }
    }
    Ok(())
}

fn invalid(message: impl Into<String>) -> PilotError {
    PilotError::InvalidArgument(message.into())
}

fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FixtureBrowser, FixtureEvent};
    use tokio_test::{assert_err, assert_ok};

    const ROOT: &str = "https://notebooklm.google.com";
    const NOTEBOOK: &str = "https://notebooklm.google.com/notebook/nb1";

    const HOME: &str = r#"<html><body>
        <button aria-label="Create new notebook" data-navigate="https://notebooklm.google.com/notebook/fresh">New</button>
        <table>
            <tr mat-row><td class="title-column" data-navigate="https://notebooklm.google.com/notebook/nb1">
                <span class="project-table-title">Thesis</span></td></tr>
        </table>
    </body></html>"#;

    fn client(browser: &FixtureBrowser) -> NotebookClient<FixtureBrowser> {
        let browser = browser.clone();
        NotebookClient::with_launcher(Config::default(), SelectorCatalog::builtin(), move || {
            browser.clone()
        })
    }

    async fn was_closed(browser: &FixtureBrowser) -> bool {
        matches!(browser.events().await.last(), Some(FixtureEvent::Closed))
    }

    #[tokio::test(start_paused = true)]
    async fn signed_out_sessions_fail_with_an_unwrapped_authentication_error() {
        let browser = FixtureBrowser::new()
            .redirect(ROOT, "https://accounts.google.com/v3/signin")
            .page("https://accounts.google.com/v3/signin", "<html><body>Sign in</body></html>");

        let err = assert_err!(client(&browser).list_notebooks().await);

        assert!(err.is_authentication());
        assert_eq!(err.to_string(), NOT_AUTHENTICATED);
        assert!(was_closed(&browser).await);
    }

    #[tokio::test(start_paused = true)]
    async fn lists_notebooks_through_discovery() {
        let browser = FixtureBrowser::new().page(ROOT, HOME);

        let notebooks = client(&browser).list_notebooks().await.unwrap();

        assert_eq!(notebooks.len(), 1);
        assert_eq!(notebooks[0].id, "nb1");
        assert_eq!(notebooks[0].title, "Thesis");
        assert!(was_closed(&browser).await);
    }

    #[tokio::test(start_paused = true)]
    async fn creates_and_names_a_notebook() {
        let browser = FixtureBrowser::new().page(ROOT, HOME).page(
            "https://notebooklm.google.com/notebook/fresh",
            r#"<html><body><input type="text" aria-label="Notebook name"></body></html>"#,
        );

        let notebook = client(&browser).create_notebook("  Reading list ").await.unwrap();

        assert_eq!(notebook.id, "fresh");
        assert_eq!(notebook.title, "Reading list");
        assert_eq!(browser.filled().await, vec!["Reading list".to_string()]);
        assert!(browser
            .events()
            .await
            .iter()
            .any(|e| matches!(e, FixtureEvent::Pressed { key, .. } if key == "Enter")));
    }

    #[tokio::test(start_paused = true)]
    async fn create_fails_when_the_address_never_changes() {
        let home = r#"<html><body><button aria-label="Create notebook">New</button></body></html>"#;
        let browser = FixtureBrowser::new().page(ROOT, home);

        let err = assert_err!(client(&browser).create_notebook("Draft").await);

        assert!(!err.is_authentication());
        let message = err.to_string();
        assert!(message.contains("Failed to create notebook"), "{message}");
        assert!(message.contains("never reached"), "{message}");
    }

    #[tokio::test(start_paused = true)]
    async fn adds_a_text_source() {
        let page = r#"<html><body>
            <button aria-label="Add source">+</button>
            <button aria-label="Paste text">Copied text</button>
            <textarea></textarea>
            <button type="submit">Insert</button>
        </body></html>"#;
        let browser = FixtureBrowser::new().page(ROOT, HOME).page(NOTEBOOK, page);

        let status = client(&browser)
            .add_source("nb1", SourceType::Text, "Some notes")
            .await
            .unwrap();

        assert_eq!(status.status, "success");
        assert_eq!(status.message, "Added text source to notebook");
        assert_eq!(status.notebook_id, "nb1");
        assert_eq!(browser.filled().await, vec!["Some notes".to_string()]);
    }

    const SOURCE_PICKER: &str = r#"<html><body>
        <button aria-label="Add source">+</button>
        <button aria-label="Website">Link</button>
        <button aria-label="YouTube">Video</button>
        <input type="url">
        <button type="submit">Insert</button>
    </body></html>"#;

    async fn source_steps(browser: &FixtureBrowser) -> (Vec<String>, Vec<String>) {
        let mut clicked = Vec::new();
        let mut filled = Vec::new();
        for event in browser.events().await {
            match event {
                FixtureEvent::Clicked { target } => clicked.push(target),
                FixtureEvent::Filled { target, .. } => filled.push(target),
                _ => {}
            }
        }
        (clicked, filled)
    }

    #[tokio::test(start_paused = true)]
    async fn adds_a_website_source_through_the_url_input() {
        let browser = FixtureBrowser::new().page(ROOT, HOME).page(NOTEBOOK, SOURCE_PICKER);

        let status = client(&browser)
            .add_source("nb1", SourceType::Website, "https://example.com/paper")
            .await
            .unwrap();

        assert_eq!(status.message, "Added website source to notebook");
        assert_eq!(browser.filled().await, vec!["https://example.com/paper".to_string()]);
        let (clicked, filled) = source_steps(&browser).await;
        assert!(clicked.iter().any(|t| t.contains("website")));
        assert!(!clicked.iter().any(|t| t.contains("youtube")));
        assert!(filled[0].starts_with(r#"input[type="url"]"#));
        assert!(was_closed(&browser).await);
    }

    #[tokio::test(start_paused = true)]
    async fn adds_a_youtube_source_through_the_url_input() {
        let browser = FixtureBrowser::new().page(ROOT, HOME).page(NOTEBOOK, SOURCE_PICKER);

        let status = client(&browser)
            .add_source("nb1", SourceType::Youtube, "https://www.youtube.com/watch?v=abc")
            .await
            .unwrap();

        assert_eq!(status.message, "Added youtube source to notebook");
        assert_eq!(
            browser.filled().await,
            vec!["https://www.youtube.com/watch?v=abc".to_string()]
        );
        let (clicked, filled) = source_steps(&browser).await;
        assert!(clicked.iter().any(|t| t.contains("youtube")));
        assert!(!clicked.iter().any(|t| t.contains("website")));
        assert!(filled[0].starts_with(r#"input[type="url"]"#));
    }

    #[tokio::test(start_paused = true)]
    async fn rejects_bad_input_before_launching() {
        let browser = FixtureBrowser::new().page(ROOT, HOME);
        let client = client(&browser);

        let err = assert_err!(client.add_source("nb1", SourceType::Website, "not a url").await);
        assert!(err.to_string().contains("needs a URL"));

        let err = assert_err!(client.add_source("nb1", SourceType::Youtube, "ftp://x.org/v").await);
        assert!(err.to_string().contains("http(s)"));

        assert_err!(client.query_notebook("nb/1", "hello").await);
        assert_err!(client.query_notebook("nb1", "   ").await);
        assert_err!(client.create_notebook("").await);

        assert!(browser.events().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn query_returns_the_latest_response() {
        let page = r#"<html><body>
            <div class="to-user-message-card-content"><div class="message-text-content">Earlier answer</div></div>
            <div class="to-user-message-card-content" data-visible-from="4000">
                <div class="message-text-content">
                    Sources agree on the date.
                </div>
            </div>
            <div class="thinking-message" data-visible-from="300" data-visible-until="4000">Thinking</div>
            <textarea aria-label="Query box"></textarea>
            <button aria-label="Send">Send</button>
        </body></html>"#;
        let browser = FixtureBrowser::new().page(ROOT, HOME).page(NOTEBOOK, page);

        let answer = client(&browser).query_notebook("nb1", "When?").await.unwrap();

        assert_eq!(answer, "Sources agree on the date.");
        assert_eq!(browser.filled().await, vec!["When?".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn query_submits_with_enter_without_a_send_button() {
        let page = r#"<html><body>
            <textarea placeholder="Start typing..."></textarea>
            <div class="to-user-message-inner-content">Answer</div>
        </body></html>"#;
        let browser = FixtureBrowser::new().page(ROOT, HOME).page(NOTEBOOK, page);

        let answer = client(&browser).query_notebook("nb1", "Hi").await.unwrap();

        assert_eq!(answer, "Answer");
        assert!(browser
            .events()
            .await
            .iter()
            .any(|e| matches!(e, FixtureEvent::Pressed { key, .. } if key == "Enter")));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_response_is_reported_by_extraction() {
        let page = r#"<html><body><textarea></textarea><button aria-label="Send">Send</button></body></html>"#;
        let browser = FixtureBrowser::new().page(ROOT, HOME).page(NOTEBOOK, page);

        let err = assert_err!(client(&browser).query_notebook("nb1", "Hello?").await);

        let message = err.to_string();
        assert!(message.contains("Failed to query notebook"), "{message}");
        assert!(message.contains("No response received"), "{message}");
        assert!(was_closed(&browser).await);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_controls_surface_as_ui_timeouts() {
        let browser = FixtureBrowser::new()
            .page(ROOT, HOME)
            .page(NOTEBOOK, "<html><body></body></html>");

        let err = assert_err!(client(&browser).generate_audio_overview("nb1").await);

        assert!(err.to_string().contains("NotebookLM UI timed out"));
        assert!(err.to_string().contains("generate_audio_button"));
    }

    #[tokio::test(start_paused = true)]
    async fn triggers_a_study_guide() {
        let page = r#"<html><body>
            <button aria-label="Study guide">Study guide</button>
            <button>Briefing doc</button>
        </body></html>"#;
        let browser = FixtureBrowser::new().page(ROOT, HOME).page(NOTEBOOK, page);

        let status = client(&browser)
            .generate_study_guide("nb1", GuideType::BriefingDoc)
            .await
            .unwrap();

        assert_eq!(status.guide_type, Some(GuideType::BriefingDoc));
        assert_eq!(status.message, "Generated briefing_doc study guide");
    }

    #[tokio::test(start_paused = true)]
    async fn audio_overview_is_acknowledged_with_a_note() {
        let page = r#"<html><body><button aria-label="Audio Overview">Generate</button></body></html>"#;
        let browser = FixtureBrowser::new().page(ROOT, HOME).page(NOTEBOOK, page);

        let status = assert_ok!(client(&browser).generate_audio_overview("nb1").await);

        assert_eq!(status.note.as_deref(), Some(AUDIO_NOTE));
    }

    #[tokio::test(start_paused = true)]
    async fn lists_sources_with_truncated_titles() {
        let long = "x".repeat(140);
        let page = format!(
            r#"<html><body>
                <div data-testid="source-item"> paper.pdf </div>
                <div data-testid="source-item">{long}</div>
            </body></html>"#
        );
        let browser = FixtureBrowser::new().page(ROOT, HOME).page(NOTEBOOK, &page);

        let sources = client(&browser).get_notebook_sources("nb1").await.unwrap();

        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0], SourceEntry { index: 1, title: "paper.pdf".to_string() });
        assert_eq!(sources[1].index, 2);
        assert_eq!(sources[1].title.chars().count(), 100);
    }

    #[tokio::test(start_paused = true)]
    async fn login_runs_headed_and_reports_sign_in() {
        let browser = FixtureBrowser::new().page(ROOT, HOME);

        let signed_in = client(&browser).login(async {}).await.unwrap();

        assert!(signed_in);
        assert!(matches!(
            browser.events().await.first(),
            Some(FixtureEvent::Launched { headless: false, .. })
        ));
    }

    #[test]
    fn health_reports_configuration_only() {
        let browser = FixtureBrowser::new();
        let report = client(&browser).health();
        assert_eq!(report.status, "healthy");
        assert!(report.headless);
        assert_eq!(report.catalog_version, crate::selectors::BUILTIN_CATALOG_VERSION);
    }
}
