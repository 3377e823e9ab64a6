//! Versioned table of candidate selectors for every semantic UI slot.
//!
//! NotebookLM ships obfuscated, frequently changing markup. Each slot maps to
//! an ordered list of structural queries: the current UI first, legacy and
//! generic shapes last. The table is data, so a JSON file can redefine any
//! slot without touching resolution logic.

use crate::errors::{PilotError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

pub const BUILTIN_CATALOG_VERSION: &str = "2025-01";

/// A named semantic location in the UI, independent of its markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    NotebookRow,
    NotebookRowTitle,
    NotebookRowLink,
    CreateNotebookButton,
    NotebookNameInput,
    AddSourceButton,
    SourceTypeWebsite,
    SourceTypeText,
    SourceTypeYoutube,
    SourceUrlInput,
    SourceTextInput,
    ChatInput,
    ChatSubmit,
    ChatResponse,
    GenerateGuideButton,
    GuideTypeFaq,
    GuideTypeBriefing,
    GuideTypeToc,
    GenerateAudioButton,
    SourcesList,
    ThinkingIndicator,
    LoadingIndicator,
    SubmitButton,
    SignedInIndicator,
}

impl Slot {
    pub const ALL: [Slot; 24] = [
        Slot::NotebookRow,
        Slot::NotebookRowTitle,
        Slot::NotebookRowLink,
        Slot::CreateNotebookButton,
        Slot::NotebookNameInput,
        Slot::AddSourceButton,
        Slot::SourceTypeWebsite,
        Slot::SourceTypeText,
        Slot::SourceTypeYoutube,
        Slot::SourceUrlInput,
        Slot::SourceTextInput,
        Slot::ChatInput,
        Slot::ChatSubmit,
        Slot::ChatResponse,
        Slot::GenerateGuideButton,
        Slot::GuideTypeFaq,
        Slot::GuideTypeBriefing,
        Slot::GuideTypeToc,
        Slot::GenerateAudioButton,
        Slot::SourcesList,
        Slot::ThinkingIndicator,
        Slot::LoadingIndicator,
        Slot::SubmitButton,
        Slot::SignedInIndicator,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Slot::NotebookRow => "notebook_row",
            Slot::NotebookRowTitle => "notebook_row_title",
            Slot::NotebookRowLink => "notebook_row_link",
            Slot::CreateNotebookButton => "create_notebook_button",
            Slot::NotebookNameInput => "notebook_name_input",
            Slot::AddSourceButton => "add_source_button",
            Slot::SourceTypeWebsite => "source_type_website",
            Slot::SourceTypeText => "source_type_text",
            Slot::SourceTypeYoutube => "source_type_youtube",
            Slot::SourceUrlInput => "source_url_input",
            Slot::SourceTextInput => "source_text_input",
            Slot::ChatInput => "chat_input",
            Slot::ChatSubmit => "chat_submit",
            Slot::ChatResponse => "chat_response",
            Slot::GenerateGuideButton => "generate_guide_button",
            Slot::GuideTypeFaq => "guide_type_faq",
            Slot::GuideTypeBriefing => "guide_type_briefing",
            Slot::GuideTypeToc => "guide_type_toc",
            Slot::GenerateAudioButton => "generate_audio_button",
            Slot::SourcesList => "sources_list",
            Slot::ThinkingIndicator => "thinking_indicator",
            Slot::LoadingIndicator => "loading_indicator",
            Slot::SubmitButton => "submit_button",
            Slot::SignedInIndicator => "signed_in_indicator",
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One concrete structural query attempting to locate a slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Candidate {
    /// Plain CSS selector.
    Css(String),
    /// CSS selector narrowed to elements whose text contains `text`
    /// (case-insensitive).
    CssWithText { css: String, text: String },
}

impl Candidate {
    pub fn css(selector: impl Into<String>) -> Self {
        Candidate::Css(selector.into())
    }

    pub fn with_text(selector: impl Into<String>, text: impl Into<String>) -> Self {
        Candidate::CssWithText {
            css: selector.into(),
            text: text.into(),
        }
    }

    pub fn css_part(&self) -> &str {
        match self {
            Candidate::Css(css) | Candidate::CssWithText { css, .. } => css,
        }
    }

    pub fn text_part(&self) -> Option<&str> {
        match self {
            Candidate::Css(_) => None,
            Candidate::CssWithText { text, .. } => Some(text),
        }
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Candidate::Css(css) => f.write_str(css),
            Candidate::CssWithText { css, text } => write!(f, "{css}:has-text(\"{text}\")"),
        }
    }
}

/// Ordered, never-empty candidate list for one slot. Order encodes preference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SelectorSet(Vec<Candidate>);

impl SelectorSet {
    pub fn new(candidates: Vec<Candidate>) -> Result<Self> {
        if candidates.is_empty() {
            return Err(PilotError::Configuration(
                "selector set must contain at least one candidate".to_string(),
            ));
        }
        Ok(Self(candidates))
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn describe(&self) -> Vec<String> {
        self.0.iter().map(ToString::to_string).collect()
    }
}

impl<'de> Deserialize<'de> for SelectorSet {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let candidates = Vec::<Candidate>::deserialize(deserializer)?;
        SelectorSet::new(candidates).map_err(serde::de::Error::custom)
    }
}

fn set(candidates: &[Candidate]) -> SelectorSet {
    SelectorSet(candidates.to_vec())
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    version: String,
    #[serde(default)]
    slots: HashMap<Slot, SelectorSet>,
}

/// Process-wide, read-only mapping from slot to candidate list.
#[derive(Debug, Clone)]
pub struct SelectorCatalog {
    version: String,
    sets: HashMap<Slot, SelectorSet>,
}

impl SelectorCatalog {
    pub fn builtin() -> Self {
        use Candidate as C;

        let mut sets = HashMap::new();
        let mut put = |slot: Slot, candidates: &[Candidate]| {
            sets.insert(slot, set(candidates));
        };

        put(
            Slot::NotebookRow,
            &[
                C::css("tr[mat-row]"),
                C::css(r#"[data-testid="notebook-card"]"#),
                C::css(r#"[aria-label*="notebook" i][role="button"]"#),
                C::css(r#"a[href*="/notebook/"]"#),
                C::css(r#"div[role="listitem"]"#),
            ],
        );
        put(
            Slot::NotebookRowTitle,
            &[
                C::css("td.title-column .project-table-title"),
                C::css(r#"[data-testid="notebook-title"]"#),
                C::css("h2"),
                C::css("h3"),
                C::css(r#"[role="heading"]"#),
            ],
        );
        put(
            Slot::NotebookRowLink,
            &[C::css("td.title-column"), C::css(r#"a[href*="/notebook/"]"#)],
        );
        put(
            Slot::CreateNotebookButton,
            &[
                C::css(r#"[aria-label*="create" i][aria-label*="notebook" i]"#),
                C::with_text("button", "Create"),
                C::css(r#"[data-testid="create-notebook"]"#),
            ],
        );
        put(
            Slot::NotebookNameInput,
            &[
                C::css(r#"[aria-label*="name" i][type="text"]"#),
                C::css(r#"input[placeholder*="name" i]"#),
                C::css(r#"[data-testid="notebook-name-input"]"#),
            ],
        );
        put(
            Slot::AddSourceButton,
            &[
                C::css(r#"[aria-label*="add" i][aria-label*="source" i]"#),
                C::with_text("button", "Add"),
                C::css(r#"[data-testid="add-source"]"#),
                C::css(r#"[aria-label*="upload" i]"#),
            ],
        );
        put(
            Slot::SourceTypeWebsite,
            &[
                C::css(r#"[aria-label*="website" i]"#),
                C::with_text("button", "Website"),
                C::css(r#"[data-testid="source-type-url"]"#),
            ],
        );
        put(
            Slot::SourceTypeText,
            &[
                C::css(r#"[aria-label*="text" i]"#),
                C::with_text("button", "Text"),
                C::css(r#"[data-testid="source-type-text"]"#),
            ],
        );
        put(
            Slot::SourceTypeYoutube,
            &[
                C::css(r#"[aria-label*="youtube" i]"#),
                C::with_text("button", "YouTube"),
                C::css(r#"[data-testid="source-type-youtube"]"#),
            ],
        );
        put(
            Slot::SourceUrlInput,
            &[
                C::css(r#"input[type="url"]"#),
                C::css(r#"input[placeholder*="url" i]"#),
                C::css(r#"[aria-label*="url" i]"#),
            ],
        );
        put(
            Slot::SourceTextInput,
            &[
                C::css("textarea"),
                C::css(r#"[aria-label*="text" i][role="textbox"]"#),
                C::css(r#"[contenteditable="true"]"#),
            ],
        );
        put(
            Slot::ChatInput,
            &[
                C::css(r#"textarea[aria-label*="query" i]"#),
                C::css(r#"textarea[placeholder*="start typing" i]"#),
                // notebook pages carry a single textarea
                C::css("textarea"),
                C::css(r#"textarea[placeholder*="ask" i]"#),
                C::css(r#"textarea[aria-label*="ask" i]"#),
                C::css(r#"[data-testid="chat-input"]"#),
                C::css(r#"textarea[placeholder*="question" i]"#),
            ],
        );
        put(
            Slot::ChatSubmit,
            &[
                C::css(r#"[aria-label*="send" i]"#),
                C::css(r#"button[type="submit"]"#),
                C::css(r#"[data-testid="send-message"]"#),
            ],
        );
        put(
            Slot::ChatResponse,
            &[
                C::css(".to-user-message-card-content .message-text-content"),
                C::css(".to-user-message-inner-content"),
                C::css(r#"div[class*="to-user-message"]"#),
                C::css(r#"[data-testid="chat-message"]"#),
                C::css(r#"[role="article"]"#),
                C::css(r#"div[class*="message"]"#),
            ],
        );
        put(
            Slot::GenerateGuideButton,
            &[
                C::css(r#"[aria-label*="study guide" i]"#),
                C::with_text("button", "Study guide"),
                C::css(r#"[data-testid="generate-study-guide"]"#),
            ],
        );
        put(
            Slot::GuideTypeFaq,
            &[C::with_text("button", "FAQ"), C::css(r#"[aria-label*="faq" i]"#)],
        );
        put(
            Slot::GuideTypeBriefing,
            &[
                C::with_text("button", "Briefing"),
                C::css(r#"[aria-label*="briefing" i]"#),
            ],
        );
        put(
            Slot::GuideTypeToc,
            &[
                C::with_text("button", "Table of contents"),
                C::css(r#"[aria-label*="table of contents" i]"#),
            ],
        );
        put(
            Slot::GenerateAudioButton,
            &[
                C::css(r#"[aria-label*="audio" i]"#),
                C::with_text("button", "Audio overview"),
                C::css(r#"[data-testid="generate-audio"]"#),
            ],
        );
        put(
            Slot::SourcesList,
            &[
                C::css(r#"[data-testid="source-item"]"#),
                C::css(r#"[aria-label*="source" i][role="listitem"]"#),
                C::css(r#"li[class*="source"]"#),
            ],
        );
        put(Slot::ThinkingIndicator, &[C::css(".thinking-message")]);
        put(
            Slot::LoadingIndicator,
            &[
                C::css(r#"[aria-label*="loading" i]"#),
                C::css(r#"[role="progressbar"]"#),
                C::css(r#"div[class*="loading"]"#),
                C::css(r#"div[class*="spinner"]"#),
            ],
        );
        put(
            Slot::SubmitButton,
            &[
                C::css(r#"button[type="submit"]"#),
                C::with_text("button", "Submit"),
                C::with_text("button", "Add"),
                C::with_text("button", "Create"),
            ],
        );
        put(
            Slot::SignedInIndicator,
            &[
                C::css(r#"[aria-label*="notebook" i]"#),
                C::css("[data-testid]"),
                C::css(".notebook"),
            ],
        );

        Self {
            version: BUILTIN_CATALOG_VERSION.to_string(),
            sets,
        }
    }

    /// Built-in table with the slots named in `json` replaced.
    pub fn from_json(json: &str) -> Result<Self> {
        let file: CatalogFile = serde_json::from_str(json)
            .map_err(|e| PilotError::Configuration(format!("invalid selector catalog: {e}")))?;

        let mut catalog = Self::builtin();
        catalog.version = file.version;
        catalog.sets.extend(file.slots);
        Ok(catalog)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            PilotError::Configuration(format!(
                "cannot read selector catalog {}: {e}",
                path.display()
            ))
        })?;
        Self::from_json(&json)
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn get(&self, slot: Slot) -> &SelectorSet {
        // builtin() fills every slot and overrides only replace
        &self.sets[&slot]
    }

    pub fn with_set(mut self, slot: Slot, set: SelectorSet) -> Self {
        self.sets.insert(slot, set);
        self
    }
}

impl Default for SelectorCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
