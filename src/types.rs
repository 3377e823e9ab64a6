use crate::errors::PilotError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const UNTITLED: &str = "Untitled";
pub const MAX_SOURCE_TITLE_CHARS: usize = 100;

const NOTEBOOK_PATH_MARKER: &str = "/notebook/";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notebook {
    /// Opaque id taken from the detail page address
    pub id: String,
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Website,
    Youtube,
    Text,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Website => "website",
            SourceType::Youtube => "youtube",
            SourceType::Text => "text",
        }
    }

    /// Website and YouTube sources carry a URL, text sources carry raw text.
    pub fn takes_url(&self) -> bool {
        matches!(self, SourceType::Website | SourceType::Youtube)
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = PilotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "website" => Ok(SourceType::Website),
            "youtube" => Ok(SourceType::Youtube),
            "text" => Ok(SourceType::Text),
            other => Err(PilotError::InvalidArgument(format!(
                "source type must be website, youtube or text, got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuideType {
    Faq,
    BriefingDoc,
    TableOfContents,
}

impl GuideType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GuideType::Faq => "faq",
            GuideType::BriefingDoc => "briefing_doc",
            GuideType::TableOfContents => "table_of_contents",
        }
    }
}

impl fmt::Display for GuideType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GuideType {
    type Err = PilotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "faq" => Ok(GuideType::Faq),
            "briefing_doc" => Ok(GuideType::BriefingDoc),
            "table_of_contents" => Ok(GuideType::TableOfContents),
            other => Err(PilotError::InvalidArgument(format!(
                "guide type must be faq, briefing_doc or table_of_contents, got '{other}'"
            ))),
        }
    }
}

/// Acknowledgment for operations whose effect completes inside NotebookLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusRecord {
    pub status: String,
    pub message: String,
    pub notebook_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guide_type: Option<GuideType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl StatusRecord {
    pub fn success(notebook_id: &str, message: impl Into<String>) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
            notebook_id: notebook_id.to_string(),
            guide_type: None,
            note: None,
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn with_guide_type(mut self, guide_type: GuideType) -> Self {
        self.guide_type = Some(guide_type);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceEntry {
    /// 1-based position in the sources panel
    pub index: usize,
    pub title: String,
}

/// Trailing path segment after the last `/notebook/`, cut at the first `?` or `#`.
pub fn extract_notebook_id(url: &str) -> Option<String> {
    let (_, tail) = url.rsplit_once(NOTEBOOK_PATH_MARKER)?;
    let id = tail.split(['?', '#']).next().unwrap_or_default();
    if id.is_empty() {
        return None;
    }
    Some(id.to_string())
}

pub fn validate_notebook_id(notebook_id: &str) -> bool {
    !notebook_id.is_empty() && !notebook_id.contains(['?', '#', '/'])
}

/// Trimmed, cut to `MAX_SOURCE_TITLE_CHARS` characters.
pub fn truncate_title(raw: &str) -> String {
    raw.trim().chars().take(MAX_SOURCE_TITLE_CHARS).collect()
}
