//! Core domain types and the request/response envelopes for Fathom.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum snippet length (in characters) before the ellipsis marker.
pub const SNIPPET_MAX_CHARS: usize = 200;

/// Marker appended to any text cut short by [`truncate_chars`].
pub const ELLIPSIS: &str = "...";

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one pipeline invocation (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Research entities
// ---------------------------------------------------------------------------

/// One decomposed unit of a research topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtask {
    pub id: String,
    pub description: String,
}

/// Outcome of one subtask: the model answer or a readable error string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtaskResult {
    pub task_id: String,
    pub content: String,
}

/// A single web source contributing to a search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub title: String,
    pub url: String,
    pub snippet: String,
    /// Set when the content was synthesized rather than scraped.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub synthetic: bool,
}

impl SourceRecord {
    /// Build a record from full body text, truncating it into a snippet.
    pub fn new(title: impl Into<String>, url: impl Into<String>, body: &str) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            snippet: truncate_chars(body.trim(), SNIPPET_MAX_CHARS),
            synthetic: false,
        }
    }

    /// Mark this record as synthesized content.
    pub fn synthetic(mut self) -> Self {
        self.synthetic = true;
        self
    }
}

/// Externally visible response of web-search and summary modes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub summary: String,
    pub sources: Vec<SourceRecord>,
    /// Always equal to `sources.len()` on results built by [`SearchResult::new`].
    #[serde(default)]
    pub total_pages: usize,
}

impl SearchResult {
    pub fn new(summary: impl Into<String>, sources: Vec<SourceRecord>) -> Self {
        let total_pages = sources.len();
        Self {
            summary: summary.into(),
            sources,
            total_pages,
        }
    }
}

/// Analysis depth requested for web-search summaries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Quick,
    #[default]
    Comprehensive,
    Exploratory,
}

impl SearchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quick => "quick",
            Self::Comprehensive => "comprehensive",
            Self::Exploratory => "exploratory",
        }
    }
}

impl std::fmt::Display for SearchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SearchMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "quick" => Ok(Self::Quick),
            "comprehensive" => Ok(Self::Comprehensive),
            "exploratory" => Ok(Self::Exploratory),
            other => Err(format!(
                "unknown search mode '{other}': expected quick, comprehensive, or exploratory"
            )),
        }
    }
}

/// A prior conversation turn supplied with a plain-chat request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatTurn {
    pub is_user: bool,
    pub content: String,
}

// ---------------------------------------------------------------------------
// Envelopes
// ---------------------------------------------------------------------------

/// Inbound request envelope shared by every mode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchRequest {
    #[serde(default)]
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_mode: Option<SearchMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_sources: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fast_mode: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deep_research: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_mode: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_results: Option<SearchResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_history: Option<Vec<ChatTurn>>,
}

impl ResearchRequest {
    /// A web-search request for `query` with every option left at its default.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }
}

/// Outbound response envelope; the shape depends on the selected mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResearchResponse {
    /// Deep-research report or chat reply.
    Report { response: String },
    /// Web-search or summary-only result.
    Search(SearchResult),
    /// Unrecoverable error with a best-effort explanation.
    Failure { error: String, summary: String },
}

impl ResearchResponse {
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failure { .. })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Truncate `text` to at most `max_chars` characters, appending [`ELLIPSIS`]
/// when anything was cut. Operates on chars, never splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}{ELLIPSIS}", text[..byte_idx].trim_end()),
        None => text.to_string(),
    }
}
