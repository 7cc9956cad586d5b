//! # contract: data types and trait seams for prompt-driven code search
//!
//! This module defines the records that flow through a search and the two traits
//! that isolate the network:
//!
//! - [`LlmBackend`]: sends one completion request to a language model and returns its text.
//! - [`SearchBackend`]: fetches one page of Bitbucket code-search results.
//!
//! The translator ([`crate::translate`]) and the search driver ([`crate::search`]) are
//! generic over these traits, so production clients ([`crate::llm::LlmClient`],
//! [`crate::bitbucket::BitbucketClient`]) and `mockall` mocks are interchangeable.
//!
//! ## Mocking & Testing
//! - Both traits carry `automock` under `cfg(test)` or the `test-export-mocks` feature,
//!   so downstream crates and integration tests can use `MockLlmBackend` / `MockSearchBackend`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use mockall::automock;

use crate::error::{CodeSearchError, TranslationError};

/// Machine-usable search parameters derived from a free-text prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredQuery {
    pub search_term: String,
    pub project_filter: Option<String>,
    /// Always at least 1.
    pub max_pages: u32,
}

impl StructuredQuery {
    /// Uses `search_term` verbatim, bypassing translation.
    pub fn raw(search_term: impl Into<String>, max_pages: u32) -> Self {
        Self {
            search_term: search_term.into(),
            project_filter: None,
            max_pages: max_pages.max(1),
        }
    }

    /// The `search_query` parameter sent to Bitbucket, with the project scope
    /// expressed through the `project:` operator.
    pub fn search_query(&self) -> String {
        match &self.project_filter {
            Some(project) => format!("{} project:{}", self.search_term.trim(), project),
            None => self.search_term.trim().to_string(),
        }
    }
}

/// A piece of a matched line; `is_match` marks the text that hit the query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub text: String,
    #[serde(default)]
    pub is_match: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchLine {
    pub line: u64,
    pub segments: Vec<Segment>,
}

impl MatchLine {
    /// Concatenated segment text, wrapping matched segments in `**` when `highlight` is set.
    pub fn render(&self, highlight: bool) -> String {
        self.segments
            .iter()
            .map(|s| {
                if highlight && s.is_match {
                    format!("**{}**", s.text)
                } else {
                    s.text.clone()
                }
            })
            .collect()
    }
}

/// One file that matched a code search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub file_path: String,
    /// Empty when the repository could not be derived from the file links.
    pub repository: String,
    /// Matched lines rendered as `Line N: text`, one per line.
    pub snippet: String,
    pub content_match_count: u64,
    pub lines: Vec<MatchLine>,
}

impl SearchHit {
    /// `repository/file_path`, or just the path when the repository is unknown.
    pub fn display_name(&self) -> String {
        if self.repository.is_empty() {
            self.file_path.clone()
        } else {
            format!("{}/{}", self.repository, self.file_path)
        }
    }

    /// Snippet rendering with optional highlighting of matched segments.
    pub fn render_snippet(&self, highlight: bool) -> String {
        render_lines(&self.lines, highlight)
    }
}

/// Renders lines as `Line N: text`, skipping lines whose text is blank.
pub fn render_lines(lines: &[MatchLine], highlight: bool) -> String {
    lines
        .iter()
        .filter_map(|l| {
            let text = l.render(highlight);
            if text.trim().is_empty() {
                None
            } else {
                Some(format!("Line {}: {}", l.line, text))
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Hits in page-arrival order, then within-page order. Never reordered or deduplicated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SearchResultSet {
    hits: Vec<SearchHit>,
}

impl SearchResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append_page(&mut self, page_hits: Vec<SearchHit>) {
        self.hits.extend(page_hits);
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SearchHit> {
        self.hits.iter()
    }

    pub fn as_slice(&self) -> &[SearchHit] {
        &self.hits
    }
}

impl<'a> IntoIterator for &'a SearchResultSet {
    type Item = &'a SearchHit;
    type IntoIter = std::slice::Iter<'a, SearchHit>;

    fn into_iter(self) -> Self::IntoIter {
        self.hits.iter()
    }
}

/// One page of code-search results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPage {
    pub hits: Vec<SearchHit>,
    /// Whether the API advertised a following page.
    pub has_next: bool,
}

/// A single chat completion: one system message, one user message and sampling parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub system: String,
    pub prompt: String,
    pub temperature: f32,
    pub top_p: f32,
    pub num_ctx: Option<u32>,
}

/// Trait for talking to a language model.
/// Implemented by the HTTP client and by test mocks.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Send one completion request and return the model's reply text.
    async fn complete(&self, request: CompletionRequest) -> Result<String, TranslationError>;
}

/// Trait for fetching code-search result pages for a fixed workspace.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Fetch page `page` (1-based) of results for `search_query`.
    async fn fetch_page(&self, search_query: &str, page: u32)
        -> Result<SearchPage, CodeSearchError>;
}
