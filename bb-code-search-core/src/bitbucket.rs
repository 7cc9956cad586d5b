//! Bitbucket Cloud code-search client implementing [`SearchBackend`].
//!
//! Requests `GET {api}/2.0/workspaces/{workspace}/search/code` with HTTP basic auth.
//! Each page is decoded into [`SearchHit`]s; only `code_search_result` entries that
//! carry a file path are kept, and the repository name is taken from the file's
//! `self` link (`.../repositories/{workspace}/{repo}/src/...`).

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::config::BitbucketCredentials;
use crate::contract::{render_lines, MatchLine, SearchBackend, SearchHit, SearchPage, Segment};
use crate::error::CodeSearchError;

pub const DEFAULT_BITBUCKET_API_URL: &str = "https://api.bitbucket.org";
pub const DEFAULT_BITBUCKET_TIMEOUT_SECS: u64 = 30;

const CODE_SEARCH_RESULT: &str = "code_search_result";

#[derive(Debug, Clone)]
pub struct BitbucketSettings {
    pub api_url: String,
    pub timeout: Duration,
    /// Results per page; the API default applies when unset.
    pub pagelen: Option<u32>,
}

impl Default for BitbucketSettings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_BITBUCKET_API_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_BITBUCKET_TIMEOUT_SECS),
            pagelen: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CodeSearchPage {
    #[serde(default)]
    values: Vec<RawResult>,
    #[serde(default)]
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawResult {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    content_match_count: u64,
    #[serde(default)]
    content_matches: Vec<RawContentMatch>,
    #[serde(default)]
    file: Option<RawFile>,
}

#[derive(Debug, Deserialize)]
struct RawContentMatch {
    #[serde(default)]
    lines: Vec<RawLine>,
}

#[derive(Debug, Deserialize)]
struct RawLine {
    #[serde(default)]
    line: u64,
    #[serde(default)]
    segments: Vec<RawSegment>,
}

#[derive(Debug, Deserialize)]
struct RawSegment {
    #[serde(default)]
    text: String,
    #[serde(rename = "match", default)]
    is_match: bool,
}

#[derive(Debug, Deserialize)]
struct RawFile {
    #[serde(default)]
    path: String,
    #[serde(default)]
    links: RawLinks,
}

#[derive(Debug, Default, Deserialize)]
struct RawLinks {
    #[serde(rename = "self", default)]
    self_link: Option<RawHref>,
}

#[derive(Debug, Deserialize)]
struct RawHref {
    #[serde(default)]
    href: String,
}

fn repository_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"/repositories/[^/]+/([^/?#]+)").expect("repository pattern is valid")
    })
}

/// Repository slug from a file `self` link, or an empty string when absent.
pub fn repository_from_href(href: &str) -> String {
    repository_pattern()
        .captures(href)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

impl RawResult {
    fn into_hit(self) -> Option<SearchHit> {
        if self.kind != CODE_SEARCH_RESULT {
            return None;
        }
        let file = self.file?;
        if file.path.is_empty() {
            return None;
        }
        let repository = file
            .links
            .self_link
            .map(|l| repository_from_href(&l.href))
            .unwrap_or_default();

        let lines: Vec<MatchLine> = self
            .content_matches
            .into_iter()
            .flat_map(|m| m.lines)
            .map(|l| MatchLine {
                line: l.line,
                segments: l
                    .segments
                    .into_iter()
                    .map(|s| Segment {
                        text: s.text,
                        is_match: s.is_match,
                    })
                    .collect(),
            })
            .collect();

        Some(SearchHit {
            file_path: file.path,
            repository,
            snippet: render_lines(&lines, false),
            content_match_count: self.content_match_count,
            lines,
        })
    }
}

/// Decode one code-search response body.
pub fn parse_page(body: &str) -> Result<SearchPage, serde_json::Error> {
    let page: CodeSearchPage = serde_json::from_str(body)?;
    Ok(SearchPage {
        has_next: page.next.is_some(),
        hits: page.values.into_iter().filter_map(RawResult::into_hit).collect(),
    })
}

pub struct BitbucketClient {
    http: reqwest::Client,
    settings: BitbucketSettings,
    workspace: String,
    credentials: BitbucketCredentials,
}

impl BitbucketClient {
    pub fn new(
        settings: BitbucketSettings,
        workspace: impl Into<String>,
        credentials: BitbucketCredentials,
    ) -> Result<Self, CodeSearchError> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| CodeSearchError::Transport(e.to_string()))?;
        let workspace = workspace.into();
        info!(
            api_url = %settings.api_url,
            workspace = %workspace,
            username = %credentials.username,
            "Initialized BitbucketClient"
        );
        Ok(Self {
            http,
            settings,
            workspace,
            credentials,
        })
    }

    fn search_url(&self) -> String {
        format!(
            "{}/2.0/workspaces/{}/search/code",
            self.settings.api_url.trim_end_matches('/'),
            self.workspace
        )
    }
}

#[async_trait]
impl SearchBackend for BitbucketClient {
    async fn fetch_page(
        &self,
        search_query: &str,
        page: u32,
    ) -> Result<SearchPage, CodeSearchError> {
        let url = self.search_url();
        info!(url = %url, search_query, page, "Fetching Bitbucket code search page");

        let mut params: Vec<(&str, String)> = vec![
            ("search_query", search_query.to_string()),
            ("page", page.to_string()),
        ];
        if let Some(pagelen) = self.settings.pagelen {
            params.push(("pagelen", pagelen.to_string()));
        }

        let resp = self
            .http
            .get(&url)
            .query(&params)
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .send()
            .await
            .map_err(|e| {
                error!(error = ?e, url = %url, page, "Failed to reach Bitbucket API");
                CodeSearchError::Transport(e.to_string())
            })?;

        let status = resp.status();
        let text = match resp.text().await {
            Ok(text) => text,
            Err(e) if status.is_success() => {
                error!(error = ?e, url = %url, page, "Failed to read Bitbucket search page body");
                return Err(CodeSearchError::Transport(e.to_string()));
            }
            Err(_) => String::from("<Failed to decode response body>"),
        };

        if !status.is_success() {
            error!(
                status = %status,
                url = %url,
                page,
                "Bitbucket API returned error. Response body: {text}"
            );
            return Err(CodeSearchError::from_status(status.as_u16(), text));
        }

        let parsed = parse_page(&text).map_err(|e| {
            error!(error = ?e, url = %url, page, "Failed to parse Bitbucket search page JSON");
            CodeSearchError::Transport(format!("invalid search page body: {e}"))
        })?;
        debug!(page, hits = parsed.hits.len(), has_next = parsed.has_next, "Decoded search page");
        Ok(parsed)
    }
}
