//! Paginated aggregation of code-search results.
//!
//! Pages are fetched one after another, starting at page 1, until the backend stops
//! advertising a next page or `query.max_pages` requests have been issued. A failing
//! page ends pagination; hits gathered before it are kept in the [`SearchOutcome`].

use tracing::{error, info, warn};

use crate::contract::{SearchBackend, SearchResultSet, StructuredQuery};
use crate::error::CodeSearchError;

/// Result of a search run: the hits collected and, if pagination was cut short
/// by a failure, the error that stopped it.
#[derive(Debug)]
pub struct SearchOutcome {
    pub hits: SearchResultSet,
    pub pages_fetched: u32,
    /// True when pagination stopped at `max_pages` while more pages were available.
    pub truncated: bool,
    pub error: Option<CodeSearchError>,
}

impl SearchOutcome {
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }

    /// Drops partial hits and keeps only the error, if any.
    pub fn into_result(self) -> Result<SearchResultSet, CodeSearchError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.hits),
        }
    }
}

pub async fn search<B>(backend: &B, query: &StructuredQuery) -> SearchOutcome
where
    B: SearchBackend + ?Sized,
{
    let search_query = query.search_query();
    let max_pages = query.max_pages.max(1);
    info!(search_query = %search_query, max_pages, "[SEARCH] Starting code search");

    let mut hits = SearchResultSet::new();
    let mut pages_fetched = 0;
    let mut truncated = false;
    let mut failure = None;

    let mut page = 1;
    loop {
        pages_fetched += 1;
        match backend.fetch_page(&search_query, page).await {
            Ok(result) => {
                info!(page, hits = result.hits.len(), "[SEARCH] Page received");
                hits.append_page(result.hits);
                if !result.has_next {
                    break;
                }
                if pages_fetched >= max_pages {
                    warn!(max_pages, "[SEARCH] Reached maximum page limit");
                    truncated = true;
                    break;
                }
                page += 1;
            }
            Err(e) => {
                error!(page, error = %e, collected = hits.len(), "[SEARCH][ERROR] Page fetch failed, stopping");
                failure = Some(e);
                break;
            }
        }
    }

    info!(
        pages_fetched,
        hits = hits.len(),
        complete = failure.is_none(),
        "[SEARCH] Code search finished"
    );

    SearchOutcome {
        hits,
        pages_fetched,
        truncated,
        error: failure,
    }
}
