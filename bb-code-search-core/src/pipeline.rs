//! High-level pipeline: prompt → structured query → aggregated hits.
//!
//! This module ties the translator and the search driver together:
//!   - Translates the request's prompt with an [`LlmBackend`] into a [`StructuredQuery`]
//!   - Runs the paginated search against a [`SearchBackend`]
//!   - Returns a [`SearchReport`] with the query the model produced and the search outcome
//!
//! # Error Handling
//! A translation failure returns immediately and the search backend is never called.
//! Search failures do not fail the pipeline: they are carried in
//! [`SearchOutcome::error`] next to the hits collected before the failure.
//!
//! # Navigation
//! - Main entrypoint: [`run_search`]
//! - Translator bypass for verbatim queries: [`run_raw_search`]

use tracing::{error, info};

use crate::config::SearchRequest;
use crate::contract::{LlmBackend, SearchBackend, StructuredQuery};
use crate::error::CodeSearchError;
use crate::prompt::PromptTemplate;
use crate::search::{search, SearchOutcome};
use crate::translate::translate;

#[derive(Debug)]
pub struct SearchReport {
    pub query: StructuredQuery,
    /// Version of the prompt template used, `None` for verbatim queries.
    pub template_version: Option<String>,
    pub outcome: SearchOutcome,
}

pub async fn run_search<L, B>(
    request: &SearchRequest,
    template: &PromptTemplate,
    num_ctx: Option<u32>,
    llm: &L,
    backend: &B,
) -> Result<SearchReport, CodeSearchError>
where
    L: LlmBackend + ?Sized,
    B: SearchBackend + ?Sized,
{
    info!(workspace = request.workspace(), "[PIPELINE] Starting prompt-driven search");

    let query = match translate(request, template, num_ctx, llm).await {
        Ok(q) => q,
        Err(e) => {
            error!(error = %e, "[PIPELINE][ERROR] Translation failed, skipping search");
            return Err(CodeSearchError::Translation(e));
        }
    };

    let outcome = search(backend, &query).await;
    Ok(SearchReport {
        query,
        template_version: Some(template.version.clone()),
        outcome,
    })
}

/// Search for `search_term` exactly as given, without consulting the model.
pub async fn run_raw_search<B>(backend: &B, search_term: &str, max_pages: u32) -> SearchReport
where
    B: SearchBackend + ?Sized,
{
    info!(search_term, max_pages, "[PIPELINE] Starting verbatim search");
    let query = StructuredQuery::raw(search_term, max_pages);
    let outcome = search(backend, &query).await;
    SearchReport {
        query,
        template_version: None,
        outcome,
    }
}
