#![doc = "bb-code-search-core: core logic library for bb-code-search."]

//! This crate holds the data model, trait seams and pipelines for turning a
//! natural-language prompt into Bitbucket code-search results.
//!
//! # Usage
//! - [`pipeline::run_search`] runs translation and search end to end.
//! - [`llm::LlmClient`] and [`bitbucket::BitbucketClient`] are the production backends;
//!   `contract::MockLlmBackend` / `contract::MockSearchBackend` stand in for them in tests.

pub mod bitbucket;
pub mod config;
pub mod contract;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod prompt;
pub mod search;
pub mod translate;

pub use error::{CodeSearchError, TranslationError};
