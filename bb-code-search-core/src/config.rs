use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

use crate::error::CodeSearchError;

pub const DEFAULT_MODEL: &str = "llama3.3";
pub const DEFAULT_TEMPERATURE: f32 = 0.2;
pub const DEFAULT_TOP_P: f32 = 1.0;
/// Upper bound on result pages fetched for a single search.
pub const DEFAULT_MAX_PAGES: u32 = 100;
pub const DEFAULT_NUM_CTX: u32 = 8192;

/// A validated search request built from CLI input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    prompt: String,
    workspace: String,
    model: String,
    temperature: f32,
    top_p: f32,
    max_pages: u32,
}

impl SearchRequest {
    pub fn new(
        prompt: impl Into<String>,
        workspace: impl Into<String>,
        model: impl Into<String>,
        temperature: f32,
        top_p: f32,
        max_pages: u32,
    ) -> Result<Self, CodeSearchError> {
        let prompt = prompt.into();
        let workspace = workspace.into();
        let model = model.into();

        if prompt.trim().is_empty() {
            return Err(CodeSearchError::config("prompt must not be empty"));
        }
        if workspace.trim().is_empty() {
            return Err(CodeSearchError::config("workspace must not be empty"));
        }
        if model.trim().is_empty() {
            return Err(CodeSearchError::config("model must not be empty"));
        }
        if !(0.0..=2.0).contains(&temperature) {
            return Err(CodeSearchError::config(format!(
                "temperature must be within [0.0, 2.0], got {temperature}"
            )));
        }
        if !(0.0..=1.0).contains(&top_p) {
            return Err(CodeSearchError::config(format!(
                "top_p must be within [0.0, 1.0], got {top_p}"
            )));
        }
        if max_pages == 0 {
            return Err(CodeSearchError::config("max_pages must be at least 1"));
        }

        Ok(Self {
            prompt,
            workspace,
            model,
            temperature,
            top_p,
            max_pages,
        })
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn workspace(&self) -> &str {
        &self.workspace
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    pub fn top_p(&self) -> f32 {
        self.top_p
    }

    pub fn max_pages(&self) -> u32 {
        self.max_pages
    }

    pub fn trace_loaded(&self) {
        info!(
            workspace = %self.workspace,
            model = %self.model,
            temperature = self.temperature,
            top_p = self.top_p,
            max_pages = self.max_pages,
            "Loaded SearchRequest"
        );
        debug!(prompt = %self.prompt, "SearchRequest prompt");
    }
}

/// Bitbucket basic-auth credentials (app username and app password).
#[derive(Clone)]
pub struct BitbucketCredentials {
    pub username: String,
    pub password: String,
}

impl BitbucketCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for BitbucketCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BitbucketCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
