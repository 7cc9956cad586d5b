//! Error taxonomy shared by the translator, the search driver and the CLI.

use thiserror::Error;

/// Failure to turn a prompt into a [`crate::contract::StructuredQuery`].
#[derive(Debug, Error)]
pub enum TranslationError {
    #[error("LLM service unreachable: {0}")]
    Transport(String),

    #[error("LLM request timed out: {0}")]
    Timeout(String),

    #[error("LLM service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("LLM reply could not be parsed: {0}")]
    MalformedReply(String),

    #[error("LLM reply did not contain a search term")]
    MissingSearchTerm,
}

#[derive(Debug, Error)]
pub enum CodeSearchError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("translation failed: {0}")]
    Translation(#[from] TranslationError),

    #[error("Bitbucket rejected the supplied credentials (HTTP {status})")]
    Auth { status: u16 },

    #[error("Bitbucket search API returned HTTP {status}: {body}")]
    SearchApi { status: u16, body: String },

    #[error("Bitbucket transport error: {0}")]
    Transport(String),
}

impl CodeSearchError {
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    /// Maps a non-success Bitbucket status to the matching variant.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => Self::Auth { status },
            _ => Self::SearchApi { status, body },
        }
    }
}
