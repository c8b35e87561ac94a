//! Domain error taxonomy.
//!
//! Every external collaborator (index, web search, chat completion, file
//! storage) reports failures through [`AssistError`]. The component that
//! calls the collaborator converts the error into a degraded result; only
//! the CLI layer ever turns one of these into a process exit.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssistError {
    /// The vector index failed to load or to answer a query.
    #[error("index unavailable: {0}")]
    IndexUnavailable(String),
    /// The web search API returned an error, a non-success status, or bad JSON.
    #[error("web search unavailable: {0}")]
    SearchUnavailable(String),
    /// The chat-completion call failed or returned a malformed response.
    #[error("generation failed: {0}")]
    GenerationFailed(String),
    /// A session or log file could not be written.
    #[error("persistence failed: {0}")]
    PersistenceFailed(String),
    #[error("session not found: {0}")]
    SessionNotFound(String),
    #[error("export failed: {0}")]
    ExportFailed(String),
}

impl AssistError {
    pub fn index<E: std::fmt::Display>(err: E) -> Self {
        AssistError::IndexUnavailable(err.to_string())
    }

    pub fn search<E: std::fmt::Display>(err: E) -> Self {
        AssistError::SearchUnavailable(err.to_string())
    }

    pub fn generation<E: std::fmt::Display>(err: E) -> Self {
        AssistError::GenerationFailed(err.to_string())
    }

    pub fn persistence<E: std::fmt::Display>(err: E) -> Self {
        AssistError::PersistenceFailed(err.to_string())
    }
}
