//! Core data models used throughout medassist.
//!
//! The retrieval types ([`RetrievalResult`], [`ScoredDocument`]) flow from
//! the index and web clients through the orchestrator; the conversation
//! types ([`Turn`], [`Session`]) flow through memory, persistence and
//! export. [`SourceItem`] and [`Chunk`] exist only while building the index.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Which tier of the retrieval chain produced a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    InternalDoc,
    Web,
    None,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::InternalDoc => "internal_doc",
            SourceKind::Web => "web",
            SourceKind::None => "none",
        }
    }
}

/// The context chosen for one query. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalResult {
    pub content: String,
    pub source_kind: SourceKind,
    pub source_label: String,
}

/// A document returned by the vector index with its distance to the query.
///
/// Lower distance means more similar.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredDocument {
    pub text: String,
    pub metadata: HashMap<String, String>,
    pub distance: f32,
}

impl ScoredDocument {
    pub fn source(&self) -> Option<&str> {
        self.metadata.get("source").map(String::as_str)
    }
}

/// The single top result of a web search.
#[derive(Debug, Clone, PartialEq)]
pub struct WebHit {
    pub title: String,
    pub snippet: String,
    pub url: String,
}

/// A question and the answer it received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub question: String,
    pub answer: String,
}

impl Turn {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }
}

/// Speaker of a stored message.
///
/// Stored as `user` / `assistant`; shown to people as `User` / `Agent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn display_label(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Agent",
        }
    }
}

/// One persisted conversation. Its `id` is the backing file's stem.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Local>,
    pub turns: Vec<Turn>,
}

/// List-view metadata for a session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub id: String,
    pub title: String,
    pub created_at: Option<DateTime<Local>>,
}

/// A document file found under the index root, before chunking.
#[derive(Debug, Clone)]
pub struct SourceItem {
    /// Path relative to the index root; shown as the document's source label.
    pub source: String,
    pub title: String,
    pub content_type: String,
    pub body: String,
    pub updated_at: DateTime<Utc>,
}

/// A chunk of a document's body text.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub chunk_index: i64,
    pub text: String,
    pub hash: String,
}
