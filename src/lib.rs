//! # medassist
//!
//! A retrieval-augmented medical assistant for the terminal.
//!
//! Each question is answered from exactly one context: the closest passage
//! of a local document index when one is close enough, otherwise the top
//! web search result, otherwise a fixed "nothing found" message. The
//! context, a short window of recent conversation and the question go to
//! an OpenAI-compatible chat model (local or hosted). Conversations are
//! saved as JSON files and can be exported to PDF.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌────────────┐   ┌───────────────┐
//! │ Documents │──▶│ Chunk+Embed│──▶│ SQLite index  │
//! └───────────┘   └────────────┘   └──────┬────────┘
//!                                         │
//!   question ──▶ Retriever ──(cache)──────┤ ──▶ web search
//!                    │                    │
//!                    ▼                    ▼
//!               Generator ◀── memory ── Session store ──▶ PDF export
//!                    │
//!                    ▼
//!                 answer ──▶ event log
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! medassist index                         # build the document index
//! medassist ask "What are flu symptoms?"
//! medassist chat                          # interactive session
//! medassist sessions list
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Domain error taxonomy |
//! | [`extract`] | Text extraction (plain text, PDF) |
//! | [`connector_fs`] | Document directory scanner |
//! | [`chunk`] | Text chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`ingest`] | Index builder |
//! | [`index`] | Vector index client |
//! | [`websearch`] | Web search fallback |
//! | [`cache`] | Retrieval result caches |
//! | [`retrieval`] | Document-or-web context selection |
//! | [`memory`] | Recent-turn prompt memory |
//! | [`llm`] | Chat-completion client |
//! | [`generator`] | Prompt assembly and generation |
//! | [`session`] | Conversation persistence |
//! | [`events`] | JSONL event log |
//! | [`export`] | PDF transcript export |
//! | [`assistant`] | One full interaction |
//! | [`commands`] | Non-interactive CLI commands |
//! | [`chat`] | Interactive chat loop |
//! | [`logging`] | Tracing subscriber setup |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod assistant;
pub mod cache;
pub mod chat;
pub mod chunk;
pub mod commands;
pub mod config;
pub mod connector_fs;
pub mod db;
pub mod embedding;
pub mod error;
pub mod events;
pub mod export;
pub mod extract;
pub mod generator;
pub mod index;
pub mod ingest;
pub mod llm;
pub mod logging;
pub mod memory;
pub mod migrate;
pub mod models;
pub mod retrieval;
pub mod session;
pub mod websearch;
