//! The assistant context.
//!
//! [`Assistant`] is built once per process and owns everything one
//! interaction needs: the retriever (with its caches and lazily opened
//! index), the answer generator, the session store and the event log.
//! [`Assistant::answer`] runs one full question-to-answer exchange.

use serde_json::json;
use std::path::{Path, PathBuf};

use crate::config::{Config, MemoryConfig};
use crate::embedding::DisabledProvider;
use crate::error::AssistError;
use crate::events::{EventLogger, EventType};
use crate::export;
use crate::generator::Generator;
use crate::index::SqliteIndex;
use crate::llm::OpenAiCompatClient;
use crate::memory;
use crate::models::{Session, SourceKind, Turn};
use crate::retrieval::{Retriever, NOTHING_FOUND};
use crate::session::SessionStore;
use crate::websearch;

pub struct Assistant {
    retriever: Retriever,
    generator: Generator,
    memory: MemoryConfig,
    sessions: SessionStore,
    events: EventLogger,
    export_dir: PathBuf,
}

impl Assistant {
    pub fn new(
        retriever: Retriever,
        generator: Generator,
        memory: MemoryConfig,
        sessions: SessionStore,
        events: EventLogger,
        export_dir: PathBuf,
    ) -> Self {
        Self {
            retriever,
            generator,
            memory,
            sessions,
            events,
            export_dir,
        }
    }

    /// Wire up the production collaborators. Nothing touches the network or
    /// the index until the first question.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let index = SqliteIndex::from_config(config).unwrap_or_else(|err| {
            tracing::warn!(error = %err, "embedding provider unavailable, index lookups will fall back to web search");
            SqliteIndex::new(config.index.path.clone(), Box::new(DisabledProvider))
        });
        let web = websearch::create_web_search(&config.search)?;
        let retriever = Retriever::new(Box::new(index), web, &config.retrieval, &config.cache);

        let llm = OpenAiCompatClient::new(&config.llm)?;
        tracing::info!(
            profile = ?config.llm.profile,
            model = llm.model(),
            "chat completion backend"
        );
        let generator = Generator::new(Box::new(llm), config.llm.system_prompt.clone());

        Ok(Self::new(
            retriever,
            generator,
            config.memory.clone(),
            SessionStore::new(config.sessions.dir.clone()),
            EventLogger::new(config.events.path.clone()),
            config.export.dir.clone(),
        ))
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Answer `question` within `session`, append the turn and save.
    ///
    /// Never fails: retrieval and generation degrade to fixed messages, and
    /// a failed save is logged while the answer is still returned.
    pub async fn answer(&self, session: &mut Session, question: &str) -> String {
        self.events.record(
            EventType::UserQuestion,
            json!({ "session_id": session.id, "question": question }),
        );

        let resolution = self.retriever.resolve(question).await;
        let context = &resolution.result;
        self.events.record(
            EventType::ContextUsed,
            json!({
                "session_id": session.id,
                "source_kind": context.source_kind,
                "source_label": context.source_label,
                "cached": resolution.cached,
                "errors": resolution.errors,
            }),
        );
        tracing::info!(
            source_kind = context.source_kind.as_str(),
            source = %context.source_label,
            cached = resolution.cached,
            "context selected"
        );

        let answer = if context.source_kind == SourceKind::None {
            NOTHING_FOUND.to_string()
        } else {
            let memory_text =
                memory::render(&session.turns, self.memory.window, self.memory.answer_chars);
            self.generator.generate(question, context, &memory_text).await
        };

        self.events.record(
            EventType::AgentResponse,
            json!({ "session_id": session.id, "answer": answer }),
        );

        session.turns.push(Turn::new(question, answer.clone()));
        if let Err(err) = self.sessions.save(session) {
            tracing::error!(session = %session.id, error = %err, "failed to save session");
        }

        answer
    }

    pub fn rename(&self, session: &mut Session, title: &str) -> Result<(), AssistError> {
        session.title = title.trim().to_string();
        if session.turns.is_empty() {
            return Ok(());
        }
        self.sessions.save(session)
    }

    pub fn export(&self, session: &Session) -> Result<PathBuf, AssistError> {
        export::export_to_file(&session.turns, &self.export_dir)
    }

    pub fn export_dir(&self) -> &Path {
        &self.export_dir
    }
}
