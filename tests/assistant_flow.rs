//! End-to-end interaction tests against in-memory collaborators.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use medassist::assistant::Assistant;
use medassist::config::{CacheConfig, MemoryConfig, RetrievalConfig};
use medassist::error::AssistError;
use medassist::events::EventLogger;
use medassist::generator::{Generator, GENERATION_FAILED};
use medassist::index::VectorIndex;
use medassist::llm::ChatCompletion;
use medassist::models::{ScoredDocument, WebHit};
use medassist::retrieval::Retriever;
use medassist::session::SessionStore;
use medassist::websearch::WebSearch;

struct StaticIndex {
    docs: Vec<ScoredDocument>,
}

#[async_trait]
impl VectorIndex for StaticIndex {
    async fn search(&self, _query: &str, k: usize) -> Result<Vec<ScoredDocument>, AssistError> {
        Ok(self.docs.iter().take(k).cloned().collect())
    }
}

struct CountingWeb {
    hit: Option<WebHit>,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl WebSearch for CountingWeb {
    async fn search(&self, _query: &str) -> Result<Option<WebHit>, AssistError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.hit.clone())
    }
}

struct RecordingLlm {
    reply: Option<String>,
    prompts: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl ChatCompletion for RecordingLlm {
    async fn complete(&self, _system: &str, prompt: &str) -> Result<String, AssistError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.reply
            .clone()
            .ok_or_else(|| AssistError::GenerationFailed("connection refused".to_string()))
    }
}

struct Fixture {
    _tmp: TempDir,
    assistant: Assistant,
    prompts: Arc<Mutex<Vec<String>>>,
    web_calls: Arc<AtomicUsize>,
    events_path: std::path::PathBuf,
}

fn flu_doc(distance: f32) -> ScoredDocument {
    let mut metadata = HashMap::new();
    metadata.insert("source".to_string(), "guides/flu.md".to_string());
    ScoredDocument {
        text: "Influenza typically causes fever, cough and aches.".to_string(),
        metadata,
        distance,
    }
}

fn fixture(docs: Vec<ScoredDocument>, hit: Option<WebHit>, reply: Option<&str>) -> Fixture {
    let tmp = TempDir::new().unwrap();
    let prompts = Arc::new(Mutex::new(Vec::new()));
    let web_calls = Arc::new(AtomicUsize::new(0));
    let events_path = tmp.path().join("events.jsonl");

    let retriever = Retriever::new(
        Box::new(StaticIndex { docs }),
        Box::new(CountingWeb {
            hit,
            calls: web_calls.clone(),
        }),
        &RetrievalConfig::default(),
        &CacheConfig::default(),
    );
    let generator = Generator::new(
        Box::new(RecordingLlm {
            reply: reply.map(str::to_string),
            prompts: prompts.clone(),
        }),
        "You are a medical assistant.",
    );
    let assistant = Assistant::new(
        retriever,
        generator,
        MemoryConfig::default(),
        SessionStore::new(tmp.path().join("conversations")),
        EventLogger::new(&events_path),
        tmp.path().join("exports"),
    );

    Fixture {
        _tmp: tmp,
        assistant,
        prompts,
        web_calls,
        events_path,
    }
}

fn events(path: &std::path::Path) -> Vec<serde_json::Value> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

#[tokio::test]
async fn test_internal_document_answer_is_saved() {
    let f = fixture(vec![flu_doc(0.4)], None, Some("Fever and cough are common."));
    let mut session = f.assistant.sessions().new_session();

    let answer = f.assistant.answer(&mut session, "flu symptoms").await;
    assert_eq!(answer, "Fever and cough are common.");
    assert_eq!(f.web_calls.load(Ordering::SeqCst), 0);

    let prompt = f.prompts.lock().unwrap()[0].clone();
    assert!(prompt.contains("Source: internal document (guides/flu.md)"));
    assert!(!prompt.contains("Recent conversation"));

    let saved = f.assistant.sessions().load(&session.id).unwrap();
    assert_eq!(saved.turns.len(), 1);

    let log = events(&f.events_path);
    assert_eq!(log.len(), 3);
    assert_eq!(log[1]["payload"]["source_kind"], "internal_doc");
    assert_eq!(log[1]["payload"]["source_label"], "guides/flu.md");
}

#[tokio::test]
async fn test_follow_up_prompt_carries_memory() {
    let f = fixture(vec![flu_doc(0.4)], None, Some("Rest and fluids."));
    let mut session = f.assistant.sessions().new_session();

    f.assistant.answer(&mut session, "flu symptoms").await;
    f.assistant.answer(&mut session, "and treatment?").await;

    let prompts = f.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 2);
    assert!(prompts[1].starts_with("Recent conversation:\nUser: flu symptoms\nAssistant: Rest and fluids."));
    assert!(prompts[1].ends_with("and treatment?"));
}

#[tokio::test]
async fn test_far_documents_use_web_result() {
    let hit = WebHit {
        title: "Gout overview".to_string(),
        snippet: "Gout is a form of arthritis.".to_string(),
        url: "https://example.org/gout".to_string(),
    };
    let f = fixture(vec![flu_doc(3.2)], Some(hit), Some("Gout is arthritis."));
    let mut session = f.assistant.sessions().new_session();

    f.assistant.answer(&mut session, "what is gout").await;

    let prompt = f.prompts.lock().unwrap()[0].clone();
    assert!(prompt.contains("Gout overview"));
    assert!(prompt.contains("Gout is a form of arthritis."));
    assert!(prompt.contains("https://example.org/gout"));
    assert_eq!(events(&f.events_path)[1]["payload"]["source_kind"], "web");
}

#[tokio::test]
async fn test_nothing_found_skips_generation() {
    let f = fixture(vec![], None, Some("unused"));
    let mut session = f.assistant.sessions().new_session();

    let answer = f.assistant.answer(&mut session, "unknown topic").await;
    assert_eq!(answer, "No relevant information was found.");
    assert!(f.prompts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_generation_failure_still_saves_turn() {
    let f = fixture(vec![flu_doc(0.4)], None, None);
    let mut session = f.assistant.sessions().new_session();

    let answer = f.assistant.answer(&mut session, "flu symptoms").await;
    assert_eq!(answer, GENERATION_FAILED);
    let saved = f.assistant.sessions().load(&session.id).unwrap();
    assert_eq!(saved.turns[0].answer, GENERATION_FAILED);
}

#[tokio::test]
async fn test_repeated_question_uses_cache() {
    let f = fixture(vec![], None, Some("unused"));
    let mut session = f.assistant.sessions().new_session();

    f.assistant.answer(&mut session, "same question").await;
    f.assistant.answer(&mut session, "same question").await;
    assert_eq!(f.web_calls.load(Ordering::SeqCst), 1);
    assert_eq!(events(&f.events_path)[4]["payload"]["cached"], true);
}

#[tokio::test]
async fn test_export_session() {
    let f = fixture(vec![flu_doc(0.4)], None, Some("Fluids."));
    let mut session = f.assistant.sessions().new_session();
    f.assistant.answer(&mut session, "flu symptoms").await;

    let path = f.assistant.export(&session).unwrap();
    assert!(path.starts_with(f.assistant.export_dir()));
    assert!(path.exists());
}
