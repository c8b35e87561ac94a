//! Prompt assembly and answer generation.

use crate::llm::ChatCompletion;
use crate::models::RetrievalResult;

pub const GENERATION_FAILED: &str = "Sorry, an error occurred while generating the answer.";

pub struct Generator {
    llm: Box<dyn ChatCompletion>,
    system_prompt: String,
}

impl Generator {
    pub fn new(llm: Box<dyn ChatCompletion>, system_prompt: impl Into<String>) -> Self {
        Self {
            llm,
            system_prompt: system_prompt.into(),
        }
    }

    /// Answer `question` from `context`. A failed completion becomes
    /// [`GENERATION_FAILED`]; the error is only logged.
    pub async fn generate(&self, question: &str, context: &RetrievalResult, memory: &str) -> String {
        let prompt = build_prompt(question, context, memory);
        match self.llm.complete(&self.system_prompt, &prompt).await {
            Ok(answer) => answer,
            Err(err) => {
                tracing::error!(error = %err, "answer generation failed");
                GENERATION_FAILED.to_string()
            }
        }
    }
}

/// Memory (when present), then context, then the question.
pub fn build_prompt(question: &str, context: &RetrievalResult, memory: &str) -> String {
    let mut prompt = String::new();
    if !memory.trim().is_empty() {
        prompt.push_str("Recent conversation:\n");
        prompt.push_str(memory);
        prompt.push_str("\n\n");
    }
    prompt.push_str("Context:\n");
    prompt.push_str(&context.content);
    prompt.push_str("\n\nQuestion:\n");
    prompt.push_str(question);
    prompt
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::AssistError;
    use crate::models::SourceKind;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    /// Records every prompt; answers with `reply` or fails when `None`.
    pub(crate) struct FakeLlm {
        pub reply: Option<String>,
        pub prompts: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl ChatCompletion for FakeLlm {
        async fn complete(&self, _system: &str, prompt: &str) -> Result<String, AssistError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.reply
                .clone()
                .ok_or_else(|| AssistError::GenerationFailed("offline".to_string()))
        }
    }

    fn context() -> RetrievalResult {
        RetrievalResult {
            content: "Source: internal document (flu.md)\nFever.".to_string(),
            source_kind: SourceKind::InternalDoc,
            source_label: "flu.md".to_string(),
        }
    }

    #[test]
    fn test_prompt_order() {
        let prompt = build_prompt("What now?", &context(), "User: hi\nAssistant: hello");
        let memory = prompt.find("Recent conversation:").unwrap();
        let ctx = prompt.find("Context:").unwrap();
        let question = prompt.find("Question:").unwrap();
        assert!(memory < ctx && ctx < question);
        assert!(prompt.ends_with("What now?"));
    }

    #[test]
    fn test_empty_memory_omits_label() {
        let prompt = build_prompt("What now?", &context(), "");
        assert!(!prompt.contains("Recent conversation"));
        assert!(prompt.starts_with("Context:\n"));
    }

    #[tokio::test]
    async fn test_failure_returns_fixed_message() {
        let generator = Generator::new(
            Box::new(FakeLlm {
                reply: None,
                prompts: Arc::default(),
            }),
            "system",
        );
        let answer = generator.generate("q", &context(), "").await;
        assert_eq!(answer, GENERATION_FAILED);
    }

    #[tokio::test]
    async fn test_success_returns_completion() {
        let prompts = Arc::new(Mutex::new(Vec::new()));
        let generator = Generator::new(
            Box::new(FakeLlm {
                reply: Some("Rest.".to_string()),
                prompts: prompts.clone(),
            }),
            "system",
        );
        assert_eq!(generator.generate("q", &context(), "").await, "Rest.");
        assert_eq!(prompts.lock().unwrap().len(), 1);
    }
}
