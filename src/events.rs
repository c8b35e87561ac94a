//! Append-only JSONL event log.
//!
//! Each line is `{"timestamp": <UTC ISO-8601>, "event_type": ..., "payload": {...}}`.
//! Recording never fails the caller; write errors are reported through
//! tracing only.

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    UserQuestion,
    ContextUsed,
    AgentResponse,
}

pub struct EventLogger {
    path: PathBuf,
    // Serializes appends so lines never interleave.
    write_lock: Mutex<()>,
}

impl EventLogger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn record(&self, event_type: EventType, payload: Value) {
        let line = json!({
            "timestamp": Utc::now().to_rfc3339(),
            "event_type": event_type,
            "payload": payload,
        });
        if let Err(err) = self.append(&line) {
            tracing::warn!(path = %self.path.display(), error = %err, "failed to record event");
        }
    }

    fn append(&self, line: &Value) -> std::io::Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_events_append_as_json_lines() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("logs/events.jsonl");
        let logger = EventLogger::new(&path);
        logger.record(EventType::UserQuestion, json!({"question": "flu?"}));
        logger.record(EventType::AgentResponse, json!({"answer": "rest"}));

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event_type"], "user_question");
        assert_eq!(lines[0]["payload"]["question"], "flu?");
        assert_eq!(lines[1]["event_type"], "agent_response");
        assert!(chrono::DateTime::parse_from_rfc3339(lines[0]["timestamp"].as_str().unwrap()).is_ok());
    }

    #[test]
    fn test_unwritable_path_does_not_panic() {
        let tmp = TempDir::new().unwrap();
        // A directory where the file should be.
        let logger = EventLogger::new(tmp.path());
        logger.record(EventType::ContextUsed, json!({}));
    }
}
