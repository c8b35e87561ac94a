//! JSON-file session store.
//!
//! One file per conversation, `{dir}/{id}.json`:
//!
//! ```json
//! {
//!   "title": "Conversation of 2024-03-01",
//!   "timestamp": "20240301_142233",
//!   "messages": [
//!     {"role": "user", "content": "..."},
//!     {"role": "assistant", "content": "..."}
//!   ]
//! }
//! ```
//!
//! Ids are `conv_YYYYMMDD_HHMMSS` in local time, with a `_N` suffix when a
//! file for that second already exists. List order is newest first, by
//! timestamp and then by suffix. A file without a title is listed under its
//! id.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Timelike};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::AssistError;
use crate::models::{Role, Session, SessionSummary, Turn};

const ID_PREFIX: &str = "conv_";
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

#[derive(Debug, Serialize, Deserialize)]
struct SessionFile {
    #[serde(default)]
    title: String,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    messages: Vec<Message>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Message {
    role: Role,
    content: String,
}

pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// A fresh, unsaved session stamped with the current local time.
    pub fn new_session(&self) -> Session {
        let created_at = now_seconds();
        let base = format!("{}{}", ID_PREFIX, created_at.format(TIMESTAMP_FORMAT));
        let mut id = base.clone();
        let mut n = 1;
        while self.path_for(&id).exists() {
            n += 1;
            id = format!("{}_{}", base, n);
        }
        Session {
            id,
            title: default_title(&created_at),
            created_at,
            turns: Vec::new(),
        }
    }

    pub fn list(&self) -> Result<Vec<SessionSummary>, AssistError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(AssistError::persistence(err)),
        };

        let mut ids: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().to_string();
                name.strip_suffix(".json").map(str::to_string)
            })
            .collect();
        ids.sort_by(|a, b| list_key(b).cmp(&list_key(a)));

        let mut summaries = Vec::with_capacity(ids.len());
        for id in ids {
            match self.read_file(&id) {
                Ok(file) => summaries.push(SessionSummary {
                    created_at: created_at_of(&id, file.timestamp.as_deref()),
                    title: title_or_id(file.title, &id),
                    id,
                }),
                Err(err) => tracing::warn!(session = %id, error = %err, "skipping unreadable session"),
            }
        }
        Ok(summaries)
    }

    pub fn load(&self, id: &str) -> Result<Session, AssistError> {
        let file = self.read_file(id)?;
        let created_at = created_at_of(id, file.timestamp.as_deref()).unwrap_or_else(now_seconds);

        let mut turns: Vec<Turn> = Vec::new();
        for message in file.messages {
            match message.role {
                Role::User => turns.push(Turn::new(message.content, "")),
                Role::Assistant => match turns.last_mut() {
                    Some(turn) if turn.answer.is_empty() => turn.answer = message.content,
                    _ => turns.push(Turn::new("", message.content)),
                },
            }
        }

        Ok(Session {
            id: id.to_string(),
            title: title_or_id(file.title, id),
            created_at,
            turns,
        })
    }

    /// Write the whole session, replacing any previous file.
    pub fn save(&self, session: &Session) -> Result<(), AssistError> {
        check_id(&session.id)?;
        std::fs::create_dir_all(&self.dir).map_err(AssistError::persistence)?;

        let mut messages = Vec::with_capacity(session.turns.len() * 2);
        for turn in &session.turns {
            messages.push(Message {
                role: Role::User,
                content: turn.question.clone(),
            });
            if !turn.answer.is_empty() {
                messages.push(Message {
                    role: Role::Assistant,
                    content: turn.answer.clone(),
                });
            }
        }
        let file = SessionFile {
            title: session.title.clone(),
            timestamp: Some(session.created_at.format(TIMESTAMP_FORMAT).to_string()),
            messages,
        };
        let json = serde_json::to_string_pretty(&file).map_err(AssistError::persistence)?;

        let path = self.path_for(&session.id);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(AssistError::persistence)?;
        std::fs::rename(&tmp, &path).map_err(AssistError::persistence)?;
        tracing::debug!(session = %session.id, turns = session.turns.len(), "session saved");
        Ok(())
    }

    pub fn delete(&self, id: &str) -> Result<(), AssistError> {
        check_id(id)?;
        match std::fs::remove_file(self.path_for(id)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(AssistError::SessionNotFound(id.to_string()))
            }
            Err(err) => Err(AssistError::persistence(err)),
        }
    }

    pub fn rename(&self, id: &str, new_title: &str) -> Result<Session, AssistError> {
        let mut session = self.load(id)?;
        session.title = new_title.trim().to_string();
        self.save(&session)?;
        Ok(session)
    }

    fn read_file(&self, id: &str) -> Result<SessionFile, AssistError> {
        check_id(id)?;
        let content = match std::fs::read_to_string(self.path_for(id)) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(AssistError::SessionNotFound(id.to_string()))
            }
            Err(err) => return Err(AssistError::persistence(err)),
        };
        serde_json::from_str(&content)
            .map_err(|e| AssistError::PersistenceFailed(format!("{}: {}", id, e)))
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }
}

/// Ids name files directly; anything that could escape the directory is unknown.
fn check_id(id: &str) -> Result<(), AssistError> {
    let valid = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(AssistError::SessionNotFound(id.to_string()))
    }
}

/// Ids sharing a timestamp order by numeric suffix; the unsuffixed id is 1.
fn list_key(id: &str) -> (&str, u32) {
    let stamp_len = ID_PREFIX.len() + 15;
    if let (Some(base), Some(rest)) = (id.get(..stamp_len), id.get(stamp_len..)) {
        if rest.is_empty() {
            return (base, 1);
        }
        if let Some(n) = rest.strip_prefix('_').and_then(|n| n.parse().ok()) {
            return (base, n);
        }
    }
    (id, 0)
}

fn title_or_id(title: String, id: &str) -> String {
    if title.trim().is_empty() {
        id.to_string()
    } else {
        title
    }
}

fn now_seconds() -> DateTime<Local> {
    let now = Local::now();
    now.with_nanosecond(0).unwrap_or(now)
}

fn default_title(created_at: &DateTime<Local>) -> String {
    format!("Conversation of {}", created_at.format("%Y-%m-%d"))
}

/// Stored timestamp, else the one encoded in the id.
fn created_at_of(id: &str, timestamp: Option<&str>) -> Option<DateTime<Local>> {
    let from_id = id
        .strip_prefix(ID_PREFIX)
        .and_then(|rest| rest.get(..15));
    timestamp
        .into_iter()
        .chain(from_id)
        .find_map(|ts| NaiveDateTime::parse_from_str(ts, TIMESTAMP_FORMAT).ok())
        .and_then(|naive| Local.from_local_datetime(&naive).earliest())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn session_with_turns(store: &SessionStore, n: usize) -> Session {
        let mut session = store.new_session();
        for i in 0..n {
            session
                .turns
                .push(Turn::new(format!("question {}", i), format!("answer {}", i)));
        }
        session
    }

    #[test]
    fn test_round_trip_preserves_session() {
        let tmp = TempDir::new().unwrap();
        let store = SessionStore::new(tmp.path());
        let session = session_with_turns(&store, 3);
        store.save(&session).unwrap();

        let loaded = store.load(&session.id).unwrap();
        assert_eq!(loaded, session);

        store.save(&loaded).unwrap();
        assert_eq!(store.load(&session.id).unwrap(), session);
    }

    #[test]
    fn test_file_format() {
        let tmp = TempDir::new().unwrap();
        let store = SessionStore::new(tmp.path());
        let session = session_with_turns(&store, 1);
        store.save(&session).unwrap();

        let raw = std::fs::read_to_string(tmp.path().join(format!("{}.json", session.id))).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["title"], session.title.as_str());
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["messages"][1]["role"], "assistant");
        assert_eq!(value["timestamp"].as_str().unwrap().len(), 15);
        assert!(session.id.starts_with("conv_"));
    }

    #[test]
    fn test_same_second_ids_are_distinct() {
        let tmp = TempDir::new().unwrap();
        let store = SessionStore::new(tmp.path());
        let first = session_with_turns(&store, 1);
        store.save(&first).unwrap();
        let second = store.new_session();
        if second.created_at == first.created_at {
            assert_eq!(second.id, format!("{}_2", first.id));
        }
        assert_ne!(second.id, first.id);
    }

    #[test]
    fn test_delete_removes_from_list() {
        let tmp = TempDir::new().unwrap();
        let store = SessionStore::new(tmp.path());
        let session = session_with_turns(&store, 1);
        store.save(&session).unwrap();
        assert_eq!(store.list().unwrap().len(), 1);

        store.delete(&session.id).unwrap();
        assert!(store.list().unwrap().is_empty());
        assert!(matches!(
            store.load(&session.id),
            Err(AssistError::SessionNotFound(_))
        ));
        assert!(matches!(
            store.delete(&session.id),
            Err(AssistError::SessionNotFound(_))
        ));
    }

    #[test]
    fn test_list_newest_first_and_skips_bad_files() {
        let tmp = TempDir::new().unwrap();
        let store = SessionStore::new(tmp.path());
        let write = |id: &str, ts: &str| {
            let body = format!(r#"{{"title": "{}", "timestamp": "{}", "messages": []}}"#, id, ts);
            std::fs::write(tmp.path().join(format!("{}.json", id)), body).unwrap();
        };
        write("conv_20240101_090000", "20240101_090000");
        write("conv_20240301_090000", "20240301_090000");
        std::fs::write(tmp.path().join("conv_20240201_090000.json"), "{ not json").unwrap();
        std::fs::write(tmp.path().join("notes.txt"), "ignored").unwrap();

        let list = store.list().unwrap();
        let ids: Vec<&str> = list.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["conv_20240301_090000", "conv_20240101_090000"]);
        assert!(list[0].created_at.is_some());
    }

    #[test]
    fn test_missing_directory_lists_empty() {
        let tmp = TempDir::new().unwrap();
        let store = SessionStore::new(tmp.path().join("none-yet"));
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_rename_persists_title() {
        let tmp = TempDir::new().unwrap();
        let store = SessionStore::new(tmp.path());
        let session = session_with_turns(&store, 2);
        store.save(&session).unwrap();

        store.rename(&session.id, "  Flu follow-up ").unwrap();
        let loaded = store.load(&session.id).unwrap();
        assert_eq!(loaded.title, "Flu follow-up");
        assert_eq!(loaded.turns, session.turns);
        assert!(matches!(
            store.rename("conv_19990101_000000", "x"),
            Err(AssistError::SessionNotFound(_))
        ));
    }

    #[test]
    fn test_dangling_question_is_kept() {
        let tmp = TempDir::new().unwrap();
        let body = r#"{"title": "t", "messages": [
            {"role": "user", "content": "q1"},
            {"role": "assistant", "content": "a1"},
            {"role": "user", "content": "q2"}
        ]}"#;
        std::fs::write(tmp.path().join("conv_20240101_120000.json"), body).unwrap();

        let store = SessionStore::new(tmp.path());
        let session = store.load("conv_20240101_120000").unwrap();
        assert_eq!(session.turns, vec![Turn::new("q1", "a1"), Turn::new("q2", "")]);
        assert_eq!(session.created_at.format("%Y%m%d_%H%M%S").to_string(), "20240101_120000");
    }

    #[test]
    fn test_same_second_suffixes_list_numerically() {
        let tmp = TempDir::new().unwrap();
        for id in ["conv_20240101_090000", "conv_20240101_090000_9", "conv_20240101_090000_10", "conv_20231231_235959_12"] {
            let body = r#"{"title": "t", "messages": []}"#;
            std::fs::write(tmp.path().join(format!("{}.json", id)), body).unwrap();
        }

        let store = SessionStore::new(tmp.path());
        let ids: Vec<String> = store.list().unwrap().into_iter().map(|s| s.id).collect();
        assert_eq!(
            ids,
            vec![
                "conv_20240101_090000_10",
                "conv_20240101_090000_9",
                "conv_20240101_090000",
                "conv_20231231_235959_12",
            ]
        );
    }

    #[test]
    fn test_missing_title_falls_back_to_id() {
        let tmp = TempDir::new().unwrap();
        let body = r#"{"messages": [{"role": "user", "content": "q"}, {"role": "assistant", "content": "a"}]}"#;
        std::fs::write(tmp.path().join("conv_20240101_120000.json"), body).unwrap();

        let store = SessionStore::new(tmp.path());
        let session = store.load("conv_20240101_120000").unwrap();
        assert_eq!(session.title, "conv_20240101_120000");
        assert_eq!(session.turns, vec![Turn::new("q", "a")]);
        let list = store.list().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].title, "conv_20240101_120000");
    }

    #[test]
    fn test_unanswered_and_questionless_turns_round_trip() {
        let tmp = TempDir::new().unwrap();
        let store = SessionStore::new(tmp.path());
        let mut session = store.new_session();
        session.turns = vec![Turn::new("q", ""), Turn::new("", "a"), Turn::new("q2", "a2")];
        store.save(&session).unwrap();

        assert_eq!(store.load(&session.id).unwrap().turns, session.turns);
    }

    #[test]
    fn test_path_like_ids_are_rejected() {
        let tmp = TempDir::new().unwrap();
        let store = SessionStore::new(tmp.path());
        assert!(matches!(
            store.load("../secret"),
            Err(AssistError::SessionNotFound(_))
        ));
    }
}
