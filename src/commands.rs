//! Non-interactive CLI commands: `ask`, `sessions ...` and `export`.

use anyhow::{bail, Context, Result};
use std::path::Path;

use crate::assistant::Assistant;
use crate::config::Config;
use crate::export;
use crate::session::SessionStore;

pub async fn run_ask(config: &Config, question: &str, session_id: Option<&str>) -> Result<()> {
    if question.trim().is_empty() {
        bail!("Question must not be empty");
    }
    let assistant = Assistant::from_config(config)?;
    let mut session = match session_id {
        Some(id) => assistant.sessions().load(id)?,
        None => assistant.sessions().new_session(),
    };
    let answer = assistant.answer(&mut session, question.trim()).await;
    println!("{}", answer);
    eprintln!("session: {}", session.id);
    Ok(())
}

pub fn run_sessions_list(config: &Config) -> Result<()> {
    let store = SessionStore::new(&config.sessions.dir);
    let sessions = store.list()?;
    if sessions.is_empty() {
        println!("No sessions.");
        return Ok(());
    }
    for summary in sessions {
        let created = summary
            .created_at
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("{}  {}  {}", summary.id, created, summary.title);
    }
    Ok(())
}

pub fn run_sessions_show(config: &Config, id: &str) -> Result<()> {
    let session = SessionStore::new(&config.sessions.dir).load(id)?;
    println!("{}", session.title);
    println!("created: {}", session.created_at.format("%Y-%m-%d %H:%M:%S"));
    println!();
    for turn in &session.turns {
        println!("User: {}", turn.question);
        println!("Agent: {}", turn.answer);
        println!();
    }
    Ok(())
}

pub fn run_sessions_rename(config: &Config, id: &str, title: &str) -> Result<()> {
    if title.trim().is_empty() {
        bail!("Title must not be empty");
    }
    let session = SessionStore::new(&config.sessions.dir).rename(id, title)?;
    println!("Renamed {} to \"{}\"", session.id, session.title);
    Ok(())
}

pub fn run_sessions_delete(config: &Config, id: &str) -> Result<()> {
    SessionStore::new(&config.sessions.dir).delete(id)?;
    println!("Deleted {}", id);
    Ok(())
}

pub fn run_export(config: &Config, id: &str, dir: Option<&Path>) -> Result<()> {
    let session = SessionStore::new(&config.sessions.dir).load(id)?;
    let dir = dir.unwrap_or(config.export.dir.as_path());
    let path = export::export_to_file(&session.turns, dir)
        .with_context(|| format!("Failed to export session {}", id))?;
    println!("{}", path.display());
    Ok(())
}
