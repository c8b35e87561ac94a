//! Interactive chat loop.
//!
//! Plain lines are questions. Slash commands act on the current session:
//!
//! | Command | Effect |
//! |---------|--------|
//! | `/pdf` | Export the conversation to PDF |
//! | `/rename <title>` | Rename the conversation |
//! | `/new` | Start a new conversation |
//! | `/help` | List commands |
//! | `/exit` | Leave (also Ctrl-D) |

use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::assistant::Assistant;
use crate::models::Session;

#[derive(Debug, PartialEq, Eq)]
pub enum ChatInput<'a> {
    Question(&'a str),
    Pdf,
    Rename(&'a str),
    New,
    Help,
    Exit,
    Empty,
    Unknown(&'a str),
}

pub fn parse_input(line: &str) -> ChatInput<'_> {
    let line = line.trim();
    if line.is_empty() {
        return ChatInput::Empty;
    }
    let Some(command) = line.strip_prefix('/') else {
        return ChatInput::Question(line);
    };
    let (name, arg) = match command.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (command, ""),
    };
    match name {
        "pdf" | "export" => ChatInput::Pdf,
        "rename" => ChatInput::Rename(arg),
        "new" => ChatInput::New,
        "help" => ChatInput::Help,
        "exit" | "quit" => ChatInput::Exit,
        _ => ChatInput::Unknown(name),
    }
}

pub async fn run_chat(assistant: &Assistant, session_id: Option<&str>) -> Result<()> {
    let mut session: Session = match session_id {
        Some(id) => assistant.sessions().load(id)?,
        None => assistant.sessions().new_session(),
    };

    let mut rl = DefaultEditor::new()?;
    println!("{} ({})", session.title, session.id);
    for turn in &session.turns {
        println!("> {}", turn.question);
        println!("{}\n", turn.answer);
    }
    println!("Type a question, or /help for commands.");

    loop {
        match rl.readline("> ") {
            Ok(line) => {
                let _ = rl.add_history_entry(line.as_str());
                match parse_input(&line) {
                    ChatInput::Empty => continue,
                    ChatInput::Question(question) => {
                        let answer = assistant.answer(&mut session, question).await;
                        println!("{}\n", answer);
                    }
                    ChatInput::Pdf => {
                        if session.turns.is_empty() {
                            println!("Nothing to export yet.");
                            continue;
                        }
                        match assistant.export(&session) {
                            Ok(path) => println!("Exported to {}", path.display()),
                            Err(err) => eprintln!("Error: {}", err),
                        }
                    }
                    ChatInput::Rename(title) if title.is_empty() => {
                        println!("Usage: /rename <title>");
                    }
                    ChatInput::Rename(title) => match assistant.rename(&mut session, title) {
                        Ok(()) => println!("Renamed to \"{}\"", session.title),
                        Err(err) => eprintln!("Error: {}", err),
                    },
                    ChatInput::New => {
                        session = assistant.sessions().new_session();
                        println!("{} ({})", session.title, session.id);
                    }
                    ChatInput::Help => {
                        println!("/pdf              export this conversation to PDF");
                        println!("/rename <title>   rename this conversation");
                        println!("/new              start a new conversation");
                        println!("/exit             leave");
                    }
                    ChatInput::Exit => break,
                    ChatInput::Unknown(name) => {
                        println!("Unknown command: /{} (try /help)", name);
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("(Ctrl-C) Type /exit or press Ctrl-D to leave.");
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => return Err(err.into()),
        }
    }

    Ok(())
}
