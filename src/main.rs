//! # medassist CLI
//!
//! ## Usage
//!
//! ```bash
//! medassist --config ./config/medassist.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `medassist index` | Rebuild the document index |
//! | `medassist search "<query>"` | Show the nearest indexed passages |
//! | `medassist ask "<question>"` | Answer one question |
//! | `medassist chat` | Interactive conversation |
//! | `medassist sessions list` | List saved conversations |
//! | `medassist sessions show <id>` | Print a conversation |
//! | `medassist sessions rename <id> <title>` | Rename a conversation |
//! | `medassist sessions delete <id>` | Delete a conversation |
//! | `medassist export <id>` | Export a conversation to PDF |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use medassist::assistant::Assistant;
use medassist::{chat, commands, config, index, ingest, logging};

/// medassist: answers medical questions from local documents, falling back
/// to web search, with saved conversations and PDF export.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/medassist.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "medassist",
    about = "Retrieval-augmented medical assistant",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/medassist.toml")]
    config: PathBuf,

    /// Log progress at info level (overridden by RUST_LOG).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild the document index.
    ///
    /// Scans `[index].root`, extracts and chunks every matching document,
    /// embeds the chunks and replaces the index at `[index].path`.
    Index,

    /// Show the passages nearest to a query, with their distances.
    Search {
        query: String,

        /// Number of passages (defaults to `[retrieval].k`).
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Answer a single question and save it to a session.
    Ask {
        question: String,

        /// Continue an existing session instead of starting a new one.
        #[arg(long)]
        session: Option<String>,
    },

    /// Start an interactive conversation.
    Chat {
        /// Resume an existing session.
        #[arg(long)]
        session: Option<String>,
    },

    /// Manage saved conversations.
    Sessions {
        #[command(subcommand)]
        action: SessionAction,
    },

    /// Export a saved conversation to PDF.
    Export {
        id: String,

        /// Output directory (defaults to `[export].dir`).
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum SessionAction {
    /// List conversations, newest first.
    List,
    /// Print a conversation.
    Show { id: String },
    /// Rename a conversation.
    Rename { id: String, title: String },
    /// Delete a conversation.
    Delete { id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Index => {
            ingest::run_index(&cfg).await?;
        }
        Commands::Search { query, limit } => {
            index::run_search(&cfg, &query, limit).await?;
        }
        Commands::Ask { question, session } => {
            commands::run_ask(&cfg, &question, session.as_deref()).await?;
        }
        Commands::Chat { session } => {
            let assistant = Assistant::from_config(&cfg)?;
            chat::run_chat(&assistant, session.as_deref()).await?;
        }
        Commands::Sessions { action } => match action {
            SessionAction::List => commands::run_sessions_list(&cfg)?,
            SessionAction::Show { id } => commands::run_sessions_show(&cfg, &id)?,
            SessionAction::Rename { id, title } => {
                commands::run_sessions_rename(&cfg, &id, &title)?
            }
            SessionAction::Delete { id } => commands::run_sessions_delete(&cfg, &id)?,
        },
        Commands::Export { id, dir } => {
            commands::run_export(&cfg, &id, dir.as_deref())?;
        }
    }

    Ok(())
}
