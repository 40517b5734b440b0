//! Interactive REPL — readline editing with persistent history, plus the
//! slash commands that drive session and model management.
//!
//! Commands map one-to-one onto agent operations and run only between
//! turns: `/new` resets the session, `/resume` replays one, `/sum` asks for
//! an on-demand summary, `/model` swaps the active endpoint.

use anyhow::Result;
use colored::Colorize;
use rustyline::config::Configurer;
use rustyline::history::DefaultHistory;
use rustyline::{DefaultEditor, Editor};
use tracing::debug;

use colloquy_agent::Agent;
use colloquy_core::config::Config;
use colloquy_core::session::{history_listing, session_id_at};
use colloquy_core::utils::is_session_stamp;
use colloquy_providers::HttpClient;

use crate::helpers;

/// Exit commands (case-insensitive match).
const EXIT_COMMANDS: &[&str] = &["exit", "quit", "/exit", "/quit", "/q"];

const HELP_TEXT: &str = "\
commands:
  /? /help            show this help
  /m /model [name|n]  list endpoints, or switch to one
  /n /new             start a new session
  /r /resume [n|id]   list stored sessions, or resume one
  /s /sum             one-line summary of the current session
  /q /quit            leave";

/// Run the interactive REPL loop.
pub async fn run(mut agent: Agent, config: Config) -> Result<()> {
    helpers::print_banner();

    let mut editor = create_editor()?;

    loop {
        let input = match editor.readline(">>> ") {
            Ok(line) => line,
            Err(rustyline::error::ReadlineError::Interrupted) => break,
            Err(rustyline::error::ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("Input error: {e}");
                break;
            }
        };

        let trimmed = input.trim();
        if trimmed.is_empty() {
            continue;
        }

        if is_exit_command(trimmed) {
            println!("\nGoodbye!");
            break;
        }

        let _ = editor.add_history_entry(&input);

        if trimmed.starts_with('/') {
            if let Err(e) = dispatch_command(trimmed, &mut agent, &config).await {
                helpers::print_error(&format!("{e:#}"));
            }
            continue;
        }

        // A chat turn. Failures print and return control to the prompt; the
        // session keeps everything logged before the failure.
        debug!(input = trimmed, "processing turn");
        let mut observer = helpers::ConsoleObserver::new();
        match agent.run_turn(trimmed, &mut observer).await {
            Ok(()) => println!(),
            Err(e) => helpers::print_error(&format!("\nError: {e:#}")),
        }
    }

    save_history(&mut editor);
    Ok(())
}

// ─────────────────────────────────────────────
// Slash commands
// ─────────────────────────────────────────────

async fn dispatch_command(input: &str, agent: &mut Agent, config: &Config) -> Result<()> {
    let (command, arg) = split_command(input);

    match command {
        "/?" | "/help" => println!("{HELP_TEXT}"),

        "/n" | "/new" => {
            agent.reset_session();
            println!("Started a new session.");
        }

        "/r" | "/resume" => match arg {
            None => println!("history:\n{}", history_listing(agent.sessions_root())),
            Some(which) => {
                let id = resolve_session_id(agent, which)?;
                let session = agent.resume_session(&id);
                helpers::print_replay(session.conversation());
            }
        },

        "/s" | "/sum" | "/summary" => {
            let mut observer = helpers::ConsoleObserver::new();
            agent.summarize_now(&mut observer).await?;
            println!();
        }

        "/m" | "/model" => match arg {
            None => println!("models:\n{}", config.model_listing()),
            Some(name) => {
                let model = config
                    .find_model(name)
                    .ok_or_else(|| anyhow::anyhow!("model '{name}' not found in config"))?;
                let client = HttpClient::new(
                    model.clone(),
                    config.agent.max_tokens,
                    config.agent.temperature,
                );
                agent.set_client(std::sync::Arc::new(client));
                println!("Switched to model: {}", model.name.cyan());
            }
        },

        other => {
            println!("Unknown command: {other}");
            println!("{HELP_TEXT}");
        }
    }

    Ok(())
}

/// Split "/cmd arg with spaces" into the command word and optional argument.
fn split_command(input: &str) -> (&str, Option<&str>) {
    match input.split_once(char::is_whitespace) {
        Some((cmd, rest)) => {
            let rest = rest.trim();
            (cmd, if rest.is_empty() { None } else { Some(rest) })
        }
        None => (input, None),
    }
}

/// Accept either a 1-based history listing position or a raw session stamp.
fn resolve_session_id(agent: &Agent, which: &str) -> Result<String> {
    if is_session_stamp(which) {
        return Ok(which.to_string());
    }
    let index: usize = which
        .parse()
        .map_err(|_| anyhow::anyhow!("expected a history number or session id, got '{which}'"))?;
    session_id_at(agent.sessions_root(), index)
        .ok_or_else(|| anyhow::anyhow!("no session at position {index}"))
}

// ─────────────────────────────────────────────
// Editor
// ─────────────────────────────────────────────

/// Create a rustyline editor with history.
fn create_editor() -> Result<Editor<(), DefaultHistory>> {
    let mut editor = DefaultEditor::new()?;
    editor.set_max_history_size(1000)?;

    let history_path = history_path();
    if history_path.exists() {
        let _ = editor.load_history(&history_path);
        debug!("loaded REPL history from {}", history_path.display());
    }

    Ok(editor)
}

/// Save history to disk.
fn save_history(editor: &mut Editor<(), DefaultHistory>) {
    let path = history_path();
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    if let Err(e) = editor.save_history(&path) {
        debug!("failed to save history: {e}");
    }
}

/// Path to the history file.
fn history_path() -> std::path::PathBuf {
    colloquy_core::utils::get_data_path()
        .join("history")
        .join("cli_history")
}

/// Check if input is an exit command.
fn is_exit_command(input: &str) -> bool {
    let lower = input.to_lowercase();
    EXIT_COMMANDS.contains(&lower.as_str())
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
