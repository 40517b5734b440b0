//! Colloquy CLI — entry point.
//!
//! # Commands
//!
//! - `colloquy chat [-m MESSAGE]` — chat (single-shot or interactive REPL)
//! - `colloquy onboard` — initialize config + workspace
//! - `colloquy status` — show configuration and endpoint status
//! - `colloquy models` — list configured model endpoints

mod helpers;
mod onboard;
mod repl;
mod status;

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use colloquy_agent::Agent;
use colloquy_core::config::{load_config, Config};
use colloquy_core::utils::get_sessions_path;
use colloquy_providers::HttpClient;

// ─────────────────────────────────────────────
// CLI definition
// ─────────────────────────────────────────────

/// Colloquy — streaming tool-calling chat agent for the terminal
#[derive(Parser)]
#[command(name = "colloquy", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the model (single-shot or interactive REPL)
    Chat {
        /// Single message (non-interactive). Omit for REPL mode.
        #[arg(short, long)]
        message: Option<String>,

        /// Enable debug logging
        #[arg(long, default_value_t = false)]
        logs: bool,
    },

    /// Initialize configuration and workspace
    Onboard,

    /// Show configuration and endpoint status
    Status,

    /// List configured model endpoints
    Models,
}

// ─────────────────────────────────────────────
// Entrypoint
// ─────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Chat {
        message: None,
        logs: false,
    }) {
        Commands::Chat { message, logs } => {
            init_logging(logs);
            run_chat(message).await
        }
        Commands::Onboard => onboard::run(),
        Commands::Status => status::run(),
        Commands::Models => {
            let config = load_config(None);
            if config.models.is_empty() {
                println!("No models configured. Run `colloquy onboard` first.");
            } else {
                println!("{}", config.model_listing());
            }
            Ok(())
        }
    }
}

// ─────────────────────────────────────────────
// Chat command
// ─────────────────────────────────────────────

async fn run_chat(message: Option<String>) -> Result<()> {
    let config = load_config(None);
    let mut agent = build_agent(&config)?;

    match message {
        Some(msg) => {
            info!("processing single message");
            let mut observer = helpers::ConsoleObserver::new();
            agent
                .run_turn(&msg, &mut observer)
                .await
                .context("turn failed")?;
            println!();
            Ok(())
        }
        None => repl::run(agent, config).await,
    }
}

/// Build an `Agent` talking to the default configured endpoint.
fn build_agent(config: &Config) -> Result<Agent> {
    let model = config.default_model().with_context(|| {
        "no models configured — run `colloquy onboard`, then add an endpoint \
         to ~/.colloquy/config.json"
    })?;
    if !model.is_configured() {
        bail!(
            "model '{}' has no API key (set it in the config or via COLLOQUY_API_KEY)",
            model.name
        );
    }

    let workspace = colloquy_core::utils::expand_home(&config.agent.workspace);
    std::fs::create_dir_all(&workspace)
        .with_context(|| format!("failed to create workspace: {}", workspace.display()))?;

    let client = HttpClient::new(
        model.clone(),
        config.agent.max_tokens,
        config.agent.temperature,
    );

    Ok(Agent::new(
        Arc::new(client),
        config.agent.clone(),
        get_sessions_path(),
    ))
}

/// Initialize tracing/logging.
fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("colloquy=debug,info")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
