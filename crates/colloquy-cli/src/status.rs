//! `colloquy status` — show configuration and endpoint status.
//!
//! - Shows config path, workspace, turn-loop parameters
//! - Shows API key status for each configured endpoint
//! - Shows how many sessions are stored

use anyhow::Result;
use colored::Colorize;

use colloquy_core::config::{get_config_path, load_config};
use colloquy_core::session::list_sessions;
use colloquy_core::utils::{expand_home, get_sessions_path};

/// Run the status command.
pub fn run() -> Result<()> {
    let config = load_config(None);
    let config_path = get_config_path();

    println!();
    println!("{}", "Colloquy Status".cyan().bold());
    println!();

    // Config
    let config_exists = config_path.exists();
    println!(
        "  {:<14} {} {}",
        "Config:".bold(),
        config_path.display(),
        if config_exists {
            "✓".green().to_string()
        } else {
            "(not found)".red().to_string()
        }
    );

    // Workspace
    let workspace = expand_home(&config.agent.workspace);
    let ws_exists = workspace.exists();
    println!(
        "  {:<14} {} {}",
        "Workspace:".bold(),
        workspace.display(),
        if ws_exists {
            "✓".green().to_string()
        } else {
            "(not found)".red().to_string()
        }
    );

    // Turn-loop parameters
    let rounds = config
        .agent
        .max_rounds
        .map_or("unbounded".to_string(), |r| r.to_string());
    println!(
        "  {:<14} {} | {} | {}",
        "Parameters:".bold(),
        format!("temp: {}", config.agent.temperature).dimmed(),
        format!("max_tokens: {}", config.agent.max_tokens).dimmed(),
        format!("max_rounds: {rounds}").dimmed(),
    );

    // Endpoints
    println!();
    println!("  {}", "Models:".bold());
    if config.models.is_empty() {
        println!("    {}", "(none configured — run `colloquy onboard`)".dimmed());
    } else {
        for (i, model) in config.models.iter().enumerate() {
            let status = if model.is_configured() {
                format!("{} (key set)", "✓".green())
            } else {
                format!("{}", "· no key".dimmed())
            };
            let default_marker = if i == 0 { " (default)" } else { "" };
            println!(
                "    {:<20} {} window={} {}",
                format!("{}{}", model.name, default_marker),
                model.model.dimmed(),
                model.window,
                status
            );
        }
    }

    // Sessions
    let sessions = list_sessions(&get_sessions_path());
    println!();
    println!(
        "  {:<14} {} stored",
        "Sessions:".bold(),
        sessions.len()
    );

    println!();
    Ok(())
}
