//! `colloquy onboard` — initialize configuration and directories.
//!
//! - Creates `~/.colloquy/config.json` with a placeholder endpoint
//! - Creates the workspace, sessions, and history directories

use anyhow::Result;
use colored::Colorize;

use colloquy_core::config::{get_config_path, save_config, Config, ModelConfig};
use colloquy_core::utils::{get_data_path, get_default_workspace_path, get_sessions_path};

/// Run the onboard command.
pub fn run() -> Result<()> {
    println!();
    println!("{}", "Colloquy — Setup".cyan().bold());
    println!();

    let config_path = get_config_path();

    // 1. Create config if it doesn't exist
    if config_path.exists() {
        println!(
            "  {} config already exists at {}",
            "✓".green(),
            config_path.display()
        );
    } else {
        let config = starter_config();
        save_config(&config, Some(&config_path))?;
        println!(
            "  {} created config at {}",
            "✓".green(),
            config_path.display()
        );
        println!(
            "    {}",
            "edit it to add your endpoint's apiKey (or set COLLOQUY_API_KEY)".dimmed()
        );
    }

    // 2. Ensure workspace directory
    let workspace = get_default_workspace_path();
    std::fs::create_dir_all(&workspace)?;
    println!("  {} workspace at {}", "✓".green(), workspace.display());

    // 3. Sessions + history directories
    std::fs::create_dir_all(get_sessions_path())?;
    std::fs::create_dir_all(get_data_path().join("history"))?;
    println!("  {} sessions at {}", "✓".green(), get_sessions_path().display());

    println!();
    println!(
        "{}",
        "  Setup complete! Run `colloquy chat` to start.".green()
    );
    println!();

    Ok(())
}

/// A config with one placeholder endpoint, ready to fill in.
fn starter_config() -> Config {
    let mut config = Config::default();
    config.models.push(ModelConfig {
        name: "default".into(),
        api_base: "https://openrouter.ai/api/v1".into(),
        api_key: String::new(),
        model: "openai/gpt-4o-mini".into(),
        window: 128_000,
        extra_headers: None,
    });
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starter_config_has_one_placeholder_endpoint() {
        let config = starter_config();
        assert_eq!(config.models.len(), 1);
        assert!(!config.models[0].is_configured());
        assert!(config.models[0].api_base.starts_with("https://"));
    }

    #[test]
    fn starter_config_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        save_config(&starter_config(), Some(&path)).unwrap();

        let loaded = colloquy_core::config::load_config(Some(&path));
        assert_eq!(loaded.models[0].name, "default");
        assert_eq!(loaded.models[0].window, 128_000);
    }
}
