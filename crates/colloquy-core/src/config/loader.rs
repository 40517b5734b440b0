//! Config loader — reads `~/.colloquy/config.json` and merges env vars.
//!
//! # Loading precedence
//! 1. Defaults (from `Config::default()`)
//! 2. JSON file at `~/.colloquy/config.json`
//! 3. Environment variable `COLLOQUY_API_KEY` (fills models missing a key)

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::schema::Config;

/// Default config file path.
pub fn get_config_path() -> PathBuf {
    crate::utils::get_data_path().join("config.json")
}

/// Load configuration from the default path + env vars.
///
/// Falls back to `Config::default()` if the file doesn't exist or can't be
/// parsed.
pub fn load_config(path: Option<&Path>) -> Config {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);
    load_config_from_path(&config_path)
}

fn load_config_from_path(path: &Path) -> Config {
    if !path.exists() {
        info!("No config file found at {}, using defaults", path.display());
        return apply_env_overrides(Config::default());
    }

    debug!("Loading config from {}", path.display());

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to read config file {}: {}", path.display(), e);
            return apply_env_overrides(Config::default());
        }
    };

    let config: Config = match serde_json::from_str(&content) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to parse config JSON: {}", e);
            return apply_env_overrides(Config::default());
        }
    };

    apply_env_overrides(config)
}

/// Save configuration to disk (pretty-printed JSON with camelCase keys).
pub fn save_config(config: &Config, path: Option<&Path>) -> std::io::Result<()> {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(config)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    std::fs::write(&config_path, json)?;
    debug!("Saved config to {}", config_path.display());
    Ok(())
}

/// Apply environment variable overrides.
///
/// `COLLOQUY_API_KEY` fills in the key of any model entry missing one, so a
/// config file can be committed without secrets.
fn apply_env_overrides(mut config: Config) -> Config {
    if let Ok(key) = std::env::var("COLLOQUY_API_KEY") {
        if !key.is_empty() {
            for model in config.models.iter_mut().filter(|m| m.api_key.is_empty()) {
                model.api_key = key.clone();
            }
        }
    }
    config
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::ModelConfig;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let cfg = load_config(Some(&dir.path().join("nope.json")));
        assert!(cfg.models.is_empty());
    }

    #[test]
    fn malformed_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();
        let cfg = load_config(Some(&path));
        assert!(cfg.models.is_empty());
    }

    #[test]
    fn save_and_reload_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut cfg = Config::default();
        cfg.agent.max_tokens = 2048;
        cfg.models.push(ModelConfig {
            name: "primary".into(),
            model: "gpt-4o".into(),
            api_key: "sk-test".into(),
            window: 8000,
            ..Default::default()
        });

        save_config(&cfg, Some(&path)).unwrap();
        let loaded = load_config(Some(&path));

        assert_eq!(loaded.agent.max_tokens, 2048);
        assert_eq!(loaded.models[0].name, "primary");
        assert_eq!(loaded.models[0].window, 8000);
    }

    #[test]
    fn save_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/deeper/config.json");
        save_config(&Config::default(), Some(&path)).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn env_override_fills_missing_keys_only() {
        let mut cfg = Config::default();
        cfg.models.push(ModelConfig {
            name: "a".into(),
            api_key: String::new(),
            ..Default::default()
        });
        cfg.models.push(ModelConfig {
            name: "b".into(),
            api_key: "explicit".into(),
            ..Default::default()
        });

        std::env::set_var("COLLOQUY_API_KEY", "from-env");
        let cfg = apply_env_overrides(cfg);
        std::env::remove_var("COLLOQUY_API_KEY");

        assert_eq!(cfg.models[0].api_key, "from-env");
        assert_eq!(cfg.models[1].api_key, "explicit");
    }
}
