//! Configuration schema.
//!
//! Hierarchy: `Config` → `AgentConfig`, `Vec<ModelConfig>`.
//!
//! JSON on disk uses **camelCase** keys; Rust uses snake_case.
//! `#[serde(rename_all = "camelCase")]` handles the conversion.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ─────────────────────────────────────────────
// Root Config
// ─────────────────────────────────────────────

/// Root configuration — loaded from `~/.colloquy/config.json` + env vars.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub agent: AgentConfig,
    /// Named model endpoints. The first entry is the default.
    pub models: Vec<ModelConfig>,
}

impl Config {
    /// The default model endpoint (first configured entry).
    pub fn default_model(&self) -> Option<&ModelConfig> {
        self.models.first()
    }

    /// Look up a model by name or 1-based list position.
    pub fn find_model(&self, name_or_index: &str) -> Option<&ModelConfig> {
        self.models
            .iter()
            .enumerate()
            .find(|(i, m)| m.name == name_or_index || (i + 1).to_string() == name_or_index)
            .map(|(_, m)| m)
    }

    /// Numbered listing of configured model names, one per line.
    pub fn model_listing(&self) -> String {
        self.models
            .iter()
            .enumerate()
            .map(|(i, m)| format!("{}. {}", i + 1, m.name))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// ─────────────────────────────────────────────
// Agent
// ─────────────────────────────────────────────

/// Turn-loop settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentConfig {
    /// System prompt logged at the start of each new session, if set.
    pub system_prompt: Option<String>,
    /// Maximum tokens to generate per response.
    pub max_tokens: u32,
    /// Sampling temperature (0.0 – 2.0).
    pub temperature: f64,
    /// Maximum model ↔ tool rounds per turn. `None` means unbounded.
    pub max_rounds: Option<u32>,
    /// Workspace directory the file tools operate in.
    pub workspace: String,
    /// Restrict file tools to the workspace directory.
    pub restrict_to_workspace: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: None,
            max_tokens: 4096,
            temperature: 0.7,
            max_rounds: None,
            workspace: "~/.colloquy/workspace".to_string(),
            restrict_to_workspace: false,
        }
    }
}

// ─────────────────────────────────────────────
// Models
// ─────────────────────────────────────────────

/// One named OpenAI-compatible model endpoint.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModelConfig {
    /// Display name used by the switch-model command.
    pub name: String,
    /// API base URL (e.g. `"https://openrouter.ai/api/v1"`).
    pub api_base: String,
    /// API key for Bearer authentication.
    pub api_key: String,
    /// Model identifier sent in requests.
    pub model: String,
    /// Context window in tokens; conversations above it get compacted.
    pub window: u32,
    /// Extra HTTP headers to send with each request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_headers: Option<HashMap<String, String>>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            api_base: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: String::new(),
            window: default_window(),
            extra_headers: None,
        }
    }
}

impl ModelConfig {
    /// Whether this endpoint has an API key set.
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}

/// Conservative fallback window for endpoints that don't declare one.
pub fn default_window() -> u32 {
    3600
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
