//! Tool trait — the abstract interface every agent tool implements.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

use colloquy_core::types::{ToolDefinition, ToolResult};

// ─────────────────────────────────────────────
// Tool trait
// ─────────────────────────────────────────────

/// Every agent tool implements this trait.
///
/// The turn loop discovers tools via `name()`, sends their schemas to the
/// model via `to_definition()`, and dispatches reconstructed calls via
/// `execute()`.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name the model uses to call this tool (e.g. `"read_file"`).
    fn name(&self) -> &str;

    /// Human-readable description shown to the model.
    fn description(&self) -> &str;

    /// JSON Schema describing the parameters.
    ///
    /// Must be `{"type": "object", "properties": {...}, "required": [...]}`.
    fn parameters(&self) -> Value;

    /// Execute the tool with the given arguments.
    ///
    /// Returns a `ToolResult` (success payload, partial hint, or error).
    /// Returning `Err` is also fine — the registry converts it to an
    /// error-status result for the model.
    async fn execute(&self, params: HashMap<String, Value>) -> anyhow::Result<ToolResult>;

    /// Build the `ToolDefinition` sent to the model.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition::new(self.name(), self.description(), self.parameters())
    }
}

// ─────────────────────────────────────────────
// Param helpers
// ─────────────────────────────────────────────

/// Extract a required `String` param, returning a user-friendly error.
pub fn require_string(params: &HashMap<String, Value>, key: &str) -> anyhow::Result<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow::anyhow!("Missing required parameter: {key}"))
}

/// Extract an optional `String` param.
pub fn optional_string(params: &HashMap<String, Value>, key: &str) -> Option<String> {
    params.get(key).and_then(|v| v.as_str()).map(|s| s.to_string())
}

/// Extract an optional non-negative integer param.
pub fn optional_usize(params: &HashMap<String, Value>, key: &str) -> Option<usize> {
    params
        .get(key)
        .and_then(|v| v.as_u64())
        .map(|v| v as usize)
}
