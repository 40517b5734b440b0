//! Tool registry — name → tool lookup and call dispatch.
//!
//! The turn loop registers tools here and dispatches reconstructed calls by
//! function name. The model always gets a `ToolResult` back: unknown names
//! and malformed arguments become error-status results attributed to the
//! specific call rather than aborting the round.

use std::collections::HashMap;
use std::sync::Arc;

use colloquy_core::types::{CallRef, ToolDefinition, ToolResult};
use tracing::{info, warn};

use super::base::Tool;
use crate::calls::parse_arguments;

// ─────────────────────────────────────────────
// Registry
// ─────────────────────────────────────────────

/// Stores tools keyed by name and dispatches calls.
///
/// Owns `Arc<dyn Tool>` so tools can be shared across concurrent executions.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Overwrites any previous tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        info!(tool = tool.name(), "registered tool");
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    /// Check if a tool is registered.
    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Names of all registered tools, sorted for determinism.
    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// The model-facing definitions for all registered tools.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> =
            self.tools.values().map(|t| t.to_definition()).collect();
        defs.sort_by(|a, b| a.function.name.cmp(&b.function.name));
        defs
    }

    /// Execute one reconstructed call.
    ///
    /// Argument parsing happens here, lazily, on first use of the call; a
    /// parse failure is this call's error result, not the round's.
    pub async fn execute(&self, call: &CallRef) -> ToolResult {
        let tool = match self.tools.get(call.name()) {
            Some(t) => t,
            None => {
                warn!(tool = call.name(), "tool not found");
                return ToolResult::error(format!("Tool '{}' not found", call.name()));
            }
        };

        let params = match parse_arguments(call) {
            Ok(p) => p,
            Err(e) => {
                warn!(tool = call.name(), error = %e, "malformed arguments");
                return ToolResult::error(e.to_string());
            }
        };

        match tool.execute(params).await {
            Ok(result) => result,
            Err(e) => {
                warn!(tool = call.name(), error = %e, "tool execution failed");
                ToolResult::error(format!("Error executing {}: {e}", call.name()))
            }
        }
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
