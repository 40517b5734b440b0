//! Core types for Colloquy — chat messages in the OpenAI chat-completions
//! format, tool-call references, tool results, and usage accounting.
//!
//! Messages are a serde-tagged enum so format errors are caught at compile
//! time rather than at the API boundary.

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────
// Messages (OpenAI chat completions format)
// ─────────────────────────────────────────────

/// A chat message. Each variant maps to a `role` field value on the wire.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "role")]
pub enum Message {
    #[serde(rename = "system")]
    System { content: String },

    #[serde(rename = "user")]
    User { content: String },

    #[serde(rename = "assistant")]
    Assistant {
        #[serde(skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        tool_calls: Option<Vec<CallRef>>,
    },

    #[serde(rename = "tool")]
    Tool {
        content: String,
        tool_call_id: String,
    },
}

impl Message {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Message::System {
            content: content.into(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Message::User {
            content: content.into(),
        }
    }

    /// Create an assistant message with text content only.
    pub fn assistant(content: impl Into<String>) -> Self {
        Message::Assistant {
            content: Some(content.into()),
            tool_calls: None,
        }
    }

    /// Create an assistant message carrying the full tool-call set of a round.
    ///
    /// The call set must be complete before the message is constructed; tool
    /// results reference these calls by id, and the durable log is never
    /// patched after the fact.
    pub fn assistant_with_calls(content: Option<String>, calls: Vec<CallRef>) -> Self {
        Message::Assistant {
            content,
            tool_calls: if calls.is_empty() { None } else { Some(calls) },
        }
    }

    /// Create a tool result message keyed by the originating call id.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Message::Tool {
            content: content.into(),
            tool_call_id: tool_call_id.into(),
        }
    }

    /// The role tag used in durable record filenames.
    pub fn role_tag(&self) -> &'static str {
        match self {
            Message::System { .. } => "system",
            Message::User { .. } => "user",
            Message::Assistant { .. } => "assistant",
            Message::Tool { .. } => "tool",
        }
    }

    /// Text content of the message, if any.
    pub fn text(&self) -> Option<&str> {
        match self {
            Message::System { content } => Some(content),
            Message::User { content } => Some(content),
            Message::Assistant { content, .. } => content.as_deref(),
            Message::Tool { content, .. } => Some(content),
        }
    }
}

// ─────────────────────────────────────────────
// Tool-call references
// ─────────────────────────────────────────────

/// A reference to one tool invocation requested by the assistant.
///
/// Serializes to the OpenAI `tool_calls` entry shape:
/// `{"id": ..., "type": "function", "function": {"name": ..., "arguments": ...}}`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CallRef {
    /// Unique id for this call; tool result messages reference it.
    pub id: String,
    /// Always "function".
    #[serde(rename = "type")]
    pub kind: String,
    pub function: CallFn,
}

/// The function name and JSON-encoded argument text within a call.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CallFn {
    pub name: String,
    /// Raw argument text as streamed by the model. Parsed lazily, per call.
    pub arguments: String,
}

impl CallRef {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        CallRef {
            id: id.into(),
            kind: "function".to_string(),
            function: CallFn {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.function.name
    }

    pub fn arguments(&self) -> &str {
        &self.function.arguments
    }

    /// Compact one-line rendering of the call for display and logs.
    ///
    /// Long argument text is elided in the middle so a huge file write does
    /// not flood the terminal.
    pub fn display(&self) -> String {
        let args = self.function.arguments.trim();
        let count = args.chars().count();
        let shown = if count <= 120 {
            args.to_string()
        } else {
            let head: String = args.chars().take(58).collect();
            let tail: String = args.chars().skip(count - 58).collect();
            format!("{head}....{tail}")
        };
        format!("{}({})", self.function.name, shown)
    }
}

// ─────────────────────────────────────────────
// Tool results
// ─────────────────────────────────────────────

/// Outcome status of one tool execution.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Success,
    Error,
    Partial,
}

impl ToolStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolStatus::Success => "success",
            ToolStatus::Error => "error",
            ToolStatus::Partial => "partial",
        }
    }
}

impl std::str::FromStr for ToolStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(ToolStatus::Success),
            "error" => Ok(ToolStatus::Error),
            "partial" => Ok(ToolStatus::Partial),
            other => Err(format!("unknown tool status '{other}'")),
        }
    }
}

/// Result of one tool execution, fed back to the model as a tool message.
///
/// Exactly one of `payload` / `error` / `next_step_hint` is populated,
/// matching the status: success carries a payload, error carries an error
/// text, partial carries a hint telling the model how to get the rest.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToolResult {
    pub status: ToolStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_step_hint: Option<String>,
}

impl ToolResult {
    pub fn success(payload: impl Into<String>) -> Self {
        ToolResult {
            status: ToolStatus::Success,
            payload: Some(payload.into()),
            error: None,
            next_step_hint: None,
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        ToolResult {
            status: ToolStatus::Error,
            payload: None,
            error: Some(error.into()),
            next_step_hint: None,
        }
    }

    pub fn partial(next_step_hint: impl Into<String>) -> Self {
        ToolResult {
            status: ToolStatus::Partial,
            payload: None,
            error: None,
            next_step_hint: Some(next_step_hint.into()),
        }
    }

    /// The populated field's text.
    pub fn text(&self) -> &str {
        match self.status {
            ToolStatus::Success => self.payload.as_deref().unwrap_or(""),
            ToolStatus::Error => self.error.as_deref().unwrap_or(""),
            ToolStatus::Partial => self.next_step_hint.as_deref().unwrap_or(""),
        }
    }

    /// Replace the populated field's text (used when clipping oversized
    /// results to fit the context window).
    pub fn set_text(&mut self, text: impl Into<String>) {
        let text = text.into();
        match self.status {
            ToolStatus::Success => self.payload = Some(text),
            ToolStatus::Error => self.error = Some(text),
            ToolStatus::Partial => self.next_step_hint = Some(text),
        }
    }

    /// Rebuild a result from its durable record fields.
    pub fn from_record(status: ToolStatus, text: impl Into<String>) -> Self {
        let mut result = ToolResult {
            status,
            payload: None,
            error: None,
            next_step_hint: None,
        };
        result.set_text(text);
        result
    }
}

// ─────────────────────────────────────────────
// Tool definitions (for LLM requests)
// ─────────────────────────────────────────────

/// Definition of a tool, sent to the model so it knows what it can call.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToolDefinition {
    /// Always "function".
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: FunctionDefinition,
}

/// Schema of a function tool.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

impl ToolDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        ToolDefinition {
            tool_type: "function".to_string(),
            function: FunctionDefinition {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }
}

// ─────────────────────────────────────────────
// Usage accounting
// ─────────────────────────────────────────────

/// Token usage reported by the endpoint at stream end.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UsageInfo {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
