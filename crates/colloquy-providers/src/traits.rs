//! The `ChatClient` trait — the narrow contract the turn loop depends on.
//!
//! Every model backend implements this trait; `HttpClient` covers any
//! OpenAI-compatible API. Mock implementations drive the orchestrator tests.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use colloquy_core::types::{Message, ToolDefinition, UsageInfo};

// ─────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────

/// Client/transport failures.
///
/// `Clone` so a single upstream failure can be surfaced to both demultiplexed
/// consumers.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// Connection-level failure (DNS, refused, timeout, broken stream).
    #[error("network error: {0}")]
    Network(String),
    /// Endpoint responded with a non-success status.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
    /// Endpoint responded but the payload wasn't understood.
    #[error("protocol error: {0}")]
    Protocol(String),
}

// ─────────────────────────────────────────────
// Streaming items
// ─────────────────────────────────────────────

/// One fragment of an in-progress tool call, as streamed by the endpoint.
///
/// The `slot` identifies which call of the round the fragment belongs to.
/// The first fragment for a slot establishes `id` and `name`; every
/// fragment's `arguments` chunk is appended verbatim.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CallFragment {
    pub slot: usize,
    pub id: Option<String>,
    pub name: Option<String>,
    pub arguments: Option<String>,
}

/// One response increment from the endpoint.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResponseDelta {
    /// Text content, if this increment carries any.
    pub content: Option<String>,
    /// Tool-call fragments, grouped as emitted.
    pub fragments: Vec<CallFragment>,
    /// Usage totals; present only on the closing increment.
    pub usage: Option<UsageInfo>,
}

impl ResponseDelta {
    pub fn content(text: impl Into<String>) -> Self {
        ResponseDelta {
            content: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn fragments(fragments: Vec<CallFragment>) -> Self {
        ResponseDelta {
            fragments,
            ..Default::default()
        }
    }

    pub fn usage(usage: UsageInfo) -> Self {
        ResponseDelta {
            usage: Some(usage),
            ..Default::default()
        }
    }
}

/// A single-pass source of response increments. Consumed exactly once.
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<ResponseDelta, ClientError>> + Send>>;

/// Result of a non-streaming completion (summarization mode).
#[derive(Clone, Debug, PartialEq)]
pub struct Completion {
    /// Text content; tool calls in the response are discarded.
    pub text: String,
    /// Completion-token count reported by the endpoint.
    pub completion_tokens: u32,
}

// ─────────────────────────────────────────────
// ChatClient trait
// ─────────────────────────────────────────────

/// A model endpoint the turn loop can talk to.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Send the conversation and stream back response increments.
    async fn stream_chat(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<ChatStream, ClientError>;

    /// Non-streaming structured (JSON-object) completion. Used for
    /// summarization; any tool calls in the response are ignored.
    async fn complete_json(&self, messages: &[Message]) -> Result<Completion, ClientError>;

    /// Display name of the configured endpoint.
    fn name(&self) -> &str;

    /// Model identifier sent in requests.
    fn model_name(&self) -> &str;

    /// Context window in tokens for the active model.
    fn window(&self) -> u32;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_error_display() {
        let err = ClientError::Api {
            status: 429,
            message: "rate limited".into(),
        };
        assert_eq!(err.to_string(), "API error (429): rate limited");
        assert_eq!(err.clone(), err);
    }

    #[test]
    fn delta_constructors() {
        assert_eq!(
            ResponseDelta::content("hi").content.as_deref(),
            Some("hi")
        );
        let frag = CallFragment {
            slot: 0,
            id: Some("c1".into()),
            name: Some("read_file".into()),
            arguments: None,
        };
        assert_eq!(ResponseDelta::fragments(vec![frag.clone()]).fragments, vec![frag]);
    }
}
