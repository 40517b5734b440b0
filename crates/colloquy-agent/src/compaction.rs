//! Context-window compaction — summarizes the conversation when token usage
//! exceeds the model's window, and clips oversized tool results before they
//! are logged.
//!
//! The policy fires when `token_usage > window` (the full window, not a
//! fraction). The summarization request is the full conversation plus one
//! appended instruction asking for a structured Q&A + resources summary in
//! the conversation's dominant language; it goes through the client's
//! non-streaming JSON mode and any tool calls in the response are discarded.

use std::time::Duration;

use tracing::{debug, info};

use colloquy_core::session::Session;
use colloquy_core::types::{Message, ToolResult};
use colloquy_core::utils::estimate_tokens;
use colloquy_providers::traits::ChatClient;

use crate::agent_loop::TurnObserver;

/// Empty summarization responses are retried this many times before the turn
/// fails.
const MAX_EMPTY_RETRIES: u32 = 5;

/// Base delay between empty-summary retries; doubles per attempt.
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// The summary shape the model is asked to produce.
const SUMMARY_SCHEMA: &str = r#"{"qa": [{"question": "...", "answer": "..."}], "resources": [{"uri": "...", "content": "..."}]}"#;

// ─────────────────────────────────────────────
// Policy
// ─────────────────────────────────────────────

/// Whether the conversation must be compacted before the next model call.
pub fn needs_compaction(token_usage: u32, window: u32) -> bool {
    token_usage > window
}

/// The instruction appended to the conversation for summarization.
pub fn summary_instruction(cjk: bool) -> String {
    if cjk {
        format!(
            "简明地总结上面的全部对话（包括之前的前情和新的内容）：\
             1、提出了哪些问题、得到了哪些回答，相关的问答尽量合并；\
             2、使用了哪些文件或网址，它们涉及什么内容。\
             以JSON格式回复：`{SUMMARY_SCHEMA}`"
        )
    } else {
        format!(
            "Briefly summarize the entire conversation above (earlier context \
             and new dialogue included): 1. what questions were asked and what \
             answers were given, merging related Q&As into consolidated pairs; \
             2. what files or URLs were used and what they contained. \
             Reply as JSON: `{SUMMARY_SCHEMA}`"
        )
    }
}

/// Build the summarization message list: the conversation plus the
/// instruction.
pub fn compaction_request(conversation: &[Message], cjk: bool) -> Vec<Message> {
    let mut messages = conversation.to_vec();
    messages.push(Message::user(summary_instruction(cjk)));
    messages
}

/// Compact the session while its usage exceeds the window.
///
/// Each successful pass replaces the live conversation with one framed
/// system note, logs exactly one durable note record, and resets
/// `token_usage` to the summary's completion-token count. Returns whether
/// any compaction happened.
pub async fn compact_if_needed(
    client: &dyn ChatClient,
    session: &mut Session,
    observer: &mut dyn TurnObserver,
) -> anyhow::Result<bool> {
    let mut compacted = false;

    while needs_compaction(session.token_usage(), client.window()) {
        info!(
            usage = session.token_usage(),
            window = client.window(),
            "compacting conversation"
        );

        let cjk = session.is_cjk_dominant();
        let request = compaction_request(session.conversation(), cjk);

        let mut attempt = 0;
        let completion = loop {
            let completion = client.complete_json(&request).await?;
            if !completion.text.is_empty() {
                break completion;
            }
            // Empty summary is a transient failure: back off and retry the
            // same request.
            attempt += 1;
            if attempt >= MAX_EMPTY_RETRIES {
                anyhow::bail!(
                    "summarization returned empty text after {MAX_EMPTY_RETRIES} attempts"
                );
            }
            debug!(attempt, "empty summary, retrying");
            tokio::time::sleep(RETRY_BASE_DELAY * 2u32.pow(attempt - 1)).await;
        };

        observer.on_note(&completion.text);
        session.log_note(&completion.text);
        session.set_token_usage(completion.completion_tokens);
        compacted = true;

        info!(
            usage = session.token_usage(),
            "conversation compacted to a single note"
        );
    }

    Ok(compacted)
}

// ─────────────────────────────────────────────
// Tool-result clipping
// ─────────────────────────────────────────────

/// Drop trailing lines from a tool result until it fits the remaining
/// window, so one oversized result cannot blow the budget before the next
/// model call.
pub fn clip_tool_result(result: &mut ToolResult, token_usage: u32, window: u32) {
    let mut text = result.text().to_string();
    let mut clipped = false;
    while !text.is_empty() && token_usage + estimate_tokens(&text) > window {
        match text.rsplit_once('\n') {
            Some((head, _)) => text.truncate(head.len()),
            None => text.clear(),
        }
        clipped = true;
    }
    if clipped {
        debug!(remaining = text.len(), "clipped oversized tool result");
        result.set_text(text);
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
