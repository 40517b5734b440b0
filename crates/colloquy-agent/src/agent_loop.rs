//! Turn orchestrator — the model ↔ tool state machine driving one user
//! interaction.
//!
//! A turn starts when a user message is appended and a streaming chat
//! request goes out. Content is rendered as it arrives while tool-call
//! fragments are reconstructed from the same response stream. The round's
//! assistant message is logged with its complete call set before any tool
//! executes; tools then run concurrently and their results are logged in
//! slot order. The loop re-queries the model while calls keep coming and
//! consults the compaction policy after every round.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Result};
use tracing::{debug, info};

use colloquy_core::config::AgentConfig;
use colloquy_core::session::Session;
use colloquy_core::types::{CallRef, Message, ToolResult};
use colloquy_core::utils;
use colloquy_providers::demux::split;
use colloquy_providers::traits::ChatClient;

use crate::calls::CallSet;
use crate::compaction;
use crate::tools::filesystem::{ListDirTool, ReadFileTool, WriteFileTool};
use crate::tools::ToolRegistry;

/// Prompt used by the on-demand one-line session summary.
const ONE_LINE_SUMMARY_PROMPT: &str =
    "Summarize the conversation above in a single line, using its primary \
     language, as a short phrase with no subject. Reply with the phrase only.";

// ─────────────────────────────────────────────
// Observer
// ─────────────────────────────────────────────

/// Rendering contract between the turn loop and its frontend.
///
/// The core never prints; the CLI (or a test) implements this to see content
/// deltas as they stream, tool activity, and compaction notes.
pub trait TurnObserver: Send {
    fn on_content(&mut self, _delta: &str) {}
    fn on_tool_call(&mut self, _call: &CallRef) {}
    fn on_tool_result(&mut self, _call: &CallRef, _result: &ToolResult) {}
    fn on_note(&mut self, _summary: &str) {}
}

/// Observer that ignores everything.
pub struct NullObserver;

impl TurnObserver for NullObserver {}

// ─────────────────────────────────────────────
// Agent
// ─────────────────────────────────────────────

/// The turn loop and the state it owns: active client, tool registry, and
/// the current session. One `Agent` processes one turn at a time; session
/// switches happen only between turns.
pub struct Agent {
    client: Arc<dyn ChatClient>,
    tools: ToolRegistry,
    config: AgentConfig,
    sessions_root: PathBuf,
    session: Option<Session>,
}

impl Agent {
    /// Create an agent with the builtin file tools registered.
    pub fn new(
        client: Arc<dyn ChatClient>,
        config: AgentConfig,
        sessions_root: impl Into<PathBuf>,
    ) -> Self {
        let mut tools = ToolRegistry::new();
        let allowed_dir = config
            .restrict_to_workspace
            .then(|| utils::expand_home(&config.workspace));

        tools.register(Arc::new(ReadFileTool::new(allowed_dir.clone())));
        tools.register(Arc::new(WriteFileTool::new(allowed_dir.clone())));
        tools.register(Arc::new(ListDirTool::new(allowed_dir)));

        info!(
            model = %client.model_name(),
            tools = tools.len(),
            "agent initialized"
        );

        Agent {
            client,
            tools,
            config,
            sessions_root: sessions_root.into(),
            session: None,
        }
    }

    // ── Accessors ──

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn tools_mut(&mut self) -> &mut ToolRegistry {
        &mut self.tools
    }

    pub fn client(&self) -> &Arc<dyn ChatClient> {
        &self.client
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn sessions_root(&self) -> &Path {
        &self.sessions_root
    }

    // ── Commands (between turns only) ──

    /// Swap the active model endpoint. Safe only between turns.
    pub fn set_client(&mut self, client: Arc<dyn ChatClient>) {
        info!(model = %client.model_name(), "switched model");
        self.client = client;
    }

    /// Abandon the current session; the next turn starts a fresh one.
    /// Durable records of the old session remain on disk.
    pub fn reset_session(&mut self) {
        self.session = None;
    }

    /// Replay a stored session into memory and make it current.
    pub fn resume_session(&mut self, started_at: &str) -> &Session {
        let session = Session::resume(self.sessions_root.clone(), started_at);
        info!(
            session = started_at,
            messages = session.conversation().len(),
            "resumed session"
        );
        self.session = Some(session);
        self.session.as_ref().expect("session just set")
    }

    // ── The turn loop ──

    /// Process one user turn to completion.
    ///
    /// Any failure — transport, reassembly, tool batch — propagates out so
    /// the frontend can report it and return to the prompt; everything
    /// logged before the failure is retained.
    pub async fn run_turn(&mut self, input: &str, observer: &mut dyn TurnObserver) -> Result<()> {
        self.ensure_session();
        let client = Arc::clone(&self.client);
        let tool_defs = self.tools.definitions();
        let session = self.session.as_mut().expect("session just ensured");

        session.log_user(input);

        let mut rounds = 0u32;
        loop {
            let stream = client
                .stream_chat(session.conversation(), &tool_defs)
                .await?;
            let mut halves = split(stream);

            // Drain content as it streams; fragments buffer independently.
            let mut content = String::new();
            while let Some(item) = halves.content.recv().await {
                let delta = item?;
                observer.on_content(&delta);
                content.push_str(&delta);
            }

            let calls = CallSet::collect(halves.calls).await?;
            if let Ok(Some(usage)) = halves.usage.await {
                session.set_token_usage(usage.total_tokens);
            }

            debug!(
                round = rounds,
                calls = calls.len(),
                usage = session.token_usage(),
                "round complete"
            );

            // The assistant message carries the round's whole call set and is
            // logged before any tool executes.
            session.log_assistant(content, calls.to_vec());

            let has_calls = !calls.is_empty();
            if has_calls {
                for call in calls.iter() {
                    observer.on_tool_call(call);
                }

                // Execute concurrently; join_all preserves slot order, so the
                // log stays deterministic regardless of completion order.
                let executions = calls.iter().map(|call| self.tools.execute(call));
                let results = futures::future::join_all(executions).await;

                for (call, mut result) in calls.iter().zip(results) {
                    compaction::clip_tool_result(
                        &mut result,
                        session.token_usage(),
                        client.window(),
                    );
                    observer.on_tool_result(call, &result);
                    session.log_tool(call, &result);
                }
            }

            compaction::compact_if_needed(client.as_ref(), session, observer).await?;

            if !has_calls {
                break;
            }
            rounds += 1;
            if let Some(max) = self.config.max_rounds {
                if rounds >= max {
                    info!(rounds, "round limit reached, ending turn");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Produce a one-line summary of the current session on demand and store
    /// it alongside the session records.
    pub async fn summarize_now(&mut self, observer: &mut dyn TurnObserver) -> Result<String> {
        let client = Arc::clone(&self.client);
        let Some(session) = self.session.as_mut() else {
            bail!("no active session to summarize");
        };

        let mut talk = session.conversation().to_vec();
        talk.push(Message::user(ONE_LINE_SUMMARY_PROMPT));

        let stream = client.stream_chat(&talk, &[]).await?;
        let mut halves = split(stream);

        let mut text = String::new();
        while let Some(item) = halves.content.recv().await {
            let delta = item?;
            observer.on_content(&delta);
            text.push_str(&delta);
        }
        // The summary request offers no tools; discard any fragments anyway.
        let _ = CallSet::collect(halves.calls).await;

        let text = text.trim().to_string();
        session.write_summary(&text);
        Ok(text)
    }

    fn ensure_session(&mut self) {
        if self.session.is_none() {
            let mut session = Session::new(self.sessions_root.clone());
            if let Some(prompt) = &self.config.system_prompt {
                session.log_system(prompt.clone());
            }
            info!(session = %session.started_at(), "started new session");
            self.session = Some(session);
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
