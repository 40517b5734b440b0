//! Durable, resumable session log.
//!
//! The in-memory conversation and the on-disk record sequence are written by
//! a single owner at a time. Storage failures are logged and the in-memory
//! conversation still advances: the session stays usable, resumability for
//! that one record is lost.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::types::{CallRef, Message, ToolResult, ToolStatus};
use crate::utils;

/// Record filename suffixes that take part in conversation replay.
const REPLAYED_ROLES: &[&str] = &["system", "user", "assistant", "tool", "note"];

// ─────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────

/// One conversation: an append-only durable log plus the live message list.
pub struct Session {
    /// Root directory holding all session directories.
    root: PathBuf,
    /// Sortable creation stamp; doubles as the session id and directory name.
    started_at: String,
    /// Stamp of the most recent record.
    ended_at: String,
    /// Next record sequence number.
    seq: u32,
    /// Live conversation sent to the model.
    conversation: Vec<Message>,
    /// Total tokens reported by the last model call.
    token_usage: u32,
}

impl Session {
    /// Create a fresh session. Nothing is written until the first log call.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let started_at = utils::now_stamp();
        Session {
            root: root.into(),
            ended_at: started_at.clone(),
            started_at,
            seq: 0,
            conversation: Vec::new(),
            token_usage: 0,
        }
    }

    /// Rebuild a session by replaying its durable records in filename order.
    ///
    /// Tool records are re-linked onto the nearest preceding assistant
    /// message; note records replace the conversation accumulated so far,
    /// exactly as compaction did when the note was taken.
    pub fn resume(root: impl Into<PathBuf>, started_at: &str) -> Self {
        let root = root.into();
        let mut session = Session {
            root,
            started_at: started_at.to_string(),
            ended_at: started_at.to_string(),
            seq: 0,
            conversation: Vec::new(),
            token_usage: 0,
        };

        let dir = session.dir();
        if !dir.exists() {
            return session;
        }

        let mut files = replayable_files(&dir);
        files.sort();

        for file_name in &files {
            let path = dir.join(file_name);
            let content = match std::fs::read_to_string(&path) {
                Ok(c) => c,
                Err(e) => {
                    warn!("Skipping unreadable record {}: {}", path.display(), e);
                    continue;
                }
            };
            let role = role_of(file_name);
            session.replay_record(role, &content, file_name);
        }

        if let Some(last) = files.last() {
            if let Some(stamp) = last.split('.').next() {
                session.ended_at = stamp.to_string();
            }
            session.seq = seq_of(last).map_or(files.len() as u32, |s| s + 1);
        }

        debug!(
            session = %session.started_at,
            messages = session.conversation.len(),
            "resumed session"
        );
        session
    }

    // ── Accessors ──

    pub fn started_at(&self) -> &str {
        &self.started_at
    }

    pub fn ended_at(&self) -> &str {
        &self.ended_at
    }

    pub fn conversation(&self) -> &[Message] {
        &self.conversation
    }

    pub fn token_usage(&self) -> u32 {
        self.token_usage
    }

    pub fn set_token_usage(&mut self, usage: u32) {
        self.token_usage = usage;
    }

    /// Directory holding this session's records.
    pub fn dir(&self) -> PathBuf {
        self.root.join(&self.started_at)
    }

    // ── Logging ──

    /// Log a system message.
    pub fn log_system(&mut self, text: impl Into<String>) {
        let text = text.into();
        self.write_record("system", &text);
        self.conversation.push(Message::system(text));
    }

    /// Log a user message.
    pub fn log_user(&mut self, text: impl Into<String>) {
        let text = text.into();
        self.write_record("user", &text);
        self.conversation.push(Message::user(text));
    }

    /// Log an assistant message carrying all of a round's tool calls.
    ///
    /// The durable record stores the rendered content; the calls themselves
    /// are recovered at resume time from the tool records that follow.
    pub fn log_assistant(&mut self, content: impl Into<String>, calls: Vec<CallRef>) {
        let content = content.into();
        self.write_record("assistant", &content);
        let content = if content.is_empty() {
            None
        } else {
            Some(content)
        };
        self.conversation
            .push(Message::assistant_with_calls(content, calls));
    }

    /// Log one tool result, keyed by its originating call.
    pub fn log_tool(&mut self, call: &CallRef, result: &ToolResult) {
        // Args are JSON-string-encoded onto a single line so the record stays
        // line-oriented even when the raw argument text contains newlines.
        let args_line = serde_json::to_string(call.arguments())
            .unwrap_or_else(|_| format!("{:?}", call.arguments()));
        let body = format!(
            "{}\n{}\n{}\n{}\n{}",
            call.id,
            call.name(),
            args_line,
            result.status.as_str(),
            result.text()
        );
        self.write_record("tool", &body);

        let content =
            serde_json::to_string(result).unwrap_or_else(|_| result.text().to_string());
        self.conversation
            .push(Message::tool_result(call.id.clone(), content));
    }

    /// Record a compaction note: the live conversation is replaced by a
    /// single framed system message, while the durable log keeps everything
    /// that came before for audit and resume.
    pub fn log_note(&mut self, summary: &str) {
        let framed = frame_note(summary, self.is_cjk_dominant());
        self.write_record("note", summary);
        self.conversation.clear();
        self.conversation.push(Message::system(framed));
    }

    /// Write an on-demand summary file. Not part of the replayed log.
    pub fn write_summary(&mut self, text: &str) {
        let dir = self.dir();
        if let Err(e) = std::fs::create_dir_all(&dir) {
            warn!("Failed to create session dir {}: {}", dir.display(), e);
            return;
        }
        let path = dir.join(format!("{}.sum.md", utils::now_stamp()));
        if let Err(e) = std::fs::write(&path, text) {
            warn!("Failed to write summary {}: {}", path.display(), e);
        }
    }

    // ── Language ──

    /// Whether CJK characters dominate the user/assistant content.
    pub fn is_cjk_dominant(&self) -> bool {
        let mut cjk = 0usize;
        let mut total = 0usize;
        for msg in &self.conversation {
            if matches!(msg, Message::User { .. } | Message::Assistant { .. }) {
                if let Some(text) = msg.text() {
                    let (c, t) = utils::cjk_counts(text);
                    cjk += c;
                    total += t;
                }
            }
        }
        total > 0 && cjk * 2 > total
    }

    /// The latest on-demand summary, else the first user question, else a
    /// placeholder. Used for the history listing.
    pub fn last_summary_or_question(&self) -> String {
        if let Some(summary) = self.last_summary() {
            return summary;
        }
        self.conversation
            .iter()
            .find_map(|m| match m {
                Message::User { content } => Some(content.clone()),
                _ => None,
            })
            .unwrap_or_else(|| "nothing".to_string())
    }

    fn last_summary(&self) -> Option<String> {
        let dir = self.dir();
        let entries = std::fs::read_dir(&dir).ok()?;
        let mut summaries: Vec<String> = entries
            .flatten()
            .filter(|e| e.path().is_file())
            .filter_map(|e| e.file_name().into_string().ok())
            .filter(|name| name.ends_with(".sum.md"))
            .collect();
        summaries.sort();
        let latest = summaries.pop()?;
        std::fs::read_to_string(dir.join(latest))
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    // ── Record I/O ──

    /// Write one whole record file, then close it, before anything else is
    /// logged. On failure the conversation still advances (recoverable data
    /// loss: that record won't be replayed on resume).
    fn write_record(&mut self, role: &str, body: &str) {
        self.ended_at = utils::now_stamp();
        let dir = self.dir();
        if let Err(e) = std::fs::create_dir_all(&dir) {
            warn!("Failed to create session dir {}: {}", dir.display(), e);
            self.seq += 1;
            return;
        }
        let name = format!("{}.{:04}.{}.md", self.ended_at, self.seq, role);
        self.seq += 1;
        let path = dir.join(name);
        if let Err(e) = std::fs::write(&path, body) {
            warn!("Failed to persist record {}: {}", path.display(), e);
        }
    }

    /// Replay one record into the conversation.
    fn replay_record(&mut self, role: &str, content: &str, file_name: &str) {
        match role {
            "system" => self.conversation.push(Message::system(content.trim_end())),
            "user" => self.conversation.push(Message::user(content.trim_end())),
            "assistant" => self
                .conversation
                .push(Message::assistant_with_calls(
                    non_empty(content.trim_end()),
                    Vec::new(),
                )),
            "tool" => self.replay_tool_record(content, file_name),
            "note" => {
                let framed = frame_note(content.trim_end(), self.is_cjk_dominant());
                self.conversation.clear();
                self.conversation.push(Message::system(framed));
            }
            other => warn!("Unknown record role '{}' in {}", other, file_name),
        }
    }

    fn replay_tool_record(&mut self, content: &str, file_name: &str) {
        let mut lines = content.splitn(5, '\n');
        let (Some(id), Some(name), Some(args_line), Some(status_line)) = (
            lines.next(),
            lines.next(),
            lines.next(),
            lines.next(),
        ) else {
            warn!("Malformed tool record {}", file_name);
            return;
        };
        let text = lines.next().unwrap_or("");

        let args: String = serde_json::from_str(args_line)
            .unwrap_or_else(|_| args_line.to_string());
        let status: ToolStatus = match status_line.trim().parse() {
            Ok(s) => s,
            Err(e) => {
                warn!("Malformed tool record {}: {}", file_name, e);
                return;
            }
        };

        // Re-link the call onto the nearest preceding assistant message.
        let call = CallRef::new(id.trim(), name.trim(), args);
        let Some(assistant) = self
            .conversation
            .iter_mut()
            .rev()
            .find(|m| matches!(m, Message::Assistant { .. }))
        else {
            warn!(
                "Tool record {} has no preceding assistant message; skipped",
                file_name
            );
            return;
        };
        if let Message::Assistant { tool_calls, .. } = assistant {
            tool_calls.get_or_insert_with(Vec::new).push(call.clone());
        }

        let result = ToolResult::from_record(status, text.trim_end());
        let content =
            serde_json::to_string(&result).unwrap_or_else(|_| result.text().to_string());
        self.conversation
            .push(Message::tool_result(call.id, content));
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "**{}** ~ **{}**: {}",
            self.started_at,
            self.ended_at,
            self.last_summary_or_question()
        )
    }
}

// ─────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────

/// Frame a compaction note as the system message that restarts the
/// conversation.
pub fn frame_note(summary: &str, cjk: bool) -> String {
    if cjk {
        format!("前情提要：\n\n{}\n\n现在我们继续……", summary)
    } else {
        format!("Previously:\n\n{}\n\nNow we continue ...", summary)
    }
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

fn replayable_files(dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .flatten()
        .filter(|e| e.path().is_file())
        .filter_map(|e| e.file_name().into_string().ok())
        .filter(|name| {
            REPLAYED_ROLES
                .iter()
                .any(|role| name.ends_with(&format!(".{role}.md")))
        })
        .collect()
}

fn role_of(file_name: &str) -> &str {
    let segments: Vec<&str> = file_name.split('.').collect();
    if segments.len() >= 2 {
        segments[segments.len() - 2]
    } else {
        ""
    }
}

fn seq_of(file_name: &str) -> Option<u32> {
    file_name.split('.').nth(1)?.parse().ok()
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn log_creates_one_file_per_message() {
        let dir = tempdir().unwrap();
        let mut session = Session::new(dir.path());
        session.log_user("hello");
        session.log_assistant("hi there", vec![]);

        let files = replayable_files(&session.dir());
        assert_eq!(files.len(), 2);
        assert!(files.iter().any(|f| f.ends_with(".user.md")));
        assert!(files.iter().any(|f| f.ends_with(".assistant.md")));
        assert_eq!(session.conversation().len(), 2);
    }

    #[test]
    fn resume_reproduces_logged_order() {
        let dir = tempdir().unwrap();
        let started_at;
        {
            let mut session = Session::new(dir.path());
            started_at = session.started_at().to_string();
            session.log_system("be helpful");
            session.log_user("what is 2+2?");
            session.log_assistant("4", vec![]);
        }

        let resumed = Session::resume(dir.path(), &started_at);
        let roles: Vec<&str> = resumed
            .conversation()
            .iter()
            .map(|m| m.role_tag())
            .collect();
        assert_eq!(roles, vec!["system", "user", "assistant"]);
        assert_eq!(resumed.conversation()[2].text(), Some("4"));
    }

    #[test]
    fn resume_relinks_tool_calls_to_preceding_assistant() {
        let dir = tempdir().unwrap();
        let started_at;
        {
            let mut session = Session::new(dir.path());
            started_at = session.started_at().to_string();
            session.log_user("read a.txt");
            let call = CallRef::new("c1", "read_file", r#"{"path":"a.txt"}"#);
            session.log_assistant("", vec![call.clone()]);
            session.log_tool(&call, &ToolResult::success("file body"));
        }

        let resumed = Session::resume(dir.path(), &started_at);
        assert_eq!(resumed.conversation().len(), 3);

        match &resumed.conversation()[1] {
            Message::Assistant {
                tool_calls: Some(calls),
                ..
            } => {
                assert_eq!(calls.len(), 1);
                assert_eq!(calls[0].id, "c1");
                assert_eq!(calls[0].name(), "read_file");
                assert_eq!(calls[0].arguments(), r#"{"path":"a.txt"}"#);
            }
            other => panic!("expected assistant with calls, got {other:?}"),
        }
        match &resumed.conversation()[2] {
            Message::Tool {
                tool_call_id,
                content,
            } => {
                assert_eq!(tool_call_id, "c1");
                let result: ToolResult = serde_json::from_str(content).unwrap();
                assert_eq!(result.status, ToolStatus::Success);
                assert_eq!(result.payload.as_deref(), Some("file body"));
            }
            other => panic!("expected tool message, got {other:?}"),
        }
    }

    #[test]
    fn tool_record_survives_multiline_arguments() {
        let dir = tempdir().unwrap();
        let started_at;
        let args = "{\n  \"path\": \"a.txt\"\n}";
        {
            let mut session = Session::new(dir.path());
            started_at = session.started_at().to_string();
            session.log_user("go");
            let call = CallRef::new("c1", "read_file", args);
            session.log_assistant("", vec![call.clone()]);
            session.log_tool(&call, &ToolResult::success("ok"));
        }

        let resumed = Session::resume(dir.path(), &started_at);
        match &resumed.conversation()[1] {
            Message::Assistant {
                tool_calls: Some(calls),
                ..
            } => assert_eq!(calls[0].arguments(), args),
            other => panic!("expected assistant with calls, got {other:?}"),
        }
    }

    #[test]
    fn note_replaces_live_conversation_but_keeps_records() {
        let dir = tempdir().unwrap();
        let mut session = Session::new(dir.path());
        session.log_user("long conversation");
        session.log_assistant("lots of text", vec![]);
        session.log_note("we discussed files");

        assert_eq!(session.conversation().len(), 1);
        let note = session.conversation()[0].text().unwrap();
        assert!(note.starts_with("Previously:"));
        assert!(note.contains("we discussed files"));
        assert!(note.contains("Now we continue"));

        // Durable log keeps the pre-compaction records plus the note.
        let files = replayable_files(&session.dir());
        assert_eq!(files.len(), 3);
    }

    #[test]
    fn note_framing_follows_dominant_language() {
        let dir = tempdir().unwrap();
        let mut session = Session::new(dir.path());
        session.log_user("请帮我总结这个文件的内容好吗");
        session.log_assistant("当然可以，这个文件讲的是配置格式", vec![]);
        session.log_note("讨论了配置文件");

        let note = session.conversation()[0].text().unwrap();
        assert!(note.starts_with("前情提要"));
    }

    #[test]
    fn resume_replays_note_as_single_system_message() {
        let dir = tempdir().unwrap();
        let started_at;
        {
            let mut session = Session::new(dir.path());
            started_at = session.started_at().to_string();
            session.log_user("q1");
            session.log_assistant("a1", vec![]);
            session.log_note("summary of q1/a1");
            session.log_user("q2");
        }

        let resumed = Session::resume(dir.path(), &started_at);
        let roles: Vec<&str> = resumed
            .conversation()
            .iter()
            .map(|m| m.role_tag())
            .collect();
        assert_eq!(roles, vec!["system", "user"]);
        assert!(resumed.conversation()[0]
            .text()
            .unwrap()
            .contains("summary of q1/a1"));
    }

    #[test]
    fn resume_continues_sequence_numbering() {
        let dir = tempdir().unwrap();
        let started_at;
        {
            let mut session = Session::new(dir.path());
            started_at = session.started_at().to_string();
            session.log_user("one");
            session.log_assistant("two", vec![]);
        }

        let mut resumed = Session::resume(dir.path(), &started_at);
        resumed.log_user("three");

        let mut files = replayable_files(&resumed.dir());
        files.sort();
        assert_eq!(files.len(), 3);
        assert_eq!(seq_of(files.last().unwrap()), Some(2));
    }

    #[test]
    fn resume_missing_directory_yields_empty_session() {
        let dir = tempdir().unwrap();
        let session = Session::resume(dir.path(), "20200101_000000");
        assert!(session.conversation().is_empty());
        assert_eq!(session.started_at(), "20200101_000000");
    }

    #[test]
    fn summary_file_not_replayed_but_used_for_display() {
        let dir = tempdir().unwrap();
        let started_at;
        {
            let mut session = Session::new(dir.path());
            started_at = session.started_at().to_string();
            session.log_user("explain lifetimes");
            session.write_summary("rust lifetime basics");
        }

        let resumed = Session::resume(dir.path(), &started_at);
        assert_eq!(resumed.conversation().len(), 1);
        assert_eq!(resumed.last_summary_or_question(), "rust lifetime basics");
        assert!(format!("{resumed}").contains("rust lifetime basics"));
    }

    #[test]
    fn display_falls_back_to_first_question() {
        let dir = tempdir().unwrap();
        let mut session = Session::new(dir.path());
        session.log_system("sys");
        session.log_user("how do I sort a vec?");
        assert_eq!(
            session.last_summary_or_question(),
            "how do I sort a vec?"
        );
    }

    #[test]
    fn cjk_dominance_ignores_system_and_tool_messages() {
        let dir = tempdir().unwrap();
        let mut session = Session::new(dir.path());
        session.log_system("a very long english system prompt that would tip the scale");
        session.log_user("你好你好你好你好");
        assert!(session.is_cjk_dominant());
    }

    #[test]
    fn token_usage_round_trip() {
        let dir = tempdir().unwrap();
        let mut session = Session::new(dir.path());
        assert_eq!(session.token_usage(), 0);
        session.set_token_usage(1234);
        assert_eq!(session.token_usage(), 1234);
    }
}
