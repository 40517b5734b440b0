//! Shared CLI helpers — streaming console output, banners, replay printing.

use std::io::Write;

use colored::Colorize;

use colloquy_agent::TurnObserver;
use colloquy_core::types::{CallRef, Message, ToolResult};

// ─────────────────────────────────────────────
// Console observer
// ─────────────────────────────────────────────

/// Prints the turn to the terminal as it streams: content verbatim, tool
/// activity and compaction notes dimmed.
pub struct ConsoleObserver {
    printed_content: bool,
}

impl ConsoleObserver {
    pub fn new() -> Self {
        Self {
            printed_content: false,
        }
    }
}

impl Default for ConsoleObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl TurnObserver for ConsoleObserver {
    fn on_content(&mut self, delta: &str) {
        print!("{delta}");
        let _ = std::io::stdout().flush();
        self.printed_content = true;
    }

    fn on_tool_call(&mut self, call: &CallRef) {
        if self.printed_content {
            println!();
            self.printed_content = false;
        }
        println!("{}", format!("{} ...", call.display()).bright_black());
    }

    fn on_tool_result(&mut self, call: &CallRef, result: &ToolResult) {
        println!(
            "{}",
            format!("{} -> {}", call.name(), result.status.as_str()).bright_black()
        );
    }

    fn on_note(&mut self, _summary: &str) {
        if self.printed_content {
            println!();
            self.printed_content = false;
        }
        println!(
            "{}",
            "<<< note taken, conversation compacted".bright_black()
        );
    }
}

// ─────────────────────────────────────────────
// Printing
// ─────────────────────────────────────────────

/// Print an error line in red.
pub fn print_error(text: &str) {
    eprintln!("{}", text.red());
}

/// Print the banner shown at REPL start.
pub fn print_banner() {
    let version = env!("CARGO_PKG_VERSION");
    println!();
    println!("{}  v{}", "Colloquy".cyan().bold(), version.dimmed());
    println!(
        "{}",
        "Type a message, /help for commands, or /quit to leave.".dimmed()
    );
    println!();
}

/// Print a resumed conversation so the user sees where they left off.
pub fn print_replay(messages: &[Message]) {
    for message in messages {
        match message {
            Message::System { content } => {
                println!("{}", content.bright_black());
            }
            Message::User { content } => {
                println!("{}", format!(">>> {content}").green());
            }
            Message::Assistant {
                content,
                tool_calls,
            } => {
                if let Some(text) = content {
                    println!("{text}");
                }
                for call in tool_calls.iter().flatten() {
                    println!("{}", format!("{} ...", call.display()).bright_black());
                }
            }
            Message::Tool { .. } => {
                // Tool payloads are noise on replay; the call lines above
                // already show what ran.
            }
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use colloquy_core::types::CallRef;

    #[test]
    fn observer_tracks_content_state() {
        let mut observer = ConsoleObserver::new();
        assert!(!observer.printed_content);
        observer.on_content("hello");
        assert!(observer.printed_content);
        observer.on_tool_call(&CallRef::new("c1", "read_file", "{}"));
        assert!(!observer.printed_content);
    }

    #[test]
    fn replay_accepts_all_roles() {
        // Smoke test: replay printing must not panic on any message shape.
        let messages = vec![
            Message::system("sys"),
            Message::user("hi"),
            Message::assistant_with_calls(
                Some("reading".into()),
                vec![CallRef::new("c1", "read_file", "{}")],
            ),
            Message::tool_result("c1", "{\"status\":\"success\"}"),
        ];
        print_replay(&messages);
    }
}
