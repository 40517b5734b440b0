//! Session history — listing of stored sessions, newest last.

use std::path::Path;

use tracing::warn;

use super::store::Session;
use crate::utils;

/// Load every stored session under `root`, sorted by last activity.
pub fn list_sessions(root: &Path) -> Vec<Session> {
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Failed to read sessions directory {}: {}", root.display(), e);
            return Vec::new();
        }
    };

    let mut sessions: Vec<Session> = entries
        .flatten()
        .filter(|e| e.path().is_dir())
        .filter_map(|e| e.file_name().into_string().ok())
        .filter(|name| utils::is_session_stamp(name))
        .map(|name| Session::resume(root, &name))
        .collect();

    sessions.sort_by(|a, b| a.ended_at().cmp(b.ended_at()));
    sessions
}

/// Numbered markdown listing of stored sessions, one line each.
pub fn history_listing(root: &Path) -> String {
    let sessions = list_sessions(root);
    if sessions.is_empty() {
        return "No history found.".to_string();
    }
    sessions
        .iter()
        .enumerate()
        .map(|(i, s)| format!("{}. {}", i + 1, s))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Resolve a 1-based history listing position to a session id.
pub fn session_id_at(root: &Path, index: usize) -> Option<String> {
    let sessions = list_sessions(root);
    if index == 0 || index > sessions.len() {
        return None;
    }
    Some(sessions[index - 1].started_at().to_string())
}
