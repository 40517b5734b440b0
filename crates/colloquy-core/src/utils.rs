//! Utility helpers — path resolution, timestamps, token estimation.

use std::path::PathBuf;

/// Get the Colloquy data directory (e.g. `~/.colloquy/`).
pub fn get_data_path() -> PathBuf {
    let home = home_dir().unwrap_or_else(|| PathBuf::from("."));
    home.join(".colloquy")
}

/// Get the sessions directory (e.g. `~/.colloquy/sessions/`).
pub fn get_sessions_path() -> PathBuf {
    get_data_path().join("sessions")
}

/// Get the default workspace path (e.g. `~/.colloquy/workspace/`).
pub fn get_default_workspace_path() -> PathBuf {
    get_data_path().join("workspace")
}

/// Current local time as a sortable session/record stamp, `YYYYMMDD_HHMMSS`.
pub fn now_stamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Whether a directory name looks like a session stamp.
pub fn is_session_stamp(name: &str) -> bool {
    chrono::NaiveDateTime::parse_from_str(name, "%Y%m%d_%H%M%S").is_ok()
}

/// Truncate a string to `max_len` characters, adding "..." if truncated.
/// Unicode-safe.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

/// Expand `~` to the home directory in a path string.
pub fn expand_home(path: &str) -> PathBuf {
    if path.starts_with("~/") || path == "~" {
        let home = home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(path.get(2..).unwrap_or(""))
    } else {
        PathBuf::from(path)
    }
}

/// Whether a char falls in the CJK unified ideograph range.
pub fn is_cjk(c: char) -> bool {
    ('\u{4e00}'..='\u{9fff}').contains(&c)
}

/// Fraction of CJK characters in a text, as (cjk, total) counts.
pub fn cjk_counts(text: &str) -> (usize, usize) {
    let mut cjk = 0;
    let mut total = 0;
    for c in text.chars() {
        total += 1;
        if is_cjk(c) {
            cjk += 1;
        }
    }
    (cjk, total)
}

/// Heuristic token estimate for mixed CJK/Latin text.
///
/// CJK chars count 0.6 tokens, everything else 0.3.
pub fn estimate_tokens(text: &str) -> u32 {
    let (cjk, total) = cjk_counts(text);
    let other = total - cjk;
    (cjk as f64 * 0.6 + other as f64 * 0.3) as u32
}

/// Helper to get home directory.
fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(PathBuf::from)
        .or_else(|| std::env::var("USERPROFILE").ok().map(PathBuf::from))
}
