//! Filesystem tools — read, write, list directory.
//!
//! Each tool optionally restricts paths to an `allowed_dir`. `read_file`
//! pages through large files: without an explicit range it answers with a
//! partial-status hint instead of flooding the context window.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{json, Value};

use colloquy_core::types::ToolResult;

use super::base::{optional_usize, require_string, Tool};

/// Lines returned per read when the caller doesn't give a limit.
const DEFAULT_READ_LIMIT: usize = 400;

// ─────────────────────────────────────────────
// Shared path helper
// ─────────────────────────────────────────────

/// Resolve a user-supplied path, optionally restricting it to `allowed_dir`.
///
/// Returns `Err` if the resolved path is outside the allowed directory.
fn resolve_path(path: &str, allowed_dir: Option<&Path>) -> anyhow::Result<PathBuf> {
    let expanded = colloquy_core::utils::expand_home(path);

    // Canonicalize if the path exists, otherwise canonicalize the parent so
    // writes to new files still resolve.
    let resolved = if expanded.exists() {
        expanded.canonicalize().unwrap_or(expanded)
    } else if let Some(parent) = expanded.parent() {
        if parent.exists() {
            let canon_parent = parent
                .canonicalize()
                .unwrap_or_else(|_| parent.to_path_buf());
            match expanded.file_name() {
                Some(name) => canon_parent.join(name),
                None => expanded,
            }
        } else {
            expanded
        }
    } else {
        expanded
    };

    if let Some(allowed) = allowed_dir {
        let allowed_canon = if allowed.exists() {
            allowed
                .canonicalize()
                .unwrap_or_else(|_| allowed.to_path_buf())
        } else {
            allowed.to_path_buf()
        };
        if !resolved.starts_with(&allowed_canon) {
            anyhow::bail!(
                "Access denied: path '{}' is outside allowed directory '{}'",
                resolved.display(),
                allowed_canon.display()
            );
        }
    }

    Ok(resolved)
}

// ─────────────────────────────────────────────
// ReadFileTool
// ─────────────────────────────────────────────

/// Reads a file, whole or by line range.
pub struct ReadFileTool {
    allowed_dir: Option<PathBuf>,
}

impl ReadFileTool {
    pub fn new(allowed_dir: Option<PathBuf>) -> Self {
        Self { allowed_dir }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a file. Large files are paged: pass offset \
         (0-based line) and limit to read a specific range."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Absolute or relative path to the file to read"
                },
                "offset": {
                    "type": "integer",
                    "description": "First line to return, 0-based"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of lines to return"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, params: HashMap<String, Value>) -> anyhow::Result<ToolResult> {
        let path_str = require_string(&params, "path")?;
        let offset = optional_usize(&params, "offset");
        let limit = optional_usize(&params, "limit");
        let path = resolve_path(&path_str, self.allowed_dir.as_deref())?;

        if !path.exists() {
            anyhow::bail!("File not found: {}", path.display());
        }
        if !path.is_file() {
            anyhow::bail!("Not a file: {}", path.display());
        }

        let content = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {e}", path.display()))?;

        let lines: Vec<&str> = content.lines().collect();
        let explicit_range = offset.is_some() || limit.is_some();
        let start = offset.unwrap_or(0);
        let count = limit.unwrap_or(DEFAULT_READ_LIMIT);

        if start >= lines.len() && !lines.is_empty() {
            anyhow::bail!(
                "Offset {start} is past the end of {} ({} lines)",
                path.display(),
                lines.len()
            );
        }

        // A big file with no requested range gets a paging hint instead of a
        // truncated payload the model can't detect.
        if !explicit_range && lines.len() > DEFAULT_READ_LIMIT {
            return Ok(ToolResult::partial(format!(
                "{} has {} lines; read it in ranges, e.g. offset=0, limit={}",
                path.display(),
                lines.len(),
                DEFAULT_READ_LIMIT
            )));
        }

        let end = (start + count).min(lines.len());
        Ok(ToolResult::success(lines[start..end].join("\n")))
    }
}

// ─────────────────────────────────────────────
// WriteFileTool
// ─────────────────────────────────────────────

/// Creates or overwrites a file with the given content.
pub struct WriteFileTool {
    allowed_dir: Option<PathBuf>,
}

impl WriteFileTool {
    pub fn new(allowed_dir: Option<PathBuf>) -> Self {
        Self { allowed_dir }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file, creating it if it doesn't exist or overwriting if it does. \
         Parent directories are created automatically."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Absolute or relative path for the file"
                },
                "content": {
                    "type": "string",
                    "description": "Content to write to the file"
                }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, params: HashMap<String, Value>) -> anyhow::Result<ToolResult> {
        let path_str = require_string(&params, "path")?;
        let content = require_string(&params, "content")?;
        let path = resolve_path(&path_str, self.allowed_dir.as_deref())?;

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    anyhow::anyhow!("Failed to create directory {}: {e}", parent.display())
                })?;
            }
        }

        let bytes = content.len();
        std::fs::write(&path, &content)
            .map_err(|e| anyhow::anyhow!("Failed to write {}: {e}", path.display()))?;
        Ok(ToolResult::success(format!(
            "Wrote {bytes} bytes to {}",
            path.display()
        )))
    }
}

// ─────────────────────────────────────────────
// ListDirTool
// ─────────────────────────────────────────────

/// Lists directory entries, one per line, directories marked with `/`.
pub struct ListDirTool {
    allowed_dir: Option<PathBuf>,
}

impl ListDirTool {
    pub fn new(allowed_dir: Option<PathBuf>) -> Self {
        Self { allowed_dir }
    }
}

#[async_trait]
impl Tool for ListDirTool {
    fn name(&self) -> &str {
        "list_dir"
    }

    fn description(&self) -> &str {
        "List the entries of a directory. Directories are suffixed with '/'."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory to list"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, params: HashMap<String, Value>) -> anyhow::Result<ToolResult> {
        let path_str = require_string(&params, "path")?;
        let path = resolve_path(&path_str, self.allowed_dir.as_deref())?;

        if !path.is_dir() {
            anyhow::bail!("Not a directory: {}", path.display());
        }

        let mut entries: Vec<String> = std::fs::read_dir(&path)
            .map_err(|e| anyhow::anyhow!("Failed to list {}: {e}", path.display()))?
            .flatten()
            .map(|entry| {
                let name = entry.file_name().to_string_lossy().into_owned();
                if entry.path().is_dir() {
                    format!("{name}/")
                } else {
                    name
                }
            })
            .collect();
        entries.sort();

        if entries.is_empty() {
            Ok(ToolResult::success("(empty directory)"))
        } else {
            Ok(ToolResult::success(entries.join("\n")))
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use colloquy_core::types::ToolStatus;
    use tempfile::tempdir;

    fn params(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn read_small_file_whole() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, "line one\nline two").unwrap();

        let tool = ReadFileTool::new(None);
        let result = tool
            .execute(params(&[("path", json!(file.to_str().unwrap()))]))
            .await
            .unwrap();

        assert_eq!(result.status, ToolStatus::Success);
        assert_eq!(result.payload.as_deref(), Some("line one\nline two"));
    }

    #[tokio::test]
    async fn read_large_file_without_range_is_partial() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("big.txt");
        let body: String = (0..500).map(|i| format!("line {i}\n")).collect();
        std::fs::write(&file, body).unwrap();

        let tool = ReadFileTool::new(None);
        let result = tool
            .execute(params(&[("path", json!(file.to_str().unwrap()))]))
            .await
            .unwrap();

        assert_eq!(result.status, ToolStatus::Partial);
        let hint = result.next_step_hint.unwrap();
        assert!(hint.contains("500 lines"));
        assert!(hint.contains("offset"));
    }

    #[tokio::test]
    async fn read_with_range_returns_slice() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("big.txt");
        let body: String = (0..500).map(|i| format!("line {i}\n")).collect();
        std::fs::write(&file, body).unwrap();

        let tool = ReadFileTool::new(None);
        let result = tool
            .execute(params(&[
                ("path", json!(file.to_str().unwrap())),
                ("offset", json!(10)),
                ("limit", json!(2)),
            ]))
            .await
            .unwrap();

        assert_eq!(result.status, ToolStatus::Success);
        assert_eq!(result.payload.as_deref(), Some("line 10\nline 11"));
    }

    #[tokio::test]
    async fn read_offset_past_end_errors() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, "one\ntwo").unwrap();

        let tool = ReadFileTool::new(None);
        let err = tool
            .execute(params(&[
                ("path", json!(file.to_str().unwrap())),
                ("offset", json!(10)),
            ]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("past the end"));
    }

    #[tokio::test]
    async fn read_missing_file_errors() {
        let tool = ReadFileTool::new(None);
        let err = tool
            .execute(params(&[("path", json!("/definitely/not/here.txt"))]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn write_creates_parents_and_reports_bytes() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("nested/out.txt");

        let tool = WriteFileTool::new(None);
        let result = tool
            .execute(params(&[
                ("path", json!(file.to_str().unwrap())),
                ("content", json!("hello")),
            ]))
            .await
            .unwrap();

        assert_eq!(result.status, ToolStatus::Success);
        assert!(result.payload.unwrap().contains("5 bytes"));
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "hello");
    }

    #[tokio::test]
    async fn list_dir_marks_directories() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "x").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        let tool = ListDirTool::new(None);
        let result = tool
            .execute(params(&[("path", json!(dir.path().to_str().unwrap()))]))
            .await
            .unwrap();

        assert_eq!(result.payload.as_deref(), Some("b.txt\nsub/"));
    }

    #[tokio::test]
    async fn allowed_dir_blocks_escapes() {
        let dir = tempdir().unwrap();
        let jail = dir.path().join("jail");
        std::fs::create_dir(&jail).unwrap();
        std::fs::write(dir.path().join("secret.txt"), "s").unwrap();

        let tool = ReadFileTool::new(Some(jail));
        let escape = dir.path().join("secret.txt");
        let err = tool
            .execute(params(&[("path", json!(escape.to_str().unwrap()))]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Access denied"));
    }

    #[tokio::test]
    async fn allowed_dir_permits_inside_writes() {
        let dir = tempdir().unwrap();
        let tool = WriteFileTool::new(Some(dir.path().to_path_buf()));
        let file = dir.path().join("ok.txt");

        let result = tool
            .execute(params(&[
                ("path", json!(file.to_str().unwrap())),
                ("content", json!("fine")),
            ]))
            .await
            .unwrap();
        assert_eq!(result.status, ToolStatus::Success);
    }
}
