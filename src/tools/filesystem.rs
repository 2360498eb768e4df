//! Filesystem tools for ChipClaw
//!
//! `read_file`, `write_file` and `list_dir`, all confined to the workspace in
//! the tool context. Relative paths resolve against the workspace; absolute
//! paths are accepted only when they already point inside it.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::{Component, Path, PathBuf};

use crate::error::{ChipClawError, Result};
use crate::utils::string::truncate_string;

use super::{Tool, ToolContext};

/// Largest file body returned by `read_file`, in characters.
pub const MAX_READ_CHARS: usize = 10 * 1024;

/// Resolve `path` against the workspace and refuse anything that escapes it.
///
/// Resolution is lexical: `.` and `..` are folded without touching the disk,
/// so a path to a file that does not exist yet can still be checked.
fn resolve_path(path: &str, ctx: &ToolContext) -> Result<PathBuf> {
    let workspace = ctx.workspace.as_deref().ok_or_else(|| {
        ChipClawError::SecurityViolation(
            "Workspace not configured; filesystem tools require a workspace".to_string(),
        )
    })?;
    let root = normalize(Path::new(workspace));
    let requested = Path::new(path);
    let full = if requested.is_absolute() {
        normalize(requested)
    } else {
        normalize(&root.join(requested))
    };

    if !full.starts_with(&root) {
        return Err(ChipClawError::SecurityViolation(format!(
            "Access denied: '{}' is outside the workspace {}",
            path, workspace
        )));
    }
    Ok(full)
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str> {
    args.get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| ChipClawError::Tool(format!("Missing '{}' argument", key)))
}

/// Tool for reading file contents.
pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read contents of a file"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path to read"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String> {
        let path = required_str(&args, "path")?;
        let full_path = resolve_path(path, ctx)?;

        let content = tokio::fs::read_to_string(&full_path).await.map_err(|e| {
            ChipClawError::Tool(format!(
                "Failed to read file '{}': {}",
                full_path.display(),
                e
            ))
        })?;
        Ok(truncate_string(&content, MAX_READ_CHARS))
    }
}

/// Tool for writing file contents, creating parent directories as needed.
pub struct WriteFileTool;

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write contents to a file (creates parent directories if needed)"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path to write"
                },
                "content": {
                    "type": "string",
                    "description": "Content to write"
                }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String> {
        let path = required_str(&args, "path")?;
        let content = required_str(&args, "content")?;
        let full_path = resolve_path(path, ctx)?;

        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                ChipClawError::Tool(format!("Failed to create parent directories: {}", e))
            })?;
        }

        tokio::fs::write(&full_path, content).await.map_err(|e| {
            ChipClawError::Tool(format!(
                "Failed to write file '{}': {}",
                full_path.display(),
                e
            ))
        })?;

        Ok(format!(
            "Successfully wrote {} bytes to {}",
            content.len(),
            full_path.display()
        ))
    }
}

/// Tool for listing a directory.
pub struct ListDirTool;

#[async_trait]
impl Tool for ListDirTool {
    fn name(&self) -> &str {
        "list_dir"
    }

    fn description(&self) -> &str {
        "List contents of a directory"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory path to list (default: workspace root)"
                }
            }
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String> {
        let path = args.get("path").and_then(|v| v.as_str()).unwrap_or(".");
        let full_path = resolve_path(path, ctx)?;

        let mut entries = tokio::fs::read_dir(&full_path).await.map_err(|e| {
            ChipClawError::Tool(format!(
                "Failed to read directory '{}': {}",
                full_path.display(),
                e
            ))
        })?;

        let mut items = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ChipClawError::Tool(format!("Failed to read directory entry: {}", e)))?
        {
            let name = entry.file_name().to_string_lossy().to_string();
            let line = match entry.metadata().await {
                Ok(meta) if meta.is_dir() => format!("  {}/", name),
                Ok(meta) => format!("  {} ({} bytes)", name, meta.len()),
                Err(_) => format!("  {}", name),
            };
            items.push(line);
        }
        items.sort();

        let mut lines = vec![format!("Contents of {}:", full_path.display())];
        lines.extend(items);
        Ok(lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn ctx_for(dir: &Path) -> ToolContext {
        ToolContext::new().with_workspace(dir.to_str().unwrap())
    }

    #[tokio::test]
    async fn test_read_file_relative_to_workspace() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("notes.txt"), "sensor calibrated").unwrap();

        let result = ReadFileTool
            .execute(json!({"path": "notes.txt"}), &ctx_for(dir.path()))
            .await
            .unwrap();
        assert_eq!(result, "sensor calibrated");
    }

    #[tokio::test]
    async fn test_read_file_truncates_large_files() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("big.log"), "x".repeat(MAX_READ_CHARS + 10)).unwrap();

        let result = ReadFileTool
            .execute(json!({"path": "big.log"}), &ctx_for(dir.path()))
            .await
            .unwrap();
        assert!(result.ends_with("...(truncated)"));
    }

    #[tokio::test]
    async fn test_read_file_not_found() {
        let dir = tempdir().unwrap();
        let err = ReadFileTool
            .execute(json!({"path": "missing.txt"}), &ctx_for(dir.path()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to read file"));
    }

    #[tokio::test]
    async fn test_rejects_escape_from_workspace() {
        let dir = tempdir().unwrap();
        let err = ReadFileTool
            .execute(json!({"path": "../../etc/passwd"}), &ctx_for(dir.path()))
            .await
            .unwrap_err();
        assert!(matches!(err, ChipClawError::SecurityViolation(_)));

        let err = WriteFileTool
            .execute(
                json!({"path": "/etc/chipclaw.txt", "content": "x"}),
                &ctx_for(dir.path()),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ChipClawError::SecurityViolation(_)));
    }

    #[tokio::test]
    async fn test_requires_workspace() {
        let err = ReadFileTool
            .execute(json!({"path": "a.txt"}), &ToolContext::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ChipClawError::SecurityViolation(_)));
    }

    #[tokio::test]
    async fn test_write_file_creates_parents() {
        let dir = tempdir().unwrap();
        let result = WriteFileTool
            .execute(
                json!({"path": "logs/today/readings.txt", "content": "21.5C"}),
                &ctx_for(dir.path()),
            )
            .await
            .unwrap();
        assert!(result.starts_with("Successfully wrote 5 bytes"));
        assert_eq!(
            fs::read_to_string(dir.path().join("logs/today/readings.txt")).unwrap(),
            "21.5C"
        );
    }

    #[tokio::test]
    async fn test_list_dir_marks_directories_and_sizes() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("memory")).unwrap();
        fs::write(dir.path().join("AGENTS.md"), "abc").unwrap();

        let result = ListDirTool
            .execute(json!({}), &ctx_for(dir.path()))
            .await
            .unwrap();
        let lines: Vec<&str> = result.lines().collect();
        assert!(lines[0].starts_with("Contents of "));
        assert_eq!(lines[1], "  AGENTS.md (3 bytes)");
        assert_eq!(lines[2], "  memory/");
    }

    #[tokio::test]
    async fn test_missing_path_argument() {
        let dir = tempdir().unwrap();
        let err = ReadFileTool
            .execute(json!({}), &ctx_for(dir.path()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Missing 'path'"));
    }
}
