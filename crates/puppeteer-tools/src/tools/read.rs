//! Dataset reader - a window of lines from a file under the tools workspace
//!
//! Paths resolve against the workspace root and must stay inside it after
//! symlinks and `..` are resolved. The result is structured so an agent's
//! step payload can carry it as JSON.

use crate::registry::{Tool, ToolResult};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

const DEFAULT_LIMIT: usize = 200;
const MAX_LIMIT: usize = 2000;

pub struct ReadFileTool {
    workspace_root: PathBuf,
}

impl ReadFileTool {
    pub fn new(workspace_root: impl AsRef<Path>) -> Self {
        Self {
            workspace_root: workspace_root.as_ref().to_path_buf(),
        }
    }

    /// Canonical path of `requested` and its workspace-relative form.
    async fn confine(&self, requested: &str) -> Result<(PathBuf, String), String> {
        let root = fs::canonicalize(&self.workspace_root).await.map_err(|e| {
            format!("workspace {} unavailable: {}", self.workspace_root.display(), e)
        })?;
        let resolved = fs::canonicalize(root.join(requested))
            .await
            .map_err(|e| format!("cannot open {}: {}", requested, e))?;
        match resolved.strip_prefix(&root) {
            Ok(relative) => {
                let relative = relative.to_string_lossy().into_owned();
                Ok((resolved, relative))
            }
            Err(_) => Err(format!("{} is outside the workspace", requested)),
        }
    }
}

#[async_trait::async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read a window of lines from a dataset file in the workspace (CSV, JSON Lines, text)."
    }

    fn is_read_only(&self) -> bool {
        true
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Path relative to the workspace"
                },
                "offset": {
                    "type": "integer",
                    "description": "First line to return (1-indexed)"
                },
                "limit": {
                    "type": "integer",
                    "description": format!(
                        "Lines to return (default {}, max {})",
                        DEFAULT_LIMIT, MAX_LIMIT
                    )
                }
            },
            "required": ["file_path"]
        })
    }

    async fn execute(&self, args: Value) -> ToolResult {
        let Some(requested) = args
            .get("file_path")
            .or(args.get("path"))
            .and_then(Value::as_str)
        else {
            return ToolResult::error("Missing required parameter: file_path");
        };

        let (resolved, relative) = match self.confine(requested).await {
            Ok(found) => found,
            Err(e) => return ToolResult::error(e),
        };
        if !fs::metadata(&resolved).await.map(|m| m.is_file()).unwrap_or(false) {
            return ToolResult::error(format!("{} is not a file", relative));
        }
        let content = match fs::read(&resolved).await {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => return ToolResult::error(format!("cannot read {}: {}", relative, e)),
        };

        let offset = args["offset"].as_u64().map_or(1, |n| n.max(1) as usize);
        let limit = args["limit"]
            .as_u64()
            .map_or(DEFAULT_LIMIT, |n| (n as usize).clamp(1, MAX_LIMIT));

        let total = content.lines().count();
        let lines: Vec<&str> = content.lines().skip(offset - 1).take(limit).collect();
        let end = offset - 1 + lines.len();

        debug!(file = %relative, offset, returned = lines.len(), total, "read_file");
        ToolResult::Json(json!({
            "path": relative,
            "total_lines": total,
            "start_line": offset,
            "lines": lines,
            "truncated": end < total,
        }))
    }
}
