//! Python tool - run a snippet with `python3 -c` inside the workspace

use crate::registry::{Tool, ToolResult};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

const MAX_OUTPUT_CHARS: usize = 30_000;

pub struct RunPythonTool {
    workspace_root: PathBuf,
    interpreter: String,
    default_timeout_secs: u64,
}

impl RunPythonTool {
    pub fn new(workspace_root: impl AsRef<Path>) -> Self {
        Self {
            workspace_root: workspace_root.as_ref().to_path_buf(),
            interpreter: "python3".to_string(),
            default_timeout_secs: 60,
        }
    }

    /// Use a different interpreter binary, e.g. a virtualenv's python.
    pub fn with_interpreter(mut self, interpreter: impl Into<String>) -> Self {
        self.interpreter = interpreter.into();
        self
    }
}

#[async_trait::async_trait]
impl Tool for RunPythonTool {
    fn name(&self) -> &str { "run_python" }

    fn description(&self) -> &str {
        "Execute a Python 3 snippet and return what it prints. \
         Captures stdout and stderr. Set timeout in seconds (default 60)."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "code": {
                    "type": "string",
                    "description": "Python source to execute; print the values you need"
                },
                "timeout": {
                    "type": "integer",
                    "description": "Timeout in seconds (default 60, max 600)"
                }
            },
            "required": ["code"]
        })
    }

    async fn execute(&self, args: Value) -> ToolResult {
        let code = match args["code"].as_str() {
            Some(c) => c,
            None => return ToolResult::error("Missing required parameter: code"),
        };

        let timeout_secs = args["timeout"].as_u64()
            .unwrap_or(self.default_timeout_secs)
            .min(600);

        debug!("run_python: {}", code.chars().take(80).collect::<String>());

        let output = match tokio::time::timeout(
            Duration::from_secs(timeout_secs),
            Command::new(&self.interpreter)
                .arg("-c")
                .arg(code)
                .current_dir(&self.workspace_root)
                .kill_on_drop(true)
                .output()
        ).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return ToolResult::error(format!("Failed to execute: {}", e)),
            Err(_) => return ToolResult::error(format!("Code timed out after {}s", timeout_secs)),
        };

        format_output(&output)
    }
}

fn format_output(output: &std::process::Output) -> ToolResult {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    if !output.status.success() {
        return ToolResult::error(format!(
            "Exit code: {}\n{}\n{}",
            output.status.code().unwrap_or(-1),
            stdout.trim(),
            stderr.trim()
        ));
    }

    let result = if stderr.trim().is_empty() {
        stdout.trim().to_string()
    } else {
        format!("{}\n{}", stdout.trim(), stderr.trim())
    };

    if result.is_empty() {
        ToolResult::text("(no output)")
    } else if result.chars().count() > MAX_OUTPUT_CHARS {
        let total = result.chars().count();
        let head: String = result.chars().take(MAX_OUTPUT_CHARS).collect();
        ToolResult::text(format!("{}\n... [truncated, {} total chars]", head, total))
    } else {
        ToolResult::text(result)
    }
}
