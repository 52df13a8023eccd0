//! Puppeteer Tools - external tools behind tool actions
//!
//! Each tool is a self-contained file in src/tools/ implementing the Tool
//! trait. A tool action named `run_python` is served by the tool registered
//! under the same name.

pub mod registry;
pub mod tools;

pub use registry::{Tool, ToolRegistry, ToolResult, ToolSpec};

use std::path::Path;

/// Create the default tool registry with all builtin tools.
pub fn create_default_registry(workspace_root: impl AsRef<Path>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    let root = workspace_root.as_ref();

    registry.register(tools::read::ReadFileTool::new(root));
    registry.register(tools::python::RunPythonTool::new(root));

    registry
}
