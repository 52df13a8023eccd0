//! Tests for puppeteer-tools: registry dispatch and builtin tools

use puppeteer_tools::*;
use serde_json::json;

struct EchoTool;

#[async_trait::async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str { "echo" }
    fn description(&self) -> &str { "echo the input" }
    fn input_schema(&self) -> serde_json::Value { json!({"type": "object"}) }
    async fn execute(&self, args: serde_json::Value) -> ToolResult {
        ToolResult::Json(args)
    }
}

#[tokio::test]
async fn registry_dispatches_by_name() {
    let mut registry = ToolRegistry::new();
    registry.register(EchoTool);
    assert!(registry.contains("echo"));
    let result = registry.execute("echo", json!({"x": 1})).await;
    assert!(!result.is_error());
    assert!(result.to_content_string().contains("\"x\": 1"));
}

#[tokio::test]
async fn registry_unknown_tool_is_error() {
    let registry = ToolRegistry::new();
    let result = registry.execute("nope", json!({})).await;
    assert!(result.is_error());
    assert_eq!(result.to_content_string(), "Error: Tool not found: nope");
}

#[test]
fn default_registry_lists_builtin_tools() {
    let dir = tempfile::tempdir().unwrap();
    let registry = create_default_registry(dir.path());
    assert_eq!(registry.list(), vec!["read_file", "run_python"]);
    assert_eq!(registry.list_read_only(), vec!["read_file"]);
    let spec = registry.spec("run_python").unwrap();
    assert_eq!(spec.input_schema["required"][0], "code");
}

#[tokio::test]
async fn read_file_returns_line_window() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("data")).unwrap();
    std::fs::write(dir.path().join("data/stars.csv"), "repo,stars\na,1\nb,2\n").unwrap();
    let registry = create_default_registry(dir.path());

    let all = registry.execute("read_file", json!({"file_path": "data/stars.csv"})).await;
    let ToolResult::Json(all) = all else { panic!("expected json, got {:?}", all) };
    assert_eq!(all["path"], "data/stars.csv");
    assert_eq!(all["total_lines"], 3);
    assert_eq!(all["start_line"], 1);
    assert_eq!(all["lines"], json!(["repo,stars", "a,1", "b,2"]));
    assert_eq!(all["truncated"], false);

    let window = registry
        .execute("read_file", json!({"path": "data/../data/stars.csv", "offset": 2, "limit": 1}))
        .await;
    let ToolResult::Json(window) = window else { panic!("expected json, got {:?}", window) };
    assert_eq!(window["path"], "data/stars.csv");
    assert_eq!(window["start_line"], 2);
    assert_eq!(window["lines"], json!(["a,1"]));
    assert_eq!(window["truncated"], true);
}

#[tokio::test]
async fn read_file_stays_inside_workspace() {
    let dir = tempfile::tempdir().unwrap();
    let workspace = dir.path().join("workspace");
    std::fs::create_dir(&workspace).unwrap();
    std::fs::write(dir.path().join("secret.txt"), "token").unwrap();
    let registry = create_default_registry(&workspace);

    let escaped = registry.execute("read_file", json!({"file_path": "../secret.txt"})).await;
    assert!(escaped.is_error());
    assert!(escaped.to_content_string().contains("outside the workspace"));

    let absolute = dir.path().join("secret.txt").to_string_lossy().into_owned();
    let escaped = registry.execute("read_file", json!({"file_path": absolute})).await;
    assert!(escaped.to_content_string().contains("outside the workspace"));

    let directory = registry.execute("read_file", json!({"file_path": "."})).await;
    assert!(directory.to_content_string().contains("is not a file"));
}

#[tokio::test]
async fn read_file_missing_argument_and_file() {
    let dir = tempfile::tempdir().unwrap();
    let registry = create_default_registry(dir.path());
    assert!(registry.execute("read_file", json!({})).await.is_error());
    let absent = registry.execute("read_file", json!({"file_path": "absent.txt"})).await;
    assert!(absent.to_content_string().contains("cannot open absent.txt"));
}

#[tokio::test]
async fn run_python_requires_code() {
    let dir = tempfile::tempdir().unwrap();
    let registry = create_default_registry(dir.path());
    let result = registry.execute("run_python", json!({"script": "print(1)"})).await;
    assert!(result.is_error());
    assert!(result.to_content_string().contains("code"));
}

#[tokio::test]
async fn run_python_missing_interpreter_is_error() {
    let dir = tempfile::tempdir().unwrap();
    let tool = tools::python::RunPythonTool::new(dir.path())
        .with_interpreter("definitely-not-a-python-binary");
    let result = tool.execute(json!({"code": "print(1)"})).await;
    assert!(result.is_error());
    assert!(result.to_content_string().contains("Failed to execute"));
}
