// IDE Agent Gateway - Tool Catalog
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// The closed set of tools the agent may call: typed arguments, the JSON
// schemas advertised to the model, and the text form of a tool result.

use crate::error::ToolError;
use crate::search_replace::ReplaceOptions;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const TOOL_NAMES: &[&str] = &[
    "read_file",
    "edit_file",
    "search_replace",
    "run_terminal_cmd",
    "list_directory",
    "search_files",
    "delete_file",
    "grep_search",
    "exit_tool",
];

/// One parsed tool invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", content = "arguments", rename_all = "snake_case")]
pub enum ToolCall {
    ReadFile {
        file_path: String,
        start_line: Option<i64>,
        end_line: Option<i64>,
    },
    EditFile {
        target_file_path: String,
        code_snippet: String,
    },
    SearchReplace {
        query: String,
        replacement: String,
        #[serde(default)]
        options: Option<ReplaceOptions>,
    },
    RunTerminalCmd {
        cmd: String,
        #[serde(default)]
        is_background: Option<bool>,
    },
    ListDirectory {
        #[serde(default)]
        dir_path: Option<String>,
        #[serde(default)]
        recursive: Option<bool>,
    },
    SearchFiles {
        pattern: String,
    },
    DeleteFile {
        path: String,
    },
    GrepSearch {
        query: String,
        #[serde(default)]
        case_sensitive: Option<bool>,
        #[serde(default)]
        include_pattern: Option<String>,
        #[serde(default)]
        exclude_pattern: Option<String>,
    },
    ExitTool {
        summary: String,
    },
}

impl ToolCall {
    /// Parse a model-proposed invocation. Unknown names and malformed
    /// arguments are rejected before anything runs.
    pub fn parse(name: &str, arguments: &Value) -> Result<Self, ToolError> {
        if !TOOL_NAMES.contains(&name) {
            return Err(ToolError::UnknownTool(name.to_string()));
        }
        let arguments = match arguments {
            Value::Null => json!({}),
            other => other.clone(),
        };
        serde_json::from_value(json!({ "name": name, "arguments": arguments }))
            .map_err(|e| ToolError::Validation(format!("Invalid arguments for {}: {}", name, e)))
    }

    pub fn name(&self) -> &'static str {
        match self {
            ToolCall::ReadFile { .. } => "read_file",
            ToolCall::EditFile { .. } => "edit_file",
            ToolCall::SearchReplace { .. } => "search_replace",
            ToolCall::RunTerminalCmd { .. } => "run_terminal_cmd",
            ToolCall::ListDirectory { .. } => "list_directory",
            ToolCall::SearchFiles { .. } => "search_files",
            ToolCall::DeleteFile { .. } => "delete_file",
            ToolCall::GrepSearch { .. } => "grep_search",
            ToolCall::ExitTool { .. } => "exit_tool",
        }
    }

    /// Short parameter summary for logs (large values truncated)
    pub fn param_summary(&self) -> String {
        match self {
            ToolCall::ReadFile { file_path, start_line, end_line } => {
                format!("path={} lines={:?}..{:?}", file_path, start_line, end_line)
            }
            ToolCall::EditFile { target_file_path, code_snippet } => {
                format!("path={} snippet_len={}", target_file_path, code_snippet.len())
            }
            ToolCall::SearchReplace { query, replacement, .. } => {
                format!("query={} replacement={}", truncate(query, 100), truncate(replacement, 100))
            }
            ToolCall::RunTerminalCmd { cmd, is_background } => {
                format!("cmd={} background={}", truncate(cmd, 200), is_background.unwrap_or(false))
            }
            ToolCall::ListDirectory { dir_path, recursive } => {
                format!("dir={} recursive={}", dir_path.as_deref().unwrap_or("."), recursive.unwrap_or(true))
            }
            ToolCall::SearchFiles { pattern } => format!("pattern={}", pattern),
            ToolCall::DeleteFile { path } => format!("path={}", path),
            ToolCall::GrepSearch { query, include_pattern, .. } => match include_pattern {
                Some(inc) => format!("query={} include={}", truncate(query, 150), inc),
                None => format!("query={}", truncate(query, 150)),
            },
            ToolCall::ExitTool { summary } => format!("summary={}", truncate(summary, 150)),
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_string(),
    }
}

// ============================================================================
// CATALOG
// ============================================================================

/// Tool definition helper (Anthropic tool schema)
fn tool_def(name: &str, description: &str, properties: Value, required: Vec<&str>) -> Value {
    json!({
        "name": name,
        "description": description,
        "input_schema": {
            "type": "object",
            "properties": properties,
            "required": required,
        }
    })
}

/// Return all tool definitions
pub fn catalog() -> Vec<Value> {
    vec![
        tool_def(
            "read_file",
            "Read the contents of a file. Reads the whole file or the line range [start_line, end_line). \
             At most 1500 lines are returned per call; file_info reports how many lines remain.",
            json!({
                "file_path": {"type": "string", "description": "Absolute path to the file to read"},
                "start_line": {"type": "integer", "description": "Zero-based line to start reading from"},
                "end_line": {"type": "integer", "description": "Zero-based line to stop reading before"}
            }),
            vec!["file_path"],
        ),
        tool_def(
            "edit_file",
            "Propose an edit to an existing file or write a new file. The snippet is merged into the file \
             by a fast-apply model, so send only the changed code with about 3 unchanged lines of context \
             above and below each change. For deletions show the block with the lines already removed. \
             Combine all changes to one file into a single call.",
            json!({
                "target_file_path": {"type": "string", "description": "Absolute path to the file to edit"},
                "code_snippet": {"type": "string", "description": "The edit, with surrounding context lines"}
            }),
            vec!["target_file_path", "code_snippet"],
        ),
        tool_def(
            "search_replace",
            "Regex search and replace across files in the codebase. Replacement may reference groups as \\1 \
             or \\g<name>; $ is literal. Dependency, build and VCS directories are always skipped.",
            json!({
                "query": {"type": "string", "description": "The text or regex pattern to search for"},
                "replacement": {"type": "string", "description": "Text to replace each match with"},
                "options": {
                    "type": "object",
                    "properties": {
                        "case_sensitive": {"type": "boolean", "description": "Case sensitive match (default true)"},
                        "include_pattern": {"type": "string", "description": "Comma separated globs of files to include"},
                        "exclude_pattern": {"type": "string", "description": "Comma separated globs of files to exclude"},
                        "search_paths": {"type": "array", "items": {"type": "string"}, "description": "Paths to search in"}
                    }
                }
            }),
            vec!["query", "replacement"],
        ),
        tool_def(
            "run_terminal_cmd",
            "Run a shell command in the codebase directory to build, test or install packages. \
             Destructive commands are refused. Foreground commands time out after 30 seconds; \
             use is_background for servers and watchers.",
            json!({
                "cmd": {"type": "string", "description": "The terminal command to execute"},
                "is_background": {"type": "boolean", "description": "Run detached and return immediately"}
            }),
            vec!["cmd", "is_background"],
        ),
        tool_def(
            "list_directory",
            "List the contents of a directory. Use this for discovery before reading files. \
             Hidden entries and dependency/build directories are skipped.",
            json!({
                "dir_path": {"type": "string", "description": "Directory to list; defaults to the codebase root"},
                "recursive": {"type": "boolean", "description": "List subdirectories recursively (default true)"}
            }),
            vec![],
        ),
        tool_def(
            "search_files",
            "Fuzzy search for files by path. Use when you know part of a file name but not its location.",
            json!({
                "pattern": {"type": "string", "description": "Fuzzy file name pattern"}
            }),
            vec!["pattern"],
        ),
        tool_def(
            "delete_file",
            "Delete a file or directory inside the codebase. Project-critical paths (node_modules, \
             package.json, .env, build output) and hidden files cannot be deleted.",
            json!({
                "path": {"type": "string", "description": "Absolute path of the file or directory to delete"}
            }),
            vec!["path"],
        ),
        tool_def(
            "grep_search",
            "Exact text or regex search over file contents. Best when the symbol or function name is known. \
             Results are capped at 50 matches; narrow the scope with include/exclude globs.",
            json!({
                "query": {"type": "string", "description": "Regex pattern or text to search for"},
                "case_sensitive": {"type": "boolean", "description": "Search case-sensitively"},
                "include_pattern": {"type": "string", "description": "Glob of files to include"},
                "exclude_pattern": {"type": "string", "description": "Glob of files to exclude"}
            }),
            vec!["query"],
        ),
        tool_def(
            "exit_tool",
            "End the session once the task is done. Always the last call.",
            json!({
                "summary": {"type": "string", "description": "What was done, what is still broken, key decisions and root causes"}
            }),
            vec!["summary"],
        ),
    ]
}

// ============================================================================
// RESULTS
// ============================================================================

/// Outcome of one invocation as reported back to the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub invocation_id: String,
    pub tool: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    pub fn skipped(invocation_id: &str, tool: &str, reason: &str) -> Self {
        Self {
            invocation_id: invocation_id.to_string(),
            tool: tool.to_string(),
            success: false,
            data: None,
            error: Some(format!("skipped: {}", reason)),
        }
    }

    /// Text form placed in the tool_result block
    pub fn render(&self) -> String {
        if self.success {
            let body = match &self.data {
                Some(Value::String(s)) => s.clone(),
                Some(v) => serde_json::to_string_pretty(v).unwrap_or_else(|_| v.to_string()),
                None => String::new(),
            };
            format!("✅ {} completed successfully.\n\nResult:\n{}", self.tool, body)
        } else {
            format!("❌ {} failed: {}", self.tool, self.error.as_deref().unwrap_or("Unknown error"))
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_matches_tool_names() {
        let names: Vec<String> = catalog()
            .iter()
            .map(|d| d["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, TOOL_NAMES);
        assert!(catalog().iter().all(|d| d["input_schema"]["type"] == "object"));
    }

    #[test]
    fn parses_known_tools() {
        let call = ToolCall::parse("read_file", &json!({"file_path": "/w/a.js", "start_line": 10})).unwrap();
        assert_eq!(
            call,
            ToolCall::ReadFile { file_path: "/w/a.js".into(), start_line: Some(10), end_line: None }
        );

        let call = ToolCall::parse("list_directory", &Value::Null).unwrap();
        assert_eq!(call, ToolCall::ListDirectory { dir_path: None, recursive: None });

        let call = ToolCall::parse(
            "search_replace",
            &json!({"query": "a", "replacement": "b", "options": {"include_pattern": "*.ts"}}),
        )
        .unwrap();
        assert_eq!(call.name(), "search_replace");
    }

    #[test]
    fn rejects_unknown_and_malformed() {
        assert!(matches!(ToolCall::parse("web_search", &json!({})), Err(ToolError::UnknownTool(_))));
        let err = ToolCall::parse("edit_file", &json!({"target_file_path": "/a"})).unwrap_err();
        assert!(matches!(err, ToolError::Validation(_)));
        assert!(err.to_string().starts_with("Invalid arguments for edit_file"));
    }

    #[test]
    fn extra_arguments_are_ignored() {
        let call = ToolCall::parse("search_files", &json!({"pattern": "btn", "explanation": "find it"})).unwrap();
        assert_eq!(call, ToolCall::SearchFiles { pattern: "btn".into() });
    }

    #[test]
    fn render_success_and_failure() {
        let ok = ToolResult {
            invocation_id: "t1".into(),
            tool: "read_file".into(),
            success: true,
            data: Some(json!({"content": "x"})),
            error: None,
        };
        assert!(ok.render().starts_with("✅ read_file completed successfully.\n\nResult:\n{"));

        let failed = ToolResult::skipped("t2", "delete_file", "tool call budget exhausted");
        assert_eq!(failed.render(), "❌ delete_file failed: skipped: tool call budget exhausted");
    }

    #[test]
    fn summaries_truncate_long_values() {
        let call = ToolCall::RunTerminalCmd { cmd: "x".repeat(500), is_background: None };
        let summary = call.param_summary();
        assert!(summary.len() < 260);
        assert!(summary.ends_with("… background=false"));
    }
}
