// IDE Agent Gateway - Tool Execution Gateway
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Single entry point for every tool invocation.
// Parse -> inject session defaults -> run -> envelope.
// Failures come back as values; nothing here aborts the agent loop.

use crate::command_safety::CommandValidator;
use crate::config::{AgentConfig, LimitsConfig};
use crate::error::ToolError;
use crate::file_search::{self, GrepOptions};
use crate::fs_tools;
use crate::merge::{CodeMerger, RelaceMerger};
use crate::path_safety::{self, PathScope};
use crate::search_replace::SearchReplaceEngine;
use crate::session::Session;
use crate::storage::GatewayStorage;
use crate::terminal::{CommandStatus, TerminalService};
use crate::tools::{ToolCall, ToolResult};
use anyhow::Context;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Successful tool run. `error` is set when the tool finished with a
/// partial failure (search_replace) and still has data to report.
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    pub data: Value,
    pub error: Option<String>,
}

impl ToolOutcome {
    fn ok(data: Value) -> Self {
        Self { data, error: None }
    }
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value, ToolError> {
    serde_json::to_value(value).map_err(|e| ToolError::Execution(format!("Failed to encode result: {}", e)))
}

/// Run a synchronous filesystem walk off the async workers
async fn blocking<T, F>(f: F) -> Result<T, ToolError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ToolError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ToolError::Execution(format!("worker failed: {}", e)))?
}

pub struct Gateway {
    limits: LimitsConfig,
    scope: Arc<PathScope>,
    terminal: TerminalService,
    replacer: SearchReplaceEngine,
    merger: Arc<dyn CodeMerger>,
    storage: Option<Arc<GatewayStorage>>,
}

impl Gateway {
    pub fn new(
        limits: LimitsConfig,
        scope: Arc<PathScope>,
        validator: Arc<CommandValidator>,
        merger: Arc<dyn CodeMerger>,
        storage: Option<Arc<GatewayStorage>>,
    ) -> Self {
        let terminal = TerminalService::new(
            validator,
            Arc::clone(&scope),
            Duration::from_secs(limits.terminal_timeout_secs),
        );
        let replacer = SearchReplaceEngine::new(Arc::clone(&scope), limits.search_replace_concurrency);
        Self { limits, scope, terminal, replacer, merger, storage }
    }

    /// Production wiring: installed scope, compiled rule table, remote merger
    pub fn from_config(config: &AgentConfig, storage: Option<Arc<GatewayStorage>>) -> anyhow::Result<Self> {
        let scope = crate::paths::install_scope(config.path_scope());
        let validator = CommandValidator::new().context("compiling command safety rules")?;
        let merger = RelaceMerger::new(&config.merge).map_err(anyhow::Error::msg)?;
        Ok(Self::new(config.limits.clone(), scope, Arc::new(validator), Arc::new(merger), storage))
    }

    pub fn storage(&self) -> Option<&Arc<GatewayStorage>> {
        self.storage.as_ref()
    }

    fn resolve(&self, session: &Session, raw: &str, what: &str) -> Result<PathBuf, ToolError> {
        if raw.trim().is_empty() {
            return Err(ToolError::Validation(format!("{} is required", what)));
        }
        Ok(path_safety::resolve_against(&session.codebase, raw))
    }

    /// Parse and run one invocation
    pub async fn dispatch(&self, name: &str, arguments: &Value, session: &Session) -> Result<ToolOutcome, ToolError> {
        let call = ToolCall::parse(name, arguments)?;
        log::debug!("tool {} {}", call.name(), call.param_summary());
        self.run(call, session).await
    }

    /// Run an already parsed call
    pub async fn run(&self, call: ToolCall, session: &Session) -> Result<ToolOutcome, ToolError> {
        match call {
            ToolCall::ReadFile { file_path, start_line, end_line } => {
                let path = self.resolve(session, &file_path, "file_path")?;
                let scope = Arc::clone(&self.scope);
                let max = self.limits.read_max_lines;
                let read = blocking(move || fs_tools::read_file(&path, start_line, end_line, max, &scope)).await?;
                Ok(ToolOutcome::ok(to_value(&read)?))
            }

            ToolCall::EditFile { target_file_path, code_snippet } => {
                let path = self.resolve(session, &target_file_path, "target_file_path")?;
                let report = fs_tools::edit_file(&path, &code_snippet, self.merger.as_ref(), &self.scope).await?;
                Ok(ToolOutcome::ok(to_value(&report)?))
            }

            ToolCall::SearchReplace { query, replacement, options } => {
                let options = options.unwrap_or_default();
                let report = self.replacer.replace(&query, &replacement, &options, &session.codebase).await?;
                let error = if report.success { None } else { report.error.clone() };
                Ok(ToolOutcome { data: to_value(&report)?, error })
            }

            ToolCall::RunTerminalCmd { cmd, is_background } => {
                if cmd.trim().is_empty() {
                    return Err(ToolError::Validation("cmd is required".to_string()));
                }
                let out = self.terminal.run(&cmd, is_background.unwrap_or(false), &session.codebase).await;
                // blocked and timed-out commands keep their envelope
                let error = match out.status {
                    CommandStatus::BlockedDangerousCommand => Some(
                        out.error.clone().unwrap_or_else(|| "SECURITY ALERT: Dangerous command detected.".to_string()),
                    ),
                    CommandStatus::Timeout => Some(out.output.clone()),
                    _ => None,
                };
                Ok(ToolOutcome { data: to_value(&out)?, error })
            }

            ToolCall::ListDirectory { dir_path, recursive } => {
                let dir = path_safety::resolve_against(&session.codebase, dir_path.as_deref().unwrap_or(""));
                let scope = Arc::clone(&self.scope);
                let recursive = recursive.unwrap_or(true);
                let entries = blocking(move || fs_tools::list_directory(&dir, recursive, &scope)).await?;
                Ok(ToolOutcome::ok(to_value(&entries)?))
            }

            ToolCall::SearchFiles { pattern } => {
                let root = session.codebase.clone();
                path_safety::is_safe(&root, &self.scope).map_err(ToolError::AccessDenied)?;
                let limit = self.limits.search_files_max_results;
                let hits = blocking(move || Ok(file_search::search_files(&pattern, &root, limit))).await?;
                Ok(ToolOutcome::ok(to_value(&hits)?))
            }

            ToolCall::DeleteFile { path } => {
                let target = self.resolve(session, &path, "path")?;
                let root = session.codebase.clone();
                let scope = Arc::clone(&self.scope);
                let report = blocking(move || fs_tools::delete_file(&target, &root, &scope)).await?;
                Ok(ToolOutcome::ok(to_value(&report)?))
            }

            ToolCall::GrepSearch { query, case_sensitive, include_pattern, exclude_pattern } => {
                let root = session.codebase.clone();
                path_safety::is_safe(&root, &self.scope).map_err(ToolError::AccessDenied)?;
                let options = GrepOptions { case_sensitive, include_pattern, exclude_pattern };
                let max = self.limits.grep_max_matches;
                let deadline = Duration::from_secs(self.limits.grep_timeout_secs);
                let report =
                    blocking(move || file_search::grep_search(&query, &options, &root, max, deadline)).await?;
                Ok(ToolOutcome::ok(to_value(&report)?))
            }

            ToolCall::ExitTool { summary } => {
                let report = session.append_exit_summary(&summary)?;
                let mut data = to_value(&report)?;
                data["summary"] = json!(summary);
                Ok(ToolOutcome::ok(data))
            }
        }
    }

    /// Run one invocation and wrap it as a tool result. Failures are logged
    /// and journaled when storage is configured.
    pub async fn execute(&self, invocation_id: &str, name: &str, arguments: &Value, session: &Session) -> ToolResult {
        let outcome = self.dispatch(name, arguments, session).await;
        let (success, data, error) = match outcome {
            Ok(ToolOutcome { data, error: None }) => (true, Some(data), None),
            Ok(ToolOutcome { data, error: Some(err) }) => (false, Some(data), Some(err)),
            Err(err) => {
                log::error!("tool {} failed ({}): {}", name, err.kind(), err);
                (false, None, Some(err.to_string()))
            }
        };

        if let (false, Some(message)) = (success, error.as_ref()) {
            self.journal(name, message);
        }

        ToolResult {
            invocation_id: invocation_id.to_string(),
            tool: name.to_string(),
            success,
            data,
            error,
        }
    }

    fn journal(&self, tool: &str, message: &str) {
        if let Some(db) = &self.storage {
            if let Err(e) = db.record_error(tool, message) {
                log::warn!("Failed to journal {} error: {}", tool, e);
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
