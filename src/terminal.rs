// IDE Agent Gateway - Terminal Execution Service
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Runs shell commands inside the session workspace.
// Pipeline: dependency-dir rewrite -> command safety -> cwd safety -> spawn.
// Foreground commands are bounded by a timeout; background commands are detached.

use crate::command_safety::CommandValidator;
use crate::path_safety::{self, PathScope};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    Completed,
    Error,
    Timeout,
    RunningInBackground,
    BlockedDangerousCommand,
}

/// Result of one terminal command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandOutput {
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub exit_code: Option<i32>,
    pub status: CommandStatus,
    /// Command as executed, when the dependency-dir rewrite changed it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rewritten_command: Option<String>,
}

impl CommandOutput {
    fn blocked(reason: &str) -> Self {
        Self {
            output: String::new(),
            error: Some(format!("SECURITY ALERT: Dangerous command detected. {}", reason)),
            exit_code: Some(1),
            status: CommandStatus::BlockedDangerousCommand,
            rewritten_command: None,
        }
    }

    fn failed(msg: String) -> Self {
        Self {
            output: String::new(),
            error: Some(msg),
            exit_code: Some(1),
            status: CommandStatus::Error,
            rewritten_command: None,
        }
    }
}

pub struct TerminalService {
    validator: Arc<CommandValidator>,
    scope: Arc<PathScope>,
    timeout: Duration,
}

impl TerminalService {
    pub fn new(validator: Arc<CommandValidator>, scope: Arc<PathScope>, timeout: Duration) -> Self {
        Self { validator, scope, timeout }
    }

    /// Run a command in `cwd`. Never returns Err: every failure is a status.
    pub async fn run(&self, command: &str, is_background: bool, cwd: &Path) -> CommandOutput {
        let rewritten = rewrite_for_dependency_exclusion(command);
        if rewritten != command {
            log::debug!("Rewrote command to skip node_modules: {}", rewritten);
        }

        let verdict = self.validator.check(&rewritten);
        if verdict.dangerous {
            let reason = verdict.reason.unwrap_or_default();
            log::warn!("BLOCKED command {:?}: {}", command, reason);
            return CommandOutput::blocked(&reason);
        }

        if let Err(reason) = path_safety::is_safe(cwd, &self.scope) {
            log::warn!("BLOCKED command cwd {:?}: {}", cwd, reason);
            return CommandOutput::blocked(&reason);
        }

        let mut output = if is_background {
            self.spawn_background(&rewritten, cwd)
        } else {
            self.run_foreground(&rewritten, cwd).await
        };
        if rewritten != command {
            output.rewritten_command = Some(rewritten);
        }
        output
    }

    fn shell(command: &str, cwd: &Path) -> Command {
        let mut cmd = Command::new("bash");
        cmd.arg("-c").arg(command).current_dir(cwd);
        cmd
    }

    async fn run_foreground(&self, command: &str, cwd: &Path) -> CommandOutput {
        log::info!("Executing command in {:?}: {}", cwd, command);
        let child = Self::shell(command, cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let child = match child {
            Ok(c) => c,
            Err(e) => return CommandOutput::failed(format!("Error executing command: {}", e)),
        };

        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(out)) => {
                let code = out.status.code();
                CommandOutput {
                    output: String::from_utf8_lossy(&out.stdout).to_string(),
                    error: Some(String::from_utf8_lossy(&out.stderr).to_string()),
                    exit_code: code,
                    status: if code == Some(0) { CommandStatus::Completed } else { CommandStatus::Error },
                    rewritten_command: None,
                }
            }
            Ok(Err(e)) => CommandOutput::failed(format!("Error executing command: {}", e)),
            // child dropped here: kill_on_drop terminates it
            Err(_) => CommandOutput {
                output: format!("Command timed out after {} seconds", self.timeout.as_secs()),
                error: None,
                exit_code: None,
                status: CommandStatus::Timeout,
                rewritten_command: None,
            },
        }
    }

    fn spawn_background(&self, command: &str, cwd: &Path) -> CommandOutput {
        log::info!("Starting background command in {:?}: {}", cwd, command);
        let mut std_cmd = std::process::Command::new("bash");
        std_cmd
            .arg("-c")
            .arg(command)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            std_cmd.process_group(0);
        }

        match Command::from(std_cmd).spawn() {
            Ok(mut child) => {
                let pid = child.id().unwrap_or_default();
                // reap only; the process owns its own lifecycle
                tokio::spawn(async move {
                    let _ = child.wait().await;
                });
                CommandOutput {
                    output: format!("Command started in background with PID {}", pid),
                    error: None,
                    exit_code: None,
                    status: CommandStatus::RunningInBackground,
                    rewritten_command: None,
                }
            }
            Err(e) => CommandOutput::failed(format!("Error executing command: {}", e)),
        }
    }
}

/// Add node_modules exclusions to directory-walking inspection commands.
/// Cosmetic only: the result still goes through the safety check.
pub fn rewrite_for_dependency_exclusion(command: &str) -> String {
    let trimmed = command.trim();
    let first = trimmed.split_whitespace().next().unwrap_or("");
    if command.contains("node_modules") {
        return command.to_string();
    }

    match first {
        "find" => {
            if command.contains("-not -path") {
                return command.to_string();
            }
            let mut parts: Vec<&str> = trimmed.split_whitespace().collect();
            if parts.len() < 2 {
                return command.to_string();
            }
            let mut insert_at = 2;
            while insert_at < parts.len() && !parts[insert_at].starts_with('-') {
                insert_at += 1;
            }
            for (offset, token) in ["-not", "-path", "\"*/node_modules/*\""].iter().enumerate() {
                parts.insert(insert_at + offset, token);
            }
            parts.join(" ")
        }
        "grep" | "wc" if command.contains("-r") && !command.contains("--exclude-dir") => {
            format!("{} --exclude-dir=node_modules", command)
        }
        "du" if !command.contains("--exclude") => format!("{} --exclude=node_modules", command),
        "tree" if !command.contains("-I") => format!("{} -I node_modules", command),
        _ => command.to_string(),
    }
}

// ============================================================================
// TESTS
// ============================================================================
