// IDE Agent Gateway - Session Workspace
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Maps a session id to its workspace on disk and loads the prompt context.
// Layout: {artifacts}/{id}/codebase, {artifacts}/{id}/scratchpads/...
// The exit log (global scratchpad) is append-only.

use crate::error::{SessionError, ToolError};
use crate::storage::GatewayStorage;
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

const EXIT_SEPARATOR_WIDTH: usize = 80;

/// One project workspace. Immutable for the duration of an agent run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub id: String,
    /// {artifacts}/{id}
    pub workspace: PathBuf,
    /// Project root the tools operate on
    pub codebase: PathBuf,
}

/// Prompt context read from the scratchpads
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionContext {
    pub file_structure: String,
    pub global_scratchpad: String,
    pub screen_scratchpads: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitReport {
    pub file_path: String,
    pub file_existed: bool,
    pub original_size: u64,
    pub new_size: u64,
}

fn valid_id(id: &str) -> bool {
    !id.is_empty()
        && id != "."
        && id != ".."
        && id.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

impl Session {
    /// Build a session directly from its parts
    pub fn new(id: &str, workspace: PathBuf, codebase: PathBuf) -> Self {
        Self { id: id.to_string(), workspace, codebase }
    }

    /// Resolve `id` against the registry first, then the artifacts layout.
    /// A session without an existing codebase directory is an error.
    pub fn resolve(
        id: &str,
        artifacts_root: &Path,
        storage: Option<&GatewayStorage>,
    ) -> Result<Self, SessionError> {
        if !valid_id(id) {
            return Err(SessionError::InvalidId(id.to_string()));
        }
        let workspace = crate::paths::absolutize(artifacts_root).join(id);

        let registered = match storage {
            Some(db) => db
                .lookup_session(id)
                .map_err(|e| SessionError::Registry(e.to_string()))?
                .map(|record| record.codebase),
            None => None,
        };
        let codebase = registered.unwrap_or_else(|| workspace.join("codebase"));

        if !codebase.is_dir() {
            log::warn!("Session {} has no codebase at {:?}", id, codebase);
            return Err(SessionError::MissingCodebase(id.to_string()));
        }
        Ok(Self::new(id, workspace, codebase))
    }

    pub fn scratchpad_dir(&self) -> PathBuf {
        self.workspace.join("scratchpads")
    }

    pub fn exit_log_path(&self) -> PathBuf {
        self.scratchpad_dir().join("global_scratchpad.txt")
    }

    /// Read the scratchpads. Missing or unreadable files become placeholder text.
    pub fn load_context(&self) -> SessionContext {
        let dir = self.scratchpad_dir();
        SessionContext {
            file_structure: read_or(&dir.join("file_structure.txt"), "File structure not available"),
            global_scratchpad: read_or(&dir.join("global_scratchpad.txt"), "Global scratch pad not available"),
            screen_scratchpads: read_screen_scratchpads(&dir.join("screen_scratchpads")),
        }
    }

    /// Append an exit summary block to the global scratchpad
    pub fn append_exit_summary(&self, summary: &str) -> Result<ExitReport, ToolError> {
        let path = self.exit_log_path();
        let file_existed = path.exists();
        let original_size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ToolError::Execution(format!("Failed to create scratchpad directory: {}", e)))?;
        }

        let separator = "=".repeat(EXIT_SEPARATOR_WIDTH);
        let block = format!(
            "\n\n{sep}\nAI Agent Exit Summary - {ts}\n{sep}\n\nSummary:\n{summary}\n",
            sep = separator,
            ts = Local::now().format("%Y-%m-%d %H:%M:%S"),
            summary = summary,
        );

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| ToolError::from_io(e, &path))?;
        file.write_all(block.as_bytes())
            .map_err(|e| ToolError::Execution(format!("Failed to write exit summary: {}", e)))?;

        let new_size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        log::info!("Exit summary appended for session {} ({} -> {} bytes)", self.id, original_size, new_size);

        Ok(ExitReport {
            file_path: path.display().to_string(),
            file_existed,
            original_size,
            new_size,
        })
    }
}

fn read_or(path: &Path, missing: &str) -> String {
    if !path.exists() {
        return missing.to_string();
    }
    match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            log::warn!("Failed to read {:?}: {}", path, e);
            format!("Error reading {}: {}", path.display(), e)
        }
    }
}

/// Every *.txt in the directory, sorted, each headed by its file name
fn read_screen_scratchpads(dir: &Path) -> String {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return "Screen scratch pads directory not available".to_string();
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().map(|x| x == "txt").unwrap_or(false))
        .collect();
    if files.is_empty() {
        return "No screen scratch pads found".to_string();
    }
    files.sort();

    files
        .iter()
        .map(|p| {
            let name = p.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
            let body = std::fs::read_to_string(p).unwrap_or_else(|e| format!("Error reading file: {}", e));
            format!("=== {} ===\n{}", name, body)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

// ============================================================================
// TESTS
// ============================================================================
