// IDE Agent Gateway - Error Taxonomy
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Tool-level errors are caught at the gateway and handed back to the model
// as failed tool results. Upstream errors end the agent loop.

use thiserror::Error;

/// Failure of a single tool invocation. Never fatal to the agent loop.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Rejected before any side effect (bad arguments, unsafe command, bad regex)
    #[error("{0}")]
    Validation(String),

    /// Path safety validator refused the path
    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("{0}")]
    NotFound(String),

    /// I/O, subprocess or code-merge failure
    #[error("{0}")]
    Execution(String),

    #[error("{0}")]
    Timeout(String),
}

impl ToolError {
    /// Short category label used in logs and the error journal
    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::UnknownTool(_) => "unknown_tool",
            ToolError::Validation(_) => "validation",
            ToolError::AccessDenied(_) => "access_denied",
            ToolError::NotFound(_) => "not_found",
            ToolError::Execution(_) => "execution",
            ToolError::Timeout(_) => "timeout",
        }
    }

    /// Map an I/O error on `path` into the tool taxonomy
    pub fn from_io(err: std::io::Error, path: &std::path::Path) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => {
                ToolError::NotFound(format!("Path not found: {}", path.display()))
            }
            std::io::ErrorKind::PermissionDenied => {
                ToolError::AccessDenied(format!("permission denied: {}", path.display()))
            }
            _ => ToolError::Execution(format!("{}: {}", path.display(), err)),
        }
    }
}

/// Failure of the generative model call itself. Terminates the loop as `error`.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("model request failed: {0}")]
    Http(String),

    #[error("model returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("model response could not be decoded: {0}")]
    Decode(String),

    #[error("model request timed out after {0}s")]
    Timeout(u64),
}

/// A session id that cannot be mapped to a workspace
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("{0} header is required")]
    MissingId(&'static str),

    #[error("Invalid session id: {0}")]
    InvalidId(String),

    #[error("No codebase found for session {0}. Please run code generation first.")]
    MissingCodebase(String),

    #[error("session registry unavailable: {0}")]
    Registry(String),
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            UpstreamError::Decode(err.to_string())
        } else {
            UpstreamError::Http(err.to_string())
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
