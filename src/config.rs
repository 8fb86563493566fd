// IDE Agent Gateway - Configuration
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Model endpoint, code-merge endpoint, tool limits, protected paths.
// Loaded from JSON, then overridden from the environment.

use crate::path_safety::PathScope;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Master gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub version: String,
    pub model: ModelConfig,
    pub merge: MergeConfig,
    pub limits: LimitsConfig,
    pub paths: PathsConfig,
    pub server: ServerConfig,
    /// LMDB directory for the session registry and error journal. None = no persistence.
    pub storage_path: Option<PathBuf>,
}

/// Generative model endpoint (Anthropic Messages API)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub api_url: String,
    #[serde(skip_serializing)]
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

/// Code-merge collaborator used by edit_file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    pub api_url: String,
    #[serde(skip_serializing)]
    pub api_key: String,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Tool calls allowed per agent run
    pub max_tool_calls: u32,
    pub terminal_timeout_secs: u64,
    pub grep_timeout_secs: u64,
    /// Line ceiling for a single read_file call
    pub read_max_lines: usize,
    pub grep_max_matches: usize,
    pub search_files_max_results: usize,
    /// Files rewritten in parallel by search_replace
    pub search_replace_concurrency: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Session workspaces live at {artifacts_root}/{session_id}/codebase
    pub artifacts_root: PathBuf,
    /// The gateway's own source trees
    pub protected_system_dirs: Vec<String>,
    /// OS-critical roots
    pub protected_roots: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            version: "1.0.0".to_string(),
            model: ModelConfig::default(),
            merge: MergeConfig::default(),
            limits: LimitsConfig::default(),
            paths: PathsConfig::default(),
            server: ServerConfig::default(),
            storage_path: None,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.anthropic.com/v1/messages".to_string(),
            api_key: String::new(),
            model: "claude-sonnet-4-20250514".to_string(),
            max_tokens: 16_000,
            temperature: 0.5,
            connect_timeout_secs: 60,
            request_timeout_secs: 300,
        }
    }
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            api_url: "https://instantapply.endpoint.relace.run/v1/code/apply".to_string(),
            api_key: String::new(),
            connect_timeout_secs: 30,
            request_timeout_secs: 120,
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_tool_calls: 25,
            terminal_timeout_secs: 30,
            grep_timeout_secs: 30,
            read_max_lines: 1500,
            grep_max_matches: 50,
            search_files_max_results: 50,
            search_replace_concurrency: 8,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        let root = crate::paths::gate_root();
        Self {
            artifacts_root: PathBuf::from("artifacts"),
            protected_system_dirs: vec![
                root.join("src").to_string_lossy().to_string(),
                root.join("Cargo.toml").to_string_lossy().to_string(),
                root.join("Cargo.lock").to_string_lossy().to_string(),
                root.join("target").to_string_lossy().to_string(),
            ],
            protected_roots: [
                "/bin", "/sbin", "/usr", "/etc", "/var", "/system", "/library",
                "/boot", "/proc", "/sys", "/dev",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: "127.0.0.1:8001".to_string() }
    }
}

impl AgentConfig {
    /// Load config from JSON file, falling back to defaults
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            log::warn!("Config not found at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Save config to JSON file. API keys are never written.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any key lookup. Empty values are ignored.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("ANTHROPIC_API_KEY") {
            self.model.api_key = v;
        }
        if let Some(v) = get("ANTHROPIC_API_URL") {
            self.model.api_url = v;
        }
        if let Some(v) = get("ANTHROPIC_MODEL") {
            self.model.model = v;
        }
        if let Some(v) = get("RELACE_API_KEY") {
            self.merge.api_key = v;
        }
        if let Some(v) = get("RELACE_API_URL") {
            self.merge.api_url = v;
        }
        if let Some(v) = get("IDE_AGENT_ARTIFACTS") {
            self.paths.artifacts_root = PathBuf::from(v);
        }
        if let Some(v) = get("IDE_AGENT_BIND") {
            self.server.bind = v;
        }
        if let Some(v) = get("IDE_AGENT_MAX_TOOL_CALLS") {
            match v.trim().parse::<u32>() {
                Ok(n) => self.limits.max_tool_calls = n,
                Err(_) => log::warn!("Ignoring invalid IDE_AGENT_MAX_TOOL_CALLS={:?}", v),
            }
        }
    }

    /// Build the immutable protected-path scope for the validators
    pub fn path_scope(&self) -> PathScope {
        PathScope::new(
            self.paths.protected_system_dirs.iter().map(PathBuf::from).collect(),
            self.paths.protected_roots.iter().map(PathBuf::from).collect(),
        )
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_budget_is_twenty_five() {
        let config = AgentConfig::default();
        assert_eq!(config.limits.max_tool_calls, 25);
        assert_eq!(config.limits.read_max_lines, 1500);
        assert_eq!(config.limits.grep_max_matches, 50);
    }

    #[test]
    fn default_roots_include_os_dirs() {
        let config = AgentConfig::default();
        for root in ["/bin", "/usr", "/etc", "/var"] {
            assert!(
                config.paths.protected_roots.iter().any(|r| r == root),
                "{} should be protected",
                root
            );
        }
    }

    #[test]
    fn env_overrides_apply() {
        let mut vars = HashMap::new();
        vars.insert("ANTHROPIC_API_KEY", "sk-test".to_string());
        vars.insert("IDE_AGENT_MAX_TOOL_CALLS", "7".to_string());
        vars.insert("IDE_AGENT_BIND", "0.0.0.0:9000".to_string());
        vars.insert("RELACE_API_URL", "".to_string());

        let mut config = AgentConfig::default();
        config.apply_env_from(|k| vars.get(k).cloned());

        assert_eq!(config.model.api_key, "sk-test");
        assert_eq!(config.limits.max_tool_calls, 7);
        assert_eq!(config.server.bind, "0.0.0.0:9000");
        // empty value leaves the default alone
        assert!(config.merge.api_url.starts_with("https://"));
    }

    #[test]
    fn invalid_budget_env_is_ignored() {
        let mut config = AgentConfig::default();
        config.apply_env_from(|k| (k == "IDE_AGENT_MAX_TOOL_CALLS").then(|| "lots".to_string()));
        assert_eq!(config.limits.max_tool_calls, 25);
    }

    #[test]
    fn load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AgentConfig::load(&dir.path().join("nope.json")).unwrap();
        assert_eq!(config.limits.max_tool_calls, 25);
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gate.json");
        std::fs::write(&path, r#"{"limits": {"max_tool_calls": 3}}"#).unwrap();

        let config = AgentConfig::load(&path).unwrap();
        assert_eq!(config.limits.max_tool_calls, 3);
        assert_eq!(config.limits.terminal_timeout_secs, 30);
        assert_eq!(config.server.bind, "127.0.0.1:8001");
    }

    #[test]
    fn save_does_not_write_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gate.json");
        let mut config = AgentConfig::default();
        config.model.api_key = "sk-secret".to_string();
        config.save(&path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(!written.contains("sk-secret"));
    }
}
