// IDE Agent Gateway - File Search
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// search_files: fuzzy file-name lookup ranked by Jaro-Winkler similarity.
// grep_search: regex content search with glob filters and a deadline.
// Both are synchronous walks; callers run them on a blocking thread.

use crate::error::ToolError;
use crate::fs_tools;
use globset::{Glob, GlobSet, GlobSetBuilder};
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{Duration, Instant};
use walkdir::WalkDir;

/// Directories skipped by the fuzzy file search
pub const SEARCH_EXCLUDED_DIRS: &[&str] = &[
    ".venv", ".env", "venv", "env", "node_modules", "__pycache__", ".git", ".idea", ".vs", ".vscode",
    "dist", "build",
];

const NO_MATCHES: &str = "No matches found";

// ============================================================================
// FUZZY FILE SEARCH
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileMatch {
    pub file_path: String,
    pub score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Every pattern character appears in `haystack` in order
fn is_subsequence(pattern: &str, haystack: &str) -> bool {
    let mut chars = haystack.chars();
    pattern.chars().all(|p| chars.any(|h| h == p))
}

fn score(pattern: &str, relative: &str, name: &str) -> f64 {
    let mut score = strsim::jaro_winkler(pattern, name);
    if relative.contains(pattern) {
        score = score.max(0.8);
    }
    if name.starts_with(pattern) {
        score = score.max(0.9);
    }
    score
}

/// Fuzzy-match file paths under `root`. Whitespace separates terms that
/// must each match. Best `limit` hits, highest score first.
pub fn search_files(pattern: &str, root: &Path, limit: usize) -> Vec<FileMatch> {
    let needle = pattern.trim().to_lowercase();
    let terms: Vec<&str> = needle.split_whitespace().collect();
    if terms.is_empty() {
        return vec![FileMatch { file_path: pattern.to_string(), score: 0.0, error: Some(NO_MATCHES.to_string()) }];
    }

    let walker = WalkDir::new(root).min_depth(1).into_iter().filter_entry(|e| {
        !(e.file_type().is_dir() && SEARCH_EXCLUDED_DIRS.contains(&e.file_name().to_string_lossy().as_ref()))
    });

    let mut hits: Vec<FileMatch> = Vec::new();
    for entry in walker.filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() || fs_tools::is_env_file(&entry.file_name().to_string_lossy()) {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .to_lowercase();
        if !terms.iter().all(|t| is_subsequence(t, &relative)) {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_lowercase();
        hits.push(FileMatch {
            file_path: entry.path().display().to_string(),
            score: score(&needle, &relative, &name),
            error: None,
        });
    }

    if hits.is_empty() {
        return vec![FileMatch { file_path: pattern.to_string(), score: 0.0, error: Some(NO_MATCHES.to_string()) }];
    }
    hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.file_path.cmp(&b.file_path)));
    hits.truncate(limit);
    hits
}

// ============================================================================
// GREP SEARCH
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GrepStatus {
    Success,
    Timeout,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrepReport {
    pub results: String,
    pub count: usize,
    pub status: GrepStatus,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GrepOptions {
    pub case_sensitive: Option<bool>,
    pub include_pattern: Option<String>,
    pub exclude_pattern: Option<String>,
}

fn glob_list(raw: Option<&str>) -> Result<Option<GlobSet>, ToolError> {
    let patterns: Vec<&str> = raw
        .unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for p in patterns {
        builder.add(Glob::new(p).map_err(|e| ToolError::Validation(format!("Invalid glob pattern '{}': {}", p, e)))?);
    }
    builder
        .build()
        .map(Some)
        .map_err(|e| ToolError::Validation(format!("Invalid glob set: {}", e)))
}

/// Search file contents under `root` line by line
pub fn grep_search(
    query: &str,
    options: &GrepOptions,
    root: &Path,
    max_matches: usize,
    deadline: Duration,
) -> Result<GrepReport, ToolError> {
    let regex = RegexBuilder::new(query)
        .case_insensitive(!options.case_sensitive.unwrap_or(false))
        .build()
        .map_err(|e| ToolError::Validation(format!("Invalid regex pattern: {}", e)))?;
    let include = glob_list(options.include_pattern.as_deref())?;
    let exclude = glob_list(options.exclude_pattern.as_deref())?;

    let started = Instant::now();
    let walker = WalkDir::new(root).sort_by_file_name().into_iter().filter_entry(|e| {
        e.depth() == 0 || !fs_tools::is_excluded_name(&e.file_name().to_string_lossy())
    });

    let mut lines: Vec<String> = Vec::new();
    let mut truncated = false;

    'walk: for entry in walker.filter_map(|e| e.ok()) {
        if started.elapsed() >= deadline {
            log::warn!("grep_search exceeded {:?} for {:?}", deadline, query);
            return Ok(GrepReport {
                results: format!("Search timed out after {} seconds", deadline.as_secs()),
                count: 0,
                status: GrepStatus::Timeout,
            });
        }
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        let name = entry.file_name().to_string_lossy();
        if let Some(inc) = &include {
            if !inc.is_match(name.as_ref()) && !inc.is_match(relative) {
                continue;
            }
        }
        if let Some(exc) = &exclude {
            if exc.is_match(name.as_ref()) || exc.is_match(relative) {
                continue;
            }
        }

        let Ok(bytes) = std::fs::read(entry.path()) else { continue };
        if bytes.iter().take(1024).any(|&b| b == 0) {
            continue;
        }
        let text = String::from_utf8_lossy(&bytes);
        for (idx, line) in text.lines().enumerate() {
            if !regex.is_match(line) {
                continue;
            }
            if lines.len() >= max_matches {
                truncated = true;
                break 'walk;
            }
            lines.push(format!("{}:{}: {}", entry.path().display(), idx + 1, line.trim()));
        }
    }

    let count = lines.len();
    if truncated {
        lines.push(format!("... (output truncated at {} matches)", max_matches));
    }
    Ok(GrepReport {
        results: if lines.is_empty() { NO_MATCHES.to_string() } else { lines.join("\n") },
        count,
        status: GrepStatus::Success,
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn project() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("src/components")).unwrap();
        std::fs::create_dir_all(root.join("node_modules/button")).unwrap();
        std::fs::write(root.join("src/components/Button.tsx"), "export function Button() {}\n").unwrap();
        std::fs::write(root.join("src/components/ButtonGroup.tsx"), "import { Button } from './Button';\n").unwrap();
        std::fs::write(root.join("src/App.tsx"), "const title = 'hello';\n").unwrap();
        std::fs::write(root.join("node_modules/button/index.js"), "module.exports = Button;\n").unwrap();
        dir
    }

    #[test]
    fn subsequence_matching() {
        assert!(is_subsequence("btn", "src/button.tsx"));
        assert!(!is_subsequence("xyz", "src/button.tsx"));
        assert!(is_subsequence("", "anything"));
    }

    #[test]
    fn fuzzy_ranks_prefix_matches_and_skips_dependencies() {
        let dir = project();
        let hits = search_files("button", dir.path(), 50);
        assert!(hits.iter().all(|h| !h.file_path.contains("node_modules")));
        assert_eq!(hits.len(), 2);
        assert!(hits[0].file_path.ends_with("Button.tsx"));
        assert!(hits.iter().all(|h| h.score >= 0.9));
    }

    #[test]
    fn fuzzy_never_lists_env_files() {
        let dir = project();
        for name in [".env", ".env.local", ".env.production"] {
            std::fs::write(dir.path().join(name), "API_KEY=secret\n").unwrap();
        }
        std::fs::write(dir.path().join("src/environment.ts"), "export {};\n").unwrap();
        let hits = search_files("env", dir.path(), 50);
        assert!(hits.iter().all(|h| !h.file_path.contains(".env")), "{:?}", hits);
        assert!(hits.iter().any(|h| h.file_path.ends_with("environment.ts")));
    }

    #[test]
    fn fuzzy_respects_limit() {
        let dir = project();
        assert_eq!(search_files("tsx", dir.path(), 1).len(), 1);
    }

    #[test]
    fn fuzzy_reports_no_matches() {
        let dir = project();
        let hits = search_files("zzqq", dir.path(), 50);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].file_path, "zzqq");
        assert_eq!(hits[0].score, 0.0);
        assert_eq!(hits[0].error.as_deref(), Some("No matches found"));
    }

    #[test]
    fn grep_finds_lines_and_skips_dependencies() {
        let dir = project();
        let report = grep_search("button", &GrepOptions::default(), dir.path(), 50, Duration::from_secs(30)).unwrap();
        assert_eq!(report.status, GrepStatus::Success);
        assert_eq!(report.count, 2);
        assert!(report.results.contains("Button.tsx:1: export function Button() {}"));
        assert!(!report.results.contains("node_modules"));
    }

    #[test]
    fn grep_case_sensitive_and_globs() {
        let dir = project();
        let opts = GrepOptions { case_sensitive: Some(true), ..Default::default() };
        let report = grep_search("button", &opts, dir.path(), 50, Duration::from_secs(30)).unwrap();
        assert_eq!(report.results, "No matches found");

        let opts = GrepOptions { exclude_pattern: Some("ButtonGroup.tsx".into()), ..Default::default() };
        let report = grep_search("Button", &opts, dir.path(), 50, Duration::from_secs(30)).unwrap();
        assert_eq!(report.count, 1);

        let opts = GrepOptions { include_pattern: Some("App.*".into()), ..Default::default() };
        let report = grep_search("title", &opts, dir.path(), 50, Duration::from_secs(30)).unwrap();
        assert_eq!(report.count, 1);
    }

    #[test]
    fn grep_truncates_at_cap() {
        let dir = tempfile::tempdir().unwrap();
        let body: String = (0..80).map(|i| format!("match {}\n", i)).collect();
        std::fs::write(dir.path().join("many.txt"), body).unwrap();
        let report = grep_search("match", &GrepOptions::default(), dir.path(), 50, Duration::from_secs(30)).unwrap();
        assert_eq!(report.count, 50);
        assert!(report.results.ends_with("... (output truncated at 50 matches)"));
    }

    #[test]
    fn grep_rejects_bad_regex_and_honours_deadline() {
        let dir = project();
        let err = grep_search("(", &GrepOptions::default(), dir.path(), 50, Duration::from_secs(30)).unwrap_err();
        assert!(matches!(err, ToolError::Validation(_)));

        let report = grep_search("x", &GrepOptions::default(), dir.path(), 50, Duration::ZERO).unwrap();
        assert_eq!(report.status, GrepStatus::Timeout);
    }
}
