// IDE Agent Gateway - Search-Replace Engine
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Regex search/replace across a directory tree.
// - Include/exclude glob lists (comma separated)
// - Dependency/build/VCS exclusions are always applied, only extended
// - Files are rewritten concurrently; one failure never aborts the rest

use crate::error::ToolError;
use crate::path_safety::{self, PathScope};
use globset::{Glob, GlobSet, GlobSetBuilder};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use walkdir::WalkDir;

/// Always excluded, matched against every path component
pub const DEFAULT_EXCLUDES: &[&str] = &[
    ".venv", "venv", ".env", "env", "__pycache__", "*.pyc", "node_modules", "package-lock.json",
    "yarn.lock", ".next", "dist", "build", ".git", ".svn", ".hg", ".idea", ".vscode", ".vs",
    "coverage", ".nyc_output", "*.log", "*.tmp", "*.temp", ".DS_Store", "Thumbs.db", "*.swp",
];

/// Characters of context kept on each side of a match
const CONTEXT_CHARS: usize = 20;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplaceOptions {
    pub case_sensitive: Option<bool>,
    pub include_pattern: Option<String>,
    pub exclude_pattern: Option<String>,
    pub search_paths: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchChange {
    pub line_number: usize,
    pub original: String,
    pub replacement: String,
    pub context: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileChanges {
    pub file: String,
    pub matches: usize,
    pub changes: Vec<MatchChange>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplaceReport {
    pub success: bool,
    pub files_affected: usize,
    pub matches: usize,
    pub changes: Vec<FileChanges>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub failed_files: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub skipped_paths: Vec<String>,
}

impl ReplaceReport {
    fn empty() -> Self {
        Self {
            success: true,
            files_affected: 0,
            matches: 0,
            changes: Vec::new(),
            error: None,
            failed_files: Vec::new(),
            skipped_paths: Vec::new(),
        }
    }
}

fn split_patterns(raw: &str) -> Vec<String> {
    raw.split(',').map(|p| p.trim().to_string()).filter(|p| !p.is_empty()).collect()
}

fn build_globs(patterns: &[String]) -> Result<GlobSet, ToolError> {
    let mut builder = GlobSetBuilder::new();
    for p in patterns {
        let glob = Glob::new(p).map_err(|e| ToolError::Validation(format!("Invalid glob pattern '{}': {}", p, e)))?;
        builder.add(glob);
    }
    builder.build().map_err(|e| ToolError::Validation(format!("Invalid glob set: {}", e)))
}

/// File filters for one replace call
struct FileFilter {
    include: GlobSet,
    exclude: GlobSet,
    defaults: GlobSet,
}

impl FileFilter {
    fn new(include: &str, exclude: &str) -> Result<Self, ToolError> {
        let mut include = split_patterns(include);
        if include.is_empty() {
            include.push("*".to_string());
        }
        let defaults: Vec<String> = DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect();
        Ok(Self {
            include: build_globs(&include)?,
            exclude: build_globs(&split_patterns(exclude))?,
            defaults: build_globs(&defaults)?,
        })
    }

    fn is_default_excluded(&self, name: &str) -> bool {
        self.defaults.is_match(name)
    }

    /// `relative` is the path below the search root
    fn accepts(&self, relative: &Path) -> bool {
        let name = relative.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
        let components: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect();

        if components.iter().any(|c| self.defaults.is_match(c)) {
            return false;
        }
        if self.exclude.is_match(&name)
            || self.exclude.is_match(relative)
            || components.iter().any(|c| self.exclude.is_match(c))
        {
            return false;
        }
        self.include.is_match(&name) || self.include.is_match(relative)
    }
}

fn tail_chars(s: &str, n: usize) -> &str {
    match s.char_indices().rev().nth(n.saturating_sub(1)) {
        Some((idx, _)) if n > 0 => &s[idx..],
        _ if n == 0 => "",
        _ => s,
    }
}

fn head_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Turn a replacement string into a `regex` expansion template.
/// Group references are written `\1`, `\g<1>` or `\g<name>`; `$` is always literal.
fn replacement_template(replacement: &str) -> String {
    let mut out = String::with_capacity(replacement.len());
    let mut chars = replacement.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '$' => out.push_str("$$"),
            '\\' => match chars.peek().copied() {
                Some(d) if d.is_ascii_digit() => {
                    let mut group = String::new();
                    while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
                        group.push(d);
                        chars.next();
                    }
                    out.push_str(&format!("${{{}}}", group));
                }
                Some('g') => {
                    let rest: String = chars.clone().skip(1).collect();
                    match rest.strip_prefix('<').and_then(|r| r.find('>').map(|end| r[..end].to_string())) {
                        Some(name) if !name.is_empty() => {
                            // consume "g<name>"
                            for _ in 0..name.chars().count() + 3 {
                                chars.next();
                            }
                            out.push_str(&format!("${{{}}}", name));
                        }
                        _ => out.push('\\'),
                    }
                }
                Some('\\') => {
                    chars.next();
                    out.push('\\');
                }
                _ => out.push('\\'),
            },
            other => out.push(other),
        }
    }
    out
}

/// Rewrite one file. Ok(None) when nothing matched or the file is not UTF-8 text.
fn process_file(path: &Path, regex: &Regex, replacement: &str) -> Result<Option<FileChanges>, String> {
    let bytes = std::fs::read(path).map_err(|e| e.to_string())?;
    let content = match String::from_utf8(bytes) {
        Ok(c) => c,
        Err(_) => {
            log::debug!("Skipping non-UTF-8 file {:?}", path);
            return Ok(None);
        }
    };

    let mut changes = Vec::new();
    for caps in regex.captures_iter(&content) {
        let Some(m) = caps.get(0) else { continue };
        let mut replaced = String::new();
        caps.expand(replacement, &mut replaced);
        changes.push(MatchChange {
            line_number: content[..m.start()].matches('\n').count() + 1,
            original: m.as_str().to_string(),
            replacement: replaced,
            context: format!(
                "{}[{}]{}",
                tail_chars(&content[..m.start()], CONTEXT_CHARS),
                m.as_str(),
                head_chars(&content[m.end()..], CONTEXT_CHARS)
            ),
        });
    }
    if changes.is_empty() {
        return Ok(None);
    }

    let updated = regex.replace_all(&content, replacement);
    std::fs::write(path, updated.as_bytes()).map_err(|e| e.to_string())?;

    Ok(Some(FileChanges {
        file: path.display().to_string(),
        matches: changes.len(),
        changes,
    }))
}

pub struct SearchReplaceEngine {
    scope: Arc<PathScope>,
    concurrency: usize,
}

impl SearchReplaceEngine {
    pub fn new(scope: Arc<PathScope>, concurrency: usize) -> Self {
        Self { scope, concurrency: concurrency.max(1) }
    }

    /// Collect candidate files under the safe search paths
    fn candidates(&self, roots: &[PathBuf], filter: &FileFilter) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for root in roots {
            if root.is_file() {
                let name = root.file_name().map(PathBuf::from).unwrap_or_default();
                if filter.accepts(&name) {
                    files.push(root.clone());
                }
                continue;
            }
            let walker = WalkDir::new(root).sort_by_file_name().into_iter().filter_entry(|e| {
                e.depth() == 0 || !filter.is_default_excluded(&e.file_name().to_string_lossy())
            });
            for entry in walker.filter_map(|e| e.ok()) {
                if !entry.file_type().is_file() {
                    continue;
                }
                let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
                if filter.accepts(relative) {
                    files.push(entry.path().to_path_buf());
                }
            }
        }
        files.sort();
        files.dedup();
        files
    }

    /// Replace every match of `query` with `replacement` across the search paths.
    ///
    /// Err only for an invalid regex or glob (nothing touched). Per-file
    /// failures land in the report with `success = false`.
    pub async fn replace(
        &self,
        query: &str,
        replacement: &str,
        options: &ReplaceOptions,
        default_root: &Path,
    ) -> Result<ReplaceReport, ToolError> {
        let regex = RegexBuilder::new(query)
            .case_insensitive(!options.case_sensitive.unwrap_or(true))
            .build()
            .map_err(|e| ToolError::Validation(format!("Invalid regex pattern: {}", e)))?;
        let filter = FileFilter::new(
            options.include_pattern.as_deref().unwrap_or("*"),
            options.exclude_pattern.as_deref().unwrap_or(""),
        )?;

        let requested: Vec<PathBuf> = match &options.search_paths {
            Some(paths) if !paths.is_empty() => {
                paths.iter().map(|p| path_safety::resolve_against(default_root, p)).collect()
            }
            _ => vec![path_safety::normalize(default_root)],
        };

        let mut report = ReplaceReport::empty();
        let mut roots = Vec::new();
        for path in requested {
            match path_safety::is_safe(&path, &self.scope) {
                Ok(()) => roots.push(path),
                Err(reason) => {
                    log::warn!("search_replace skipping unsafe path: {}", reason);
                    report.skipped_paths.push(path.display().to_string());
                }
            }
        }

        let files = self.candidates(&roots, &filter);
        log::debug!("search_replace: {} candidate files for {:?}", files.len(), query);

        let regex = Arc::new(regex);
        let replacement: Arc<str> = Arc::from(replacement_template(replacement));
        let shared = Arc::new(Mutex::new(report));
        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for file in files {
            let regex = Arc::clone(&regex);
            let replacement = Arc::clone(&replacement);
            let shared = Arc::clone(&shared);
            let permits = Arc::clone(&permits);
            tasks.spawn(async move {
                let Ok(_permit) = permits.acquire_owned().await else { return };
                let target = file.clone();
                let outcome = tokio::task::spawn_blocking(move || process_file(&target, &regex, &replacement))
                    .await
                    .unwrap_or_else(|e| Err(format!("worker failed: {}", e)));

                let mut agg = shared.lock().await;
                match outcome {
                    Ok(Some(changes)) => {
                        agg.files_affected += 1;
                        agg.matches += changes.matches;
                        agg.changes.push(changes);
                    }
                    Ok(None) => {}
                    Err(e) => {
                        let msg = format!("Error processing file {}: {}", file.display(), e);
                        log::error!("{}", msg);
                        agg.success = false;
                        agg.error = Some(msg);
                        agg.failed_files.push(file.display().to_string());
                    }
                }
            });
        }
        while tasks.join_next().await.is_some() {}

        let mut report = std::mem::replace(&mut *shared.lock().await, ReplaceReport::empty());
        report.changes.sort_by(|a, b| a.file.cmp(&b.file));
        report.failed_files.sort();
        Ok(report)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> SearchReplaceEngine {
        SearchReplaceEngine::new(Arc::new(PathScope::new(vec![], vec!["/etc".into()])), 4)
    }

    fn opts(include: &str) -> ReplaceOptions {
        ReplaceOptions { include_pattern: Some(include.to_string()), ..Default::default() }
    }

    #[tokio::test]
    async fn include_pattern_limits_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "foo foo").unwrap();
        std::fs::write(dir.path().join("b.md"), "foo").unwrap();

        let report = engine().replace("foo", "bar", &opts("*.txt"), dir.path()).await.unwrap();
        assert!(report.success);
        assert_eq!(report.files_affected, 1);
        assert_eq!(report.matches, 2);
        assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "bar bar");
        assert_eq!(std::fs::read_to_string(dir.path().join("b.md")).unwrap(), "foo");
    }

    #[tokio::test]
    async fn second_run_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "foo foo").unwrap();

        let first = engine().replace("foo", "bar", &ReplaceOptions::default(), dir.path()).await.unwrap();
        assert_eq!(first.matches, 2);
        let second = engine().replace("foo", "bar", &ReplaceOptions::default(), dir.path()).await.unwrap();
        assert_eq!(second.matches, 0);
        assert_eq!(second.files_affected, 0);
    }

    #[tokio::test]
    async fn invalid_regex_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "foo(").unwrap();
        let err = engine().replace("foo(", "x", &ReplaceOptions::default(), dir.path()).await.unwrap_err();
        assert!(err.to_string().starts_with("Invalid regex pattern"));
        assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "foo(");
    }

    #[tokio::test]
    async fn default_exclusions_cannot_be_turned_off() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("node_modules/lib")).unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("node_modules/lib/index.js"), "oldName").unwrap();
        std::fs::write(dir.path().join("src/app.js"), "oldName()").unwrap();
        std::fs::write(dir.path().join("debug.log"), "oldName").unwrap();

        let report = engine()
            .replace("oldName", "newName", &opts("*.js,*.log"), dir.path())
            .await
            .unwrap();
        assert_eq!(report.files_affected, 1);
        assert_eq!(std::fs::read_to_string(dir.path().join("node_modules/lib/index.js")).unwrap(), "oldName");
        assert_eq!(std::fs::read_to_string(dir.path().join("debug.log")).unwrap(), "oldName");
        assert_eq!(std::fs::read_to_string(dir.path().join("src/app.js")).unwrap(), "newName()");
    }

    #[tokio::test]
    async fn caller_excludes_extend_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("generated")).unwrap();
        std::fs::write(dir.path().join("generated/api.ts"), "Foo").unwrap();
        std::fs::write(dir.path().join("main.ts"), "Foo").unwrap();
        std::fs::write(dir.path().join("main.test.ts"), "Foo").unwrap();

        let options = ReplaceOptions {
            exclude_pattern: Some("generated, *.test.ts".to_string()),
            ..Default::default()
        };
        let report = engine().replace("Foo", "Bar", &options, dir.path()).await.unwrap();
        assert_eq!(report.files_affected, 1);
        assert!(report.changes[0].file.ends_with("main.ts"));
    }

    #[tokio::test]
    async fn records_line_context_and_captures() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.js"), "let x = 1;\nconst userName = getUser();\n").unwrap();

        let options = ReplaceOptions { case_sensitive: Some(false), ..Default::default() };
        let report = engine()
            .replace(r"get(user)\(\)", r"fetch_\1()", &options, dir.path())
            .await
            .unwrap();
        let change = &report.changes[0].changes[0];
        assert_eq!(change.line_number, 2);
        assert_eq!(change.original, "getUser()");
        assert_eq!(change.replacement, "fetch_User()");
        assert_eq!(change.context, "1;\nconst userName = [getUser()];\n");
    }

    #[tokio::test]
    async fn dollar_signs_are_written_literally() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.ts");
        std::fs::write(&file, "const msg = greeting;\n").unwrap();

        let report = engine()
            .replace("greeting", "`Hello ${name}` + $total", &ReplaceOptions::default(), dir.path())
            .await
            .unwrap();
        assert_eq!(report.matches, 1);
        assert_eq!(report.changes[0].changes[0].replacement, "`Hello ${name}` + $total");
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "const msg = `Hello ${name}` + $total;\n");
    }

    #[test]
    fn replacement_template_maps_backslash_groups() {
        assert_eq!(replacement_template(r"fetch_\1()"), "fetch_${1}()");
        assert_eq!(replacement_template(r"\g<2>x\g<word>"), "${2}x${word}");
        assert_eq!(replacement_template("$HOME ${x}"), "$$HOME $${x}");
        assert_eq!(replacement_template(r"a\\b \n \g"), r"a\b \n \g");
    }

    #[tokio::test]
    async fn unsafe_search_paths_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "foo").unwrap();
        let options = ReplaceOptions {
            search_paths: Some(vec!["/etc".to_string(), dir.path().display().to_string()]),
            ..Default::default()
        };
        let report = engine().replace("foo", "bar", &options, dir.path()).await.unwrap();
        assert_eq!(report.skipped_paths, vec!["/etc".to_string()]);
        assert_eq!(report.files_affected, 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn one_failing_file_does_not_abort_others() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let locked = dir.path().join("locked.txt");
        std::fs::write(&locked, "foo").unwrap();
        std::fs::write(dir.path().join("open.txt"), "foo").unwrap();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o444)).unwrap();

        let report = engine().replace("foo", "bar", &ReplaceOptions::default(), dir.path()).await.unwrap();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o644)).unwrap();

        assert_eq!(std::fs::read_to_string(dir.path().join("open.txt")).unwrap(), "bar");
        // root ignores read-only bits; only assert the failure path when it fired
        if !report.success {
            assert_eq!(report.files_affected, 1);
            assert!(report.error.as_deref().unwrap().contains("locked.txt"));
        }
    }

    #[test]
    fn context_helpers_respect_char_boundaries() {
        assert_eq!(tail_chars("héllo wörld", 3), "rld");
        assert_eq!(tail_chars("ab", 20), "ab");
        assert_eq!(head_chars("ünïcode", 3), "ünï");
        assert_eq!(head_chars("ab", 20), "ab");
    }
}
