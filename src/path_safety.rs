// IDE Agent Gateway - Path Safety Validator
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Decides whether a path lies inside a protected zone:
// - the gateway's own source trees
// - OS-critical root directories
// Pure and synchronous. Runs before any filesystem or shell access.

use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

/// Outcome of a safety check on a path or command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyVerdict {
    pub dangerous: bool,
    pub reason: Option<String>,
}

impl SafetyVerdict {
    pub fn safe() -> Self {
        Self { dangerous: false, reason: None }
    }

    pub fn dangerous(reason: String) -> Self {
        Self { dangerous: true, reason: Some(reason) }
    }
}

/// Absolute prefixes that are off-limits to every tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathScope {
    system_dirs: Vec<PathBuf>,
    protected_roots: Vec<PathBuf>,
}

impl PathScope {
    pub fn new(system_dirs: Vec<PathBuf>, protected_roots: Vec<PathBuf>) -> Self {
        Self {
            system_dirs: system_dirs.iter().map(|p| normalize(p)).collect(),
            protected_roots: protected_roots.iter().map(|p| normalize(p)).collect(),
        }
    }
}

/// Lexically normalize a path: drop `.`, fold `..` (never above the root).
/// Relative input stays relative.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(p) => out.push(p.as_os_str()),
            Component::RootDir => out.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() && !path.has_root() {
                    out.push("..");
                }
            }
            Component::Normal(name) => out.push(name),
        }
    }
    out
}

/// Resolve a tool argument against the session root.
/// Empty, "." and "./" mean the root itself.
pub fn resolve_against(root: &Path, raw: &str) -> PathBuf {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "." || trimmed == "./" {
        return normalize(root);
    }
    let candidate = Path::new(trimmed);
    if candidate.is_absolute() {
        normalize(candidate)
    } else {
        normalize(&root.join(candidate))
    }
}

/// True when `path` is `root` or lies below it (lexical comparison)
pub fn is_within(path: &Path, root: &Path) -> bool {
    normalize(&crate::paths::absolutize(path)).starts_with(normalize(&crate::paths::absolutize(root)))
}

/// Containment after symlink resolution. The parent of `path` must resolve
/// under the resolved `root`; the final component itself is not followed.
pub fn resolves_within(path: &Path, root: &Path) -> bool {
    let absolute = normalize(&crate::paths::absolutize(path));
    let root = normalize(&crate::paths::absolutize(root));
    let (Some(parent), Some(name)) = (absolute.parent(), absolute.file_name()) else {
        return false;
    };
    match (canonical_form(parent), canonical_form(&root)) {
        (Some(parent), Some(root)) => parent.join(name).starts_with(&root),
        _ => false,
    }
}

/// Canonical form of a path that may not exist yet: canonicalize the
/// deepest existing ancestor and re-append the rest.
fn canonical_form(path: &Path) -> Option<PathBuf> {
    if let Ok(p) = std::fs::canonicalize(path) {
        return Some(p);
    }
    let mut tail = Vec::new();
    let mut current = path;
    while let Some(parent) = current.parent() {
        tail.push(current.file_name()?.to_os_string());
        if let Ok(resolved) = std::fs::canonicalize(parent) {
            let mut out = resolved;
            for name in tail.iter().rev() {
                out.push(name);
            }
            return Some(out);
        }
        current = parent;
    }
    None
}

fn check_against(resolved: &Path, shown: &Path, scope: &PathScope) -> Result<(), String> {
    if scope.system_dirs.iter().any(|dir| resolved.starts_with(dir)) {
        return Err(format!("Path '{}' is in a protected system directory", shown.display()));
    }
    if scope.protected_roots.iter().any(|root| resolved.starts_with(root)) {
        return Err(format!("Path '{}' is in a protected system path", shown.display()));
    }
    Ok(())
}

/// Check a path against the protected scope.
///
/// Both the lexical absolute form and the symlink-resolved form are
/// checked, so a link inside the workspace cannot point into a protected tree.
pub fn is_safe(path: &Path, scope: &PathScope) -> Result<(), String> {
    let absolute = normalize(&crate::paths::absolutize(path));
    check_against(&absolute, path, scope)?;

    if let Some(canonical) = canonical_form(&absolute) {
        if canonical != absolute {
            check_against(&canonical, path, scope)?;
        }
    }
    Ok(())
}

/// Same check, shaped as a verdict for reporting
pub fn verdict(path: &Path, scope: &PathScope) -> SafetyVerdict {
    match is_safe(path, scope) {
        Ok(()) => SafetyVerdict::safe(),
        Err(reason) => SafetyVerdict::dangerous(reason),
    }
}

// ============================================================================
// TESTS
// ============================================================================
