// IDE Agent Gateway - Path Resolution
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Gateway root discovery and the process-wide protected PathScope.
// Both are cached via OnceLock and never mutated after first use.

use crate::path_safety::PathScope;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

static GATE_ROOT_CACHE: OnceLock<PathBuf> = OnceLock::new();
static PATH_SCOPE: OnceLock<Arc<PathScope>> = OnceLock::new();

/// Find the gateway's own install root.
///
/// Resolution order:
///   1. Walk up from binary location looking for Cargo.toml
///   2. IDE_AGENT_ROOT environment variable
///   3. Current working directory
pub fn gate_root() -> &'static Path {
    GATE_ROOT_CACHE.get_or_init(|| {
        if let Ok(exe) = std::env::current_exe() {
            if let Ok(canonical) = exe.canonicalize() {
                let mut dir = canonical.parent();
                while let Some(d) = dir {
                    if d.join("Cargo.toml").exists() {
                        return d.to_path_buf();
                    }
                    dir = d.parent();
                }
            }
        }

        if let Ok(root) = std::env::var("IDE_AGENT_ROOT") {
            let p = PathBuf::from(&root);
            if p.exists() {
                return p;
            }
        }

        std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
    })
}

/// Install the protected scope. First caller wins; later calls get the installed scope back.
pub fn install_scope(scope: PathScope) -> Arc<PathScope> {
    let installed = PATH_SCOPE.get_or_init(|| Arc::new(scope));
    Arc::clone(installed)
}

/// Absolute form of a configured directory, relative to the working directory
pub fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

// ============================================================================
// TESTS
// ============================================================================
