//! Operator-supplied path normalization.
//!
//! Expands a leading `~` to the home directory and a leading `./` to the
//! current directory, then lexically cleans the result.

use std::path::{Component, Path, PathBuf};

use crate::error::{CommanderError, Result};

/// Normalize a path typed by the operator.
pub fn normalize(raw: &str) -> Result<PathBuf> {
    let expanded = if let Some(rest) = raw.strip_prefix('~') {
        home_dir()?.join(rest.trim_start_matches('/'))
    } else if let Some(rest) = raw.strip_prefix("./") {
        std::env::current_dir()?.join(rest)
    } else {
        PathBuf::from(raw)
    };
    Ok(clean(&expanded))
}

/// The current user's home directory.
pub fn home_dir() -> Result<PathBuf> {
    #[cfg(target_os = "windows")]
    let var = "USERPROFILE";
    #[cfg(not(target_os = "windows"))]
    let var = "HOME";

    std::env::var_os(var)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .ok_or_else(|| CommanderError::Path(format!("{} is not set", var)))
}

/// Lexically remove `.` segments and resolve `..` against earlier segments.
pub fn clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = matches!(out.components().next_back(), Some(Component::Normal(_)))
                    && out.pop();
                if !popped && !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}
