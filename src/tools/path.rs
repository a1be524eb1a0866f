//! Tool path resolution against the workspace root.
//!
//! Absolute paths are taken as given. Relative paths are anchored to the
//! workspace root after dropping a leading `workspace/` segment, which older
//! servers prepend to every path. When confinement is enabled the resolved
//! path must also stay inside the canonical root, following symlinks.

use std::path::{Component, Path, PathBuf};

use crate::{AppError, Result};

/// Prefix some servers put in front of workspace-relative paths.
pub const LEGACY_WORKSPACE_PREFIX: &str = "workspace/";

/// The directory a dispatcher resolves relative tool paths against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    root: PathBuf,
    confined: bool,
}

impl Workspace {
    /// Workspace rooted at `root` that accepts any resolved path.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            confined: false,
        }
    }

    /// Workspace rooted at the canonical form of `root` that rejects paths
    /// escaping it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::PathViolation` if `root` cannot be canonicalized.
    pub fn confined(root: impl AsRef<Path>) -> Result<Self> {
        let root = root
            .as_ref()
            .canonicalize()
            .map_err(|err| AppError::PathViolation(format!("workspace root invalid: {err}")))?;
        Ok(Self {
            root,
            confined: true,
        })
    }

    /// Root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether paths outside the root are rejected.
    #[must_use]
    pub fn is_confined(&self) -> bool {
        self.confined
    }

    /// Resolve a tool-supplied path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::PathViolation` if the workspace is confined and the
    /// path escapes it.
    pub fn resolve(&self, raw: &str) -> Result<PathBuf> {
        let resolved = resolve_tool_path(&self.root, raw);
        if self.confined {
            confine(&self.root, &resolved)?;
        }
        Ok(resolved)
    }
}

/// Anchor `raw` to `root` unless it is already absolute.
#[must_use]
pub fn resolve_tool_path(root: &Path, raw: &str) -> PathBuf {
    let candidate = Path::new(raw);
    if candidate.is_absolute() {
        return candidate.to_path_buf();
    }
    let relative = raw.strip_prefix(LEGACY_WORKSPACE_PREFIX).unwrap_or(raw);
    normalize(&root.join(relative))
}

/// Collapse `.` and `..` segments without touching the filesystem.
#[must_use]
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped =
                    matches!(out.components().next_back(), Some(Component::Normal(_))) && out.pop();
                if !popped && !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Check that `candidate` (already absolute and normalized) stays inside
/// `root`, including through symlinks in any existing ancestor.
///
/// # Errors
///
/// Returns `AppError::PathViolation` if:
/// - The workspace root cannot be canonicalized.
/// - The path lies outside the root.
/// - The nearest existing ancestor is a symlink whose target escapes the root.
pub fn confine(root: &Path, candidate: &Path) -> Result<()> {
    let root = root
        .canonicalize()
        .map_err(|err| AppError::PathViolation(format!("workspace root invalid: {err}")))?;
    let candidate = normalize(candidate);

    if !candidate.starts_with(&root) {
        return Err(AppError::PathViolation(format!(
            "{} is outside the workspace",
            candidate.display()
        )));
    }

    // The file itself may not exist yet (writes); check the deepest ancestor
    // that does.
    let existing = candidate.ancestors().find(|p| p.exists());
    if let Some(existing) = existing {
        let canonical = existing
            .canonicalize()
            .map_err(|err| AppError::PathViolation(format!("cannot resolve path: {err}")))?;
        if !canonical.starts_with(&root) {
            return Err(AppError::PathViolation(
                "symlink target escapes workspace".into(),
            ));
        }
    }

    Ok(())
}
