//! Filesystem capability used by `read_file` and `write_file`.
//!
//! [`LocalFileSystem`] writes atomically: content goes to a temporary file in
//! the target directory which is then renamed over the destination, so an
//! interrupted write never leaves a truncated file behind. Missing parent
//! directories are created first. A replaced file keeps its permission bits;
//! a new file gets the usual umask-derived mode.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::{Builder, NamedTempFile};

use crate::tools::BoxFuture;
use crate::{AppError, Result};

/// How the server intends the write to be understood.
///
/// All modes replace the file with the supplied content; the mode only
/// changes how the result is reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WriteMode {
    /// New file.
    #[default]
    Create,
    /// Full rewrite of an existing file.
    Edit,
    /// Targeted change to an existing file.
    Patch,
}

impl WriteMode {
    /// Parse the wire value (`create`, `edit`, `patch`).
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "create" => Some(Self::Create),
            "edit" => Some(Self::Edit),
            "patch" => Some(Self::Patch),
            _ => None,
        }
    }

    /// Past-tense verb used in result messages.
    #[must_use]
    pub fn verb(self) -> &'static str {
        match self {
            Self::Create => "created",
            Self::Edit => "updated",
            Self::Patch => "patched",
        }
    }
}

/// Summary of a completed file write operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteSummary {
    /// Absolute path of the written file.
    pub path: PathBuf,
    /// Number of bytes written.
    pub bytes_written: usize,
    /// Mode the write was requested with.
    pub mode: WriteMode,
}

impl WriteSummary {
    /// Human-readable result line sent back to the server.
    #[must_use]
    pub fn message(&self) -> String {
        format!(
            "File {} {} successfully",
            self.path.display(),
            self.mode.verb()
        )
    }
}

/// Read and write access to files named by tool calls.
pub trait FileSystem: Send + Sync {
    /// Read `path` as UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Io`] when the file is missing or unreadable.
    fn read<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<String>>;

    /// Replace `path` with `content`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Io`] on any directory, write, or rename failure.
    fn write<'a>(
        &'a self,
        path: &'a Path,
        content: &'a str,
        mode: WriteMode,
    ) -> BoxFuture<'a, Result<WriteSummary>>;
}

/// [`FileSystem`] backed by the local disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

impl FileSystem for LocalFileSystem {
    fn read<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            tokio::fs::read_to_string(path)
                .await
                .map_err(|err| AppError::Io(format!("failed to read {}: {err}", path.display())))
        })
    }

    fn write<'a>(
        &'a self,
        path: &'a Path,
        content: &'a str,
        mode: WriteMode,
    ) -> BoxFuture<'a, Result<WriteSummary>> {
        let path = path.to_path_buf();
        let content = content.to_owned();
        Box::pin(async move {
            tokio::task::spawn_blocking(move || write_atomic(&path, &content, mode))
                .await
                .map_err(|err| AppError::Io(format!("write task panicked: {err}")))?
        })
    }
}

/// Write `content` to `path` through a temporary file and rename.
///
/// # Errors
///
/// Returns [`AppError::Io`] on I/O failures (directory creation, temp
/// file write, or rename).
pub fn write_atomic(path: &Path, content: &str, mode: WriteMode) -> Result<WriteSummary> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    std::fs::create_dir_all(parent).map_err(|err| {
        AppError::Io(format!(
            "failed to create parent directories for {}: {err}",
            path.display()
        ))
    })?;

    let existing = std::fs::metadata(path).ok().map(|meta| meta.permissions());
    let mut tmp = temp_file_in(parent)
        .map_err(|err| AppError::Io(format!("failed to create temporary file: {err}")))?;

    let bytes = content.as_bytes();
    tmp.write_all(bytes)
        .map_err(|err| AppError::Io(format!("failed to write temporary file: {err}")))?;

    if let Some(permissions) = existing {
        tmp.as_file().set_permissions(permissions).map_err(|err| {
            AppError::Io(format!(
                "failed to copy permissions of {}: {err}",
                path.display()
            ))
        })?;
    }

    tmp.persist(path).map_err(|err| {
        AppError::Io(format!("failed to persist file to {}: {err}", path.display()))
    })?;

    Ok(WriteSummary {
        path: path.to_path_buf(),
        bytes_written: bytes.len(),
        mode,
    })
}

/// Temporary file in `dir` created with the platform's default file mode
/// (subject to umask) instead of the owner-only mode `tempfile` uses.
fn temp_file_in(dir: &Path) -> std::io::Result<NamedTempFile> {
    #[cfg_attr(not(unix), allow(unused_mut))]
    let mut builder = Builder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(std::fs::Permissions::from_mode(0o666));
    }
    builder.tempfile_in(dir)
}
