//! JSON session files under the sessions directory.
//!
//! Each session is stored as `<sessions_dir>/<name>.json` holding its
//! metadata and every transcript entry. Files are written through a temp
//! file and rename.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::TranscriptEntry;
use crate::tools::fs::{write_atomic, WriteMode};
use crate::{AppError, Result};

/// Descriptive fields saved with a transcript.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionMetadata {
    /// Model the session talked to, if one was configured.
    pub model: Option<String>,
    /// Workspace root tool calls were resolved against.
    pub workspace: String,
    /// First save time.
    pub created_at: DateTime<Utc>,
    /// Most recent save time.
    pub last_updated: DateTime<Utc>,
}

/// Contents of one session file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionRecord {
    /// Session metadata.
    pub metadata: SessionMetadata,
    /// Recorded messages in order.
    pub entries: Vec<TranscriptEntry>,
}

/// Listing row for `--list-sessions`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    /// Session name (file stem).
    pub name: String,
    /// Model recorded in the metadata.
    pub model: Option<String>,
    /// Most recent save time.
    pub last_updated: DateTime<Utc>,
    /// Number of recorded messages.
    pub entry_count: usize,
}

/// Reads and writes session files.
#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    /// Store rooted at `dir`; the directory is created on first save.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the session files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file for `name`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Transcript`] if `name` is empty or contains
    /// characters outside `[A-Za-z0-9._-]`.
    pub fn path_for(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self.dir.join(format!("{name}.json")))
    }

    /// Save `entries` under `name`.
    ///
    /// `created_at` is kept from an existing file of the same name.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Transcript`] on an invalid name or when the file
    /// cannot be serialized or written.
    pub fn save(
        &self,
        name: &str,
        model: Option<&str>,
        workspace: &Path,
        entries: Vec<TranscriptEntry>,
    ) -> Result<PathBuf> {
        let path = self.path_for(name)?;
        let now = Utc::now();
        let created_at = match self.load(name) {
            Ok(previous) => previous.metadata.created_at,
            Err(AppError::NotFound(_)) => now,
            Err(err) => {
                warn!(name, %err, "existing session file unreadable, overwriting");
                now
            }
        };

        let record = SessionRecord {
            metadata: SessionMetadata {
                model: model.map(str::to_owned),
                workspace: workspace.display().to_string(),
                created_at,
                last_updated: now,
            },
            entries,
        };
        let json = serde_json::to_string_pretty(&record)
            .map_err(|e| AppError::Transcript(format!("failed to serialize session: {e}")))?;
        write_atomic(&path, &json, WriteMode::Edit)
            .map_err(|e| AppError::Transcript(format!("failed to save session {name}: {e}")))?;

        info!(name, path = %path.display(), entries = record.entries.len(), "session saved");
        Ok(path)
    }

    /// Load the session saved under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] when no such session exists, or
    /// [`AppError::Transcript`] when the name is invalid or the file cannot
    /// be parsed.
    pub fn load(&self, name: &str) -> Result<SessionRecord> {
        let path = self.path_for(name)?;
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(AppError::NotFound(format!("session {name}")));
            }
            Err(err) => {
                return Err(AppError::Transcript(format!(
                    "failed to read {}: {err}",
                    path.display()
                )))
            }
        };
        serde_json::from_str(&raw)
            .map_err(|e| AppError::Transcript(format!("invalid session file {}: {e}", path.display())))
    }

    /// Every readable session, most recently updated first.
    ///
    /// Unparseable files are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Transcript`] if the directory exists but cannot be
    /// read. A missing directory yields an empty list.
    pub fn list(&self) -> Result<Vec<SessionSummary>> {
        let dir = match std::fs::read_dir(&self.dir) {
            Ok(dir) => dir,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(AppError::Transcript(format!(
                    "failed to read {}: {err}",
                    self.dir.display()
                )))
            }
        };

        let mut sessions = Vec::new();
        for entry in dir.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match self.load(name) {
                Ok(record) => sessions.push(SessionSummary {
                    name: name.to_owned(),
                    model: record.metadata.model,
                    last_updated: record.metadata.last_updated,
                    entry_count: record.entries.len(),
                }),
                Err(err) => debug!(path = %path.display(), %err, "skipping session file"),
            }
        }

        sessions.sort_by(|a, b| b.last_updated.cmp(&a.last_updated));
        Ok(sessions)
    }
}

fn validate_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if valid {
        Ok(())
    } else {
        Err(AppError::Transcript(format!(
            "invalid session name {name:?}: use letters, digits, '.', '_' or '-'"
        )))
    }
}
