//! Append-only session history.
//!
//! Every organize invocation writes a session-start marker followed by one line per
//! outcome to `.tidyfold_history.jsonl` inside the organized directory. Each line is a
//! standalone JSON object:
//!
//! ```text
//! {"timestamp":"2026-10-19T09:12:03+02:00","level":"INFO","kind":"SessionStart","message":"Organize session started in /home/me/Downloads"}
//! {"timestamp":"2026-10-19T09:12:03+02:00","level":"INFO","kind":"Moved","message":"Moved: cat.jpg to /home/me/Downloads/Images","source":"/home/me/Downloads/cat.jpg","destination":"/home/me/Downloads/Images/cat.jpg"}
//! ```
//!
//! Lines are never rewritten. Undo reads the file back and appends its own `Restored`
//! records after the session it reversed.

use crate::file_organizer::MoveOutcome;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File name of the history log, relative to the organized root.
pub const HISTORY_FILE_NAME: &str = ".tidyfold_history.jsonl";

/// What a history line records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryKind {
    SessionStart,
    Moved,
    SkippedDuplicateSameContent,
    SkippedNameCollisionDifferentContent,
    DeletedDuplicate,
    DeletedAged,
    Failed,
    /// Written by undo when a moved file is put back.
    Restored,
}

impl EntryKind {
    pub fn level(&self) -> Level {
        match self {
            EntryKind::Failed => Level::Error,
            EntryKind::SkippedNameCollisionDifferentContent => Level::Warning,
            _ => Level::Info,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Info,
    Warning,
    Error,
}

/// One line of the history log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Local>,
    pub level: Level,
    pub kind: EntryKind,
    /// Human-readable summary, e.g. `Moved: cat.jpg to /home/me/Downloads/Images`.
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<PathBuf>,
}

impl HistoryEntry {
    fn new(
        kind: EntryKind,
        message: String,
        source: Option<PathBuf>,
        destination: Option<PathBuf>,
    ) -> Self {
        Self {
            timestamp: Local::now(),
            level: kind.level(),
            kind,
            message,
            source,
            destination,
        }
    }

    pub fn session_start(root: &Path) -> Self {
        Self::new(
            EntryKind::SessionStart,
            format!("Organize session started in {}", root.display()),
            None,
            None,
        )
    }

    pub fn restored(from: &Path, to: &Path) -> Self {
        Self::new(
            EntryKind::Restored,
            format!("Restored: {} to {}", display_name(from), display_parent(to)),
            Some(from.to_path_buf()),
            Some(to.to_path_buf()),
        )
    }

    /// The record persisted for a move-engine or retention outcome.
    pub fn from_outcome(outcome: &MoveOutcome) -> Self {
        match outcome {
            MoveOutcome::Moved {
                source,
                destination,
            } => Self::new(
                EntryKind::Moved,
                format!(
                    "Moved: {} to {}",
                    display_name(source),
                    display_parent(destination)
                ),
                Some(source.clone()),
                Some(destination.clone()),
            ),
            MoveOutcome::SkippedDuplicateSameContent { source, existing } => Self::new(
                EntryKind::SkippedDuplicateSameContent,
                format!(
                    "Skipped duplicate: {} already in {}",
                    display_name(source),
                    display_parent(existing)
                ),
                Some(source.clone()),
                Some(existing.clone()),
            ),
            MoveOutcome::SkippedNameCollisionDifferentContent { source, existing } => Self::new(
                EntryKind::SkippedNameCollisionDifferentContent,
                format!(
                    "Skipped: a different {} already exists in {}",
                    display_name(source),
                    display_parent(existing)
                ),
                Some(source.clone()),
                Some(existing.clone()),
            ),
            MoveOutcome::DeletedDuplicate { source, existing } => Self::new(
                EntryKind::DeletedDuplicate,
                format!(
                    "Deleted duplicate: {} (kept {})",
                    display_name(source),
                    existing.display()
                ),
                Some(source.clone()),
                Some(existing.clone()),
            ),
            MoveOutcome::DeletedAged { path } => Self::new(
                EntryKind::DeletedAged,
                format!("Deleted old file: {}", path.display()),
                Some(path.clone()),
                None,
            ),
            MoveOutcome::Failed { source, reason } => Self::new(
                EntryKind::Failed,
                format!("Failed: {}: {}", display_name(source), reason),
                Some(source.clone()),
                None,
            ),
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn display_parent(path: &Path) -> String {
    path.parent()
        .map(|p| p.display().to_string())
        .unwrap_or_default()
}

/// Errors raised while writing or reading the history log.
#[derive(Debug)]
pub enum HistoryError {
    /// No log exists, or it holds no session marker.
    NoHistory { path: PathBuf },
    WriteFailed { path: PathBuf, source: io::Error },
    ReadFailed { path: PathBuf, source: io::Error },
    /// The directory the history belongs to does not exist.
    InvalidBasePath(PathBuf),
}

impl std::fmt::Display for HistoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoHistory { path } => {
                write!(f, "No organize session recorded in {}", path.display())
            }
            Self::WriteFailed { path, source } => {
                write!(f, "Failed to write history {}: {}", path.display(), source)
            }
            Self::ReadFailed { path, source } => {
                write!(f, "Failed to read history {}: {}", path.display(), source)
            }
            Self::InvalidBasePath(path) => {
                write!(f, "Directory does not exist: {}", path.display())
            }
        }
    }
}

impl std::error::Error for HistoryError {}

pub type HistoryResult<T> = Result<T, HistoryError>;

/// Single writer of the history log.
///
/// A history opened with [`SessionHistory::in_memory`] keeps entries for reporting
/// without touching disk; dry runs use it so that undo never sees a simulated session.
#[derive(Debug)]
pub struct SessionHistory {
    path: Option<PathBuf>,
    entries: Vec<HistoryEntry>,
}

impl SessionHistory {
    /// A history that appends to the log at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            entries: Vec::new(),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: Vec::new(),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Entries appended through this handle, in order.
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// Writes the session-start marker. Call once per organize invocation.
    pub fn record_start(&mut self, root: &Path) -> HistoryResult<()> {
        self.append(HistoryEntry::session_start(root))
    }

    /// Persists the record for `outcome`.
    pub fn record(&mut self, outcome: &MoveOutcome) -> HistoryResult<()> {
        self.append(HistoryEntry::from_outcome(outcome))
    }

    /// Appends one line and flushes it before returning.
    pub fn append(&mut self, entry: HistoryEntry) -> HistoryResult<()> {
        if let Some(path) = &self.path {
            let line = serde_json::to_string(&entry).map_err(|e| HistoryError::WriteFailed {
                path: path.clone(),
                source: io::Error::new(io::ErrorKind::InvalidData, e),
            })?;
            let wrap = |source| HistoryError::WriteFailed {
                path: path.clone(),
                source,
            };
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(wrap)?;
            writeln!(file, "{}", line).map_err(wrap)?;
            file.flush().map_err(wrap)?;
        }
        self.entries.push(entry);
        Ok(())
    }

    /// Like [`SessionHistory::append`], logging instead of failing.
    ///
    /// A history write problem must not stop the file operation it describes.
    pub fn append_or_warn(&mut self, entry: HistoryEntry) {
        if let Err(e) = self.append(entry) {
            warn!(error = %e, "history entry not persisted");
        }
    }

    /// Reads every parsable entry of the log at `path`.
    ///
    /// Lines that do not parse are skipped with a warning.
    pub fn read_all(path: &Path) -> HistoryResult<Vec<HistoryEntry>> {
        if !path.exists() {
            return Err(HistoryError::NoHistory {
                path: path.to_path_buf(),
            });
        }
        let content = fs::read_to_string(path).map_err(|e| HistoryError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

        let mut entries = Vec::new();
        for (number, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<HistoryEntry>(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(line = number + 1, error = %e, "skipping unreadable history line"),
            }
        }
        debug!(path = %path.display(), entries = entries.len(), "history read");
        Ok(entries)
    }

    /// Entries of the most recent session: from the last start marker to the end of the log.
    pub fn last_session(path: &Path) -> HistoryResult<Vec<HistoryEntry>> {
        let mut entries = Self::read_all(path)?;
        let start = entries
            .iter()
            .rposition(|entry| entry.kind == EntryKind::SessionStart)
            .ok_or_else(|| HistoryError::NoHistory {
                path: path.to_path_buf(),
            })?;
        Ok(entries.split_off(start))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn moved(root: &Path, name: &str, category: &str) -> MoveOutcome {
        MoveOutcome::Moved {
            source: root.join(name),
            destination: root.join(category).join(name),
        }
    }

    #[test]
    fn test_entries_are_appended_one_per_line() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(HISTORY_FILE_NAME);
        let mut history = SessionHistory::open(&path);

        history.record_start(temp_dir.path()).unwrap();
        history
            .record(&moved(temp_dir.path(), "cat.jpg", "Images"))
            .unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.contains("\"kind\":\"SessionStart\""));
        assert!(content.contains("Moved: cat.jpg to "));
        assert!(content.contains("\"level\":\"INFO\""));
    }

    #[test]
    fn test_existing_lines_are_never_rewritten() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(HISTORY_FILE_NAME);

        let mut first = SessionHistory::open(&path);
        first.record_start(temp_dir.path()).unwrap();
        let before = fs::read_to_string(&path).unwrap();

        let mut second = SessionHistory::open(&path);
        second.record_start(temp_dir.path()).unwrap();
        let after = fs::read_to_string(&path).unwrap();

        assert!(after.starts_with(&before));
        assert_eq!(after.lines().count(), 2);
    }

    #[test]
    fn test_in_memory_history_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let mut history = SessionHistory::in_memory();
        history.record_start(temp_dir.path()).unwrap();
        history
            .record(&moved(temp_dir.path(), "a.pdf", "Documents"))
            .unwrap();

        assert_eq!(history.entries().len(), 2);
        assert!(history.path().is_none());
        assert!(!temp_dir.path().join(HISTORY_FILE_NAME).exists());
    }

    #[test]
    fn test_last_session_starts_at_latest_marker() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let path = root.join(HISTORY_FILE_NAME);
        let mut history = SessionHistory::open(&path);

        history.record_start(root).unwrap();
        history.record(&moved(root, "old.jpg", "Images")).unwrap();
        history.record_start(root).unwrap();
        history.record(&moved(root, "new.jpg", "Images")).unwrap();
        history
            .record(&MoveOutcome::Failed {
                source: root.join("locked.pdf"),
                reason: "permission denied".to_string(),
            })
            .unwrap();

        let session = SessionHistory::last_session(&path).unwrap();
        assert_eq!(session.len(), 3);
        assert_eq!(session[0].kind, EntryKind::SessionStart);
        assert_eq!(session[1].source.as_deref(), Some(root.join("new.jpg").as_path()));
        assert_eq!(session[2].level, Level::Error);
    }

    #[test]
    fn test_missing_log_and_missing_marker_mean_no_history() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(HISTORY_FILE_NAME);
        assert!(matches!(
            SessionHistory::last_session(&path),
            Err(HistoryError::NoHistory { .. })
        ));

        let mut history = SessionHistory::open(&path);
        history
            .record(&MoveOutcome::DeletedAged {
                path: temp_dir.path().join("ancient.log"),
            })
            .unwrap();
        assert!(matches!(
            SessionHistory::last_session(&path),
            Err(HistoryError::NoHistory { .. })
        ));
    }

    #[test]
    fn test_garbage_lines_are_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(HISTORY_FILE_NAME);
        let mut history = SessionHistory::open(&path);
        history.record_start(temp_dir.path()).unwrap();

        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "2026-10-19 12:00:00 - INFO - hand edited").unwrap();
        drop(file);

        history
            .record(&moved(temp_dir.path(), "b.png", "Images"))
            .unwrap();
        let entries = SessionHistory::read_all(&path).unwrap();
        assert_eq!(entries.len(), 2);
    }
}
