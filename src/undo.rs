/// Undo functionality for reverting the most recent organize session.
///
/// The history log is read back, the last session-start marker located, and every
/// `Moved` record after it reversed in reverse chronological order. Deletions are
/// never recorded as reversible and are not attempted.
use crate::history::{
    EntryKind, HISTORY_FILE_NAME, HistoryEntry, HistoryError, HistoryResult, SessionHistory,
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Represents the result of an undo operation.
#[derive(Debug, Default)]
pub struct UndoReport {
    /// Number of files successfully restored (or restorable, in a dry run).
    pub restored_files: usize,
    /// Files that could not be moved back, with the reason.
    pub failed_restores: Vec<(PathBuf, String)>,
    /// Files no longer at their recorded destination.
    pub skipped_files: Vec<(PathBuf, String)>,
}

impl UndoReport {
    /// Returns the total number of operations processed.
    pub fn total_processed(&self) -> usize {
        self.restored_files + self.failed_restores.len() + self.skipped_files.len()
    }

    /// Returns true if the undo was completely successful.
    pub fn is_complete_success(&self) -> bool {
        self.failed_restores.is_empty() && self.skipped_files.is_empty()
    }
}

enum RestoreFailure {
    Missing(PathBuf, String),
    Failed(PathBuf, String),
}

/// Manages undo operations for file organization.
pub struct UndoManager;

impl UndoManager {
    /// Reverses the `Moved` records of the most recent session in `root`'s history.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::NoHistory`] when there is no log or no session marker in
    /// it, and [`HistoryError::InvalidBasePath`] when `root` does not exist. Individual
    /// files that cannot be restored are reported in the [`UndoReport`] instead.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use tidyfold::undo::UndoManager;
    /// use std::path::Path;
    ///
    /// match UndoManager::undo_last_session(Path::new("/path/to/directory"), false) {
    ///     Ok(report) => println!("Restored {} files", report.restored_files),
    ///     Err(e) => eprintln!("Undo failed: {}", e),
    /// }
    /// ```
    pub fn undo_last_session(root: &Path, dry_run: bool) -> HistoryResult<UndoReport> {
        if !root.is_dir() {
            return Err(HistoryError::InvalidBasePath(root.to_path_buf()));
        }

        let history_path = root.join(HISTORY_FILE_NAME);
        let session = SessionHistory::last_session(&history_path)?;
        let moves: Vec<(PathBuf, PathBuf)> = session
            .into_iter()
            .filter(|entry| entry.kind == EntryKind::Moved)
            .filter_map(|entry| Some((entry.source?, entry.destination?)))
            .collect();
        debug!(moves = moves.len(), "reversing last session");

        let mut history = if dry_run {
            SessionHistory::in_memory()
        } else {
            SessionHistory::open(&history_path)
        };

        // Undo is LIFO.
        let mut report = UndoReport::default();
        for (original, moved_to) in moves.iter().rev() {
            match Self::restore_file(original, moved_to, dry_run) {
                Ok(()) => {
                    report.restored_files += 1;
                    history.append_or_warn(HistoryEntry::restored(moved_to, original));
                }
                Err(RestoreFailure::Missing(path, reason)) => {
                    report.skipped_files.push((path, reason));
                }
                Err(RestoreFailure::Failed(path, reason)) => {
                    warn!(path = %path.display(), reason = %reason, "restore failed");
                    report.failed_restores.push((path, reason));
                }
            }
        }

        Ok(report)
    }

    /// Moves `moved_to` back to `original`.
    ///
    /// A different file already sitting at `original` is renamed out of the way first.
    fn restore_file(original: &Path, moved_to: &Path, dry_run: bool) -> Result<(), RestoreFailure> {
        if !moved_to.is_file() {
            return Err(RestoreFailure::Missing(
                moved_to.to_path_buf(),
                "File not found at expected location".to_string(),
            ));
        }
        if dry_run {
            return Ok(());
        }

        if let Some(parent) = original.parent()
            && !parent.exists()
        {
            fs::create_dir_all(parent).map_err(|e| {
                RestoreFailure::Failed(
                    parent.to_path_buf(),
                    format!("Could not recreate directory: {}", e),
                )
            })?;
        }

        if original.exists() {
            let backup_path = Self::generate_backup_path(original);
            fs::rename(original, &backup_path).map_err(|e| {
                RestoreFailure::Failed(
                    original.to_path_buf(),
                    format!("Could not backup conflicting file: {}", e),
                )
            })?;
        }

        fs::rename(moved_to, original).map_err(|e| {
            RestoreFailure::Failed(
                moved_to.to_path_buf(),
                format!("Failed to restore file: {}", e),
            )
        })
    }

    /// Example: `file.txt` becomes `file.txt.bak.20251109-143052`
    fn generate_backup_path(original_path: &Path) -> PathBuf {
        let timestamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
        let filename = original_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());
        original_path.with_file_name(format!("{}.bak.{}", filename, timestamp))
    }
}
