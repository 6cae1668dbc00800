/// The move engine: classify a file, work out where it belongs, and put it there.
///
/// For every candidate the engine runs the same sequence:
/// skip checks → classification → target resolution → duplicate check →
/// name-collision check → move. Per-file problems come back as
/// [`MoveOutcome::Failed`] instead of errors so a run never stops halfway.
use crate::context::RunContext;
use crate::duplicates::is_duplicate;
use crate::history::{EntryKind, HistoryEntry, SessionHistory};
use crate::notifier::Notifier;
use chrono::{DateTime, Local};
use std::fs::{self, Metadata};
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, warn};

/// What happened to one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    Moved {
        source: PathBuf,
        destination: PathBuf,
    },
    /// The target already holds an identical file; the source was left alone.
    SkippedDuplicateSameContent { source: PathBuf, existing: PathBuf },
    /// The target holds a different file with the same name; nothing is overwritten.
    SkippedNameCollisionDifferentContent { source: PathBuf, existing: PathBuf },
    DeletedDuplicate { source: PathBuf, existing: PathBuf },
    DeletedAged { path: PathBuf },
    Failed { source: PathBuf, reason: String },
}

impl MoveOutcome {
    pub fn kind(&self) -> EntryKind {
        match self {
            Self::Moved { .. } => EntryKind::Moved,
            Self::SkippedDuplicateSameContent { .. } => EntryKind::SkippedDuplicateSameContent,
            Self::SkippedNameCollisionDifferentContent { .. } => {
                EntryKind::SkippedNameCollisionDifferentContent
            }
            Self::DeletedDuplicate { .. } => EntryKind::DeletedDuplicate,
            Self::DeletedAged { .. } => EntryKind::DeletedAged,
            Self::Failed { .. } => EntryKind::Failed,
        }
    }

    /// The file the outcome is about.
    pub fn source(&self) -> &Path {
        match self {
            Self::Moved { source, .. }
            | Self::SkippedDuplicateSameContent { source, .. }
            | Self::SkippedNameCollisionDifferentContent { source, .. }
            | Self::DeletedDuplicate { source, .. }
            | Self::Failed { source, .. } => source,
            Self::DeletedAged { path } => path,
        }
    }

    pub fn is_moved(&self) -> bool {
        matches!(self, Self::Moved { .. })
    }
}

/// A file under consideration, re-read from disk every time.
#[derive(Debug, Clone)]
pub struct FileCandidate {
    pub path: PathBuf,
    pub name: String,
    /// Extension with its leading dot (`".jpg"`), or empty when none could be found.
    pub extension: String,
    pub modified: SystemTime,
}

impl FileCandidate {
    /// Reads the metadata of `path` and builds a candidate from it.
    pub fn from_path(path: &Path) -> io::Result<Self> {
        let metadata = fs::metadata(path)?;
        Ok(Self::from_metadata(path, &metadata))
    }

    /// Builds a candidate from already-fetched metadata.
    ///
    /// Files without an extension get one sniffed from their content header, when
    /// the header is recognizable.
    pub fn from_metadata(path: &Path, metadata: &Metadata) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = match path.extension() {
            Some(ext) => format!(".{}", ext.to_string_lossy()),
            None => sniff_extension(path).unwrap_or_default(),
        };
        Self {
            path: path.to_path_buf(),
            name,
            extension,
            modified: metadata.modified().unwrap_or_else(|_| SystemTime::now()),
        }
    }
}

fn sniff_extension(path: &Path) -> Option<String> {
    match infer::get_from_path(path) {
        Ok(Some(kind)) => {
            debug!(path = %path.display(), mime = kind.mime_type(), "sniffed extensionless file");
            Some(format!(".{}", kind.extension()))
        }
        Ok(None) => None,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "could not sniff file header");
            None
        }
    }
}

/// Where a candidate should end up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetLocation {
    pub category: String,
    /// The directory the file moves into.
    pub dir: PathBuf,
}

impl TargetLocation {
    /// `<root>/<category>`, or `<root>/<category>/<year>/<month name>` when organizing by date.
    pub fn resolve(context: &RunContext, candidate: &FileCandidate) -> Self {
        let category = context.categories.classify(&candidate.extension).to_string();
        let mut dir = context.root.join(&category);
        if context.settings.organize_by_date {
            let modified: DateTime<Local> = candidate.modified.into();
            dir = dir
                .join(modified.format("%Y").to_string())
                .join(modified.format("%B").to_string());
        }
        Self { category, dir }
    }

    pub fn destination_for(&self, candidate: &FileCandidate) -> PathBuf {
        self.dir.join(&candidate.name)
    }
}

/// Errors that can occur while moving or deleting a single file.
#[derive(Debug)]
pub enum OrganizeError {
    /// Failed to create a category directory.
    DirectoryCreationFailed {
        path: PathBuf,
        source: io::Error,
    },
    /// Failed to move a file to its category directory.
    FileMoveFailure {
        source: PathBuf,
        destination: PathBuf,
        source_error: io::Error,
    },
    /// Failed to remove a duplicate or aged file.
    DeleteFailed { path: PathBuf, source: io::Error },
    /// The base directory path is invalid or doesn't exist.
    InvalidBasePath { path: PathBuf, source: io::Error },
}

impl std::fmt::Display for OrganizeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DirectoryCreationFailed { path, source } => {
                write!(
                    f,
                    "Failed to create directory {}: {}",
                    path.display(),
                    source
                )
            }
            Self::FileMoveFailure {
                source,
                destination,
                source_error,
            } => {
                write!(
                    f,
                    "Failed to move {} to {}: {}",
                    source.display(),
                    destination.display(),
                    source_error
                )
            }
            Self::DeleteFailed { path, source } => {
                write!(f, "Failed to delete {}: {}", path.display(), source)
            }
            Self::InvalidBasePath { path, source } => {
                write!(f, "Invalid base path {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for OrganizeError {}

/// Result type for file organization operations.
pub type OrganizeResult<T> = Result<T, OrganizeError>;

/// Fails unless `root` is an existing directory.
pub fn ensure_root(root: &Path) -> OrganizeResult<()> {
    match fs::metadata(root) {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(OrganizeError::InvalidBasePath {
            path: root.to_path_buf(),
            source: io::Error::new(io::ErrorKind::InvalidInput, "not a directory"),
        }),
        Err(e) => Err(OrganizeError::InvalidBasePath {
            path: root.to_path_buf(),
            source: e,
        }),
    }
}

/// Runs the move sequence for files of one root directory.
pub struct FileOrganizer<'a> {
    context: &'a RunContext,
    notifier: &'a dyn Notifier,
}

impl<'a> FileOrganizer<'a> {
    pub fn new(context: &'a RunContext, notifier: &'a dyn Notifier) -> Self {
        Self { context, notifier }
    }

    pub fn context(&self) -> &RunContext {
        self.context
    }

    /// Evaluates whatever is at `path` now.
    ///
    /// Returns `None` without touching anything for directories, vanished paths,
    /// filtered or engine-owned files, and files already sitting at their target.
    pub fn process_path(&self, path: &Path) -> Option<MoveOutcome> {
        if self.context.is_artifact(path) {
            debug!(path = %path.display(), "skipping own artifact");
            return None;
        }

        let metadata = match fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "path vanished before processing");
                return None;
            }
            Err(e) => {
                return Some(MoveOutcome::Failed {
                    source: path.to_path_buf(),
                    reason: e.to_string(),
                });
            }
        };
        if !metadata.is_file() {
            return None;
        }
        if !self.context.filters.should_include(self.context.relative(path)) {
            debug!(path = %path.display(), "excluded by filters");
            return None;
        }

        let candidate = FileCandidate::from_metadata(path, &metadata);
        let target = TargetLocation::resolve(self.context, &candidate);
        if path.parent() == Some(target.dir.as_path()) {
            return None;
        }
        Some(self.process_at(&candidate, &target))
    }

    /// Runs classification through move for one candidate.
    pub fn process(&self, candidate: &FileCandidate) -> MoveOutcome {
        let target = TargetLocation::resolve(self.context, candidate);
        self.process_at(candidate, &target)
    }

    fn process_at(&self, candidate: &FileCandidate, target: &TargetLocation) -> MoveOutcome {
        let source = candidate.path.clone();
        let destination = target.destination_for(candidate);
        let dry_run = self.context.dry_run;

        if is_duplicate(&source, &target.dir) {
            if !self.context.settings.delete_duplicates {
                return MoveOutcome::SkippedDuplicateSameContent {
                    source,
                    existing: destination,
                };
            }
            if !dry_run && let Err(e) = fs::remove_file(&source) {
                let error = OrganizeError::DeleteFailed {
                    path: source.clone(),
                    source: e,
                };
                return MoveOutcome::Failed {
                    source,
                    reason: error.to_string(),
                };
            }
            return MoveOutcome::DeletedDuplicate {
                source,
                existing: destination,
            };
        }

        if fs::symlink_metadata(&destination).is_ok() {
            return MoveOutcome::SkippedNameCollisionDifferentContent {
                source,
                existing: destination,
            };
        }

        if dry_run {
            return MoveOutcome::Moved {
                source,
                destination,
            };
        }

        match Self::relocate(&source, &target.dir, &destination) {
            Ok(()) => MoveOutcome::Moved {
                source,
                destination,
            },
            Err(e) => MoveOutcome::Failed {
                source,
                reason: e.to_string(),
            },
        }
    }

    fn relocate(source: &Path, dir: &Path, destination: &Path) -> OrganizeResult<()> {
        fs::create_dir_all(dir).map_err(|e| OrganizeError::DirectoryCreationFailed {
            path: dir.to_path_buf(),
            source: e,
        })?;
        fs::rename(source, destination).map_err(|e| OrganizeError::FileMoveFailure {
            source: source.to_path_buf(),
            destination: destination.to_path_buf(),
            source_error: e,
        })
    }

    /// Persists `outcome` and sends the notification a successful move earns.
    pub fn commit(&self, outcome: &MoveOutcome, history: &mut SessionHistory) {
        history.append_or_warn(HistoryEntry::from_outcome(outcome));

        if let MoveOutcome::Moved {
            source,
            destination,
        } = outcome
            && self.context.settings.notifications_enabled
            && !self.context.dry_run
        {
            let name = source
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let folder = destination
                .parent()
                .map(|p| self.context.relative(p).display().to_string())
                .unwrap_or_default();
            if let Err(e) = self
                .notifier
                .notify("File organized", &format!("{} → {}", name, folder))
            {
                warn!(error = %e, "notification not delivered");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OrganizeSettings;
    use crate::file_category::CategoryTable;
    use crate::notifier::{NotifyError, NullNotifier};
    use std::cell::RefCell;
    use tempfile::TempDir;

    fn context(root: &Path) -> RunContext {
        RunContext::new(root)
    }

    #[test]
    fn test_moves_into_category_directory() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let file = root.join("photo.JPG");
        fs::write(&file, b"jpeg").unwrap();

        let ctx = context(root);
        let organizer = FileOrganizer::new(&ctx, &NullNotifier);
        let outcome = organizer.process_path(&file).unwrap();

        assert_eq!(
            outcome,
            MoveOutcome::Moved {
                source: file.clone(),
                destination: root.join("Images").join("photo.JPG"),
            }
        );
        assert!(!file.exists());
        assert!(root.join("Images/photo.JPG").is_file());
    }

    #[test]
    fn test_unknown_extension_goes_to_others() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let file = root.join("notes.qwerty");
        fs::write(&file, b"?").unwrap();

        let ctx = context(root);
        let organizer = FileOrganizer::new(&ctx, &NullNotifier);
        assert!(organizer.process_path(&file).unwrap().is_moved());
        assert!(root.join("Others/notes.qwerty").is_file());
    }

    #[test]
    fn test_custom_category_table() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let source = root.join("main.rs");
        let image = root.join("logo.png");
        fs::write(&source, b"fn main() {}").unwrap();
        fs::write(&image, b"png").unwrap();

        let ctx = context(root)
            .with_categories(CategoryTable::empty().with_category("Code", [".rs"]));
        let organizer = FileOrganizer::new(&ctx, &NullNotifier);
        organizer.process_path(&source).unwrap();
        organizer.process_path(&image).unwrap();

        assert!(root.join("Code/main.rs").is_file());
        assert!(root.join("Others/logo.png").is_file());
    }

    #[test]
    fn test_extensionless_file_is_sniffed() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let file = root.join("scan");
        fs::write(&file, b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n").unwrap();

        let candidate = FileCandidate::from_path(&file).unwrap();
        assert_eq!(candidate.extension, ".pdf");

        let ctx = context(root);
        let organizer = FileOrganizer::new(&ctx, &NullNotifier);
        organizer.process_path(&file).unwrap();
        assert!(root.join("Documents/scan").is_file());
    }

    #[test]
    fn test_directories_and_artifacts_are_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir(root.join("Folder.zip")).unwrap();
        let ctx = context(root);
        fs::write(ctx.history_path(), b"").unwrap();

        let organizer = FileOrganizer::new(&ctx, &NullNotifier);
        assert!(organizer.process_path(&root.join("Folder.zip")).is_none());
        assert!(organizer.process_path(&ctx.history_path()).is_none());
        assert!(organizer.process_path(&root.join("missing.txt")).is_none());
    }

    #[test]
    fn test_file_already_in_place_is_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir(root.join("Images")).unwrap();
        let placed = root.join("Images/cat.png");
        fs::write(&placed, b"png").unwrap();

        let ctx = context(root);
        let organizer = FileOrganizer::new(&ctx, &NullNotifier);
        assert!(organizer.process_path(&placed).is_none());
        assert!(placed.exists());
    }

    #[test]
    fn test_duplicate_is_skipped_by_default() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir(root.join("Documents")).unwrap();
        fs::write(root.join("Documents/report.csv"), b"1,2,3").unwrap();
        let file = root.join("report.csv");
        fs::write(&file, b"1,2,3").unwrap();

        let ctx = context(root);
        let organizer = FileOrganizer::new(&ctx, &NullNotifier);
        let outcome = organizer.process_path(&file).unwrap();

        assert_eq!(outcome.kind(), EntryKind::SkippedDuplicateSameContent);
        assert!(file.exists());
    }

    #[test]
    fn test_duplicate_is_deleted_when_enabled() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir(root.join("Documents")).unwrap();
        fs::write(root.join("Documents/report.csv"), b"1,2,3").unwrap();
        let file = root.join("report.csv");
        fs::write(&file, b"1,2,3").unwrap();

        let ctx = context(root).with_settings(OrganizeSettings {
            delete_duplicates: true,
            ..OrganizeSettings::default()
        });
        let organizer = FileOrganizer::new(&ctx, &NullNotifier);
        let outcome = organizer.process_path(&file).unwrap();

        assert_eq!(outcome.kind(), EntryKind::DeletedDuplicate);
        assert!(!file.exists());
        assert!(root.join("Documents/report.csv").exists());
    }

    #[test]
    fn test_name_collision_never_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir(root.join("Documents")).unwrap();
        fs::write(root.join("Documents/report.csv"), b"old").unwrap();
        let file = root.join("report.csv");
        fs::write(&file, b"new").unwrap();

        let ctx = context(root).with_settings(OrganizeSettings {
            delete_duplicates: true,
            ..OrganizeSettings::default()
        });
        let organizer = FileOrganizer::new(&ctx, &NullNotifier);
        let outcome = organizer.process_path(&file).unwrap();

        assert_eq!(outcome.kind(), EntryKind::SkippedNameCollisionDifferentContent);
        assert_eq!(fs::read(&file).unwrap(), b"new");
        assert_eq!(fs::read(root.join("Documents/report.csv")).unwrap(), b"old");
    }

    #[test]
    fn test_dry_run_reports_without_mutating() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let file = root.join("song.mp3");
        fs::write(&file, b"id3").unwrap();

        let ctx = context(root).with_dry_run(true);
        let organizer = FileOrganizer::new(&ctx, &NullNotifier);
        let outcome = organizer.process_path(&file).unwrap();

        assert_eq!(
            outcome,
            MoveOutcome::Moved {
                source: file.clone(),
                destination: root.join("Music/song.mp3"),
            }
        );
        assert!(file.exists());
        assert!(!root.join("Music").exists());
    }

    #[test]
    fn test_organize_by_date_nests_year_and_month() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let file = root.join("clip.mp4");
        fs::write(&file, b"mp4").unwrap();

        let ctx = context(root).with_settings(OrganizeSettings {
            organize_by_date: true,
            ..OrganizeSettings::default()
        });
        let candidate = FileCandidate::from_path(&file).unwrap();
        let target = TargetLocation::resolve(&ctx, &candidate);
        let modified: DateTime<Local> = candidate.modified.into();

        assert_eq!(target.category, "Videos");
        assert_eq!(
            target.dir,
            root.join("Videos")
                .join(modified.format("%Y").to_string())
                .join(modified.format("%B").to_string())
        );

        let organizer = FileOrganizer::new(&ctx, &NullNotifier);
        assert!(organizer.process(&candidate).is_moved());
        assert!(target.dir.join("clip.mp4").is_file());
    }

    #[test]
    fn test_move_failure_becomes_failed_outcome() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        // A plain file where the category directory should be.
        fs::write(root.join("Images"), b"in the way").unwrap();
        let file = root.join("pic.png");
        fs::write(&file, b"png").unwrap();

        let ctx = context(root);
        let organizer = FileOrganizer::new(&ctx, &NullNotifier);
        let outcome = organizer.process_path(&file).unwrap();

        assert_eq!(outcome.kind(), EntryKind::Failed);
        assert!(file.exists());
    }

    struct Recording(RefCell<Vec<String>>);

    impl Notifier for Recording {
        fn notify(&self, title: &str, message: &str) -> Result<(), NotifyError> {
            self.0.borrow_mut().push(format!("{}: {}", title, message));
            Err(NotifyError("no display".to_string()))
        }
    }

    #[test]
    fn test_commit_records_and_tolerates_notifier_failure() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let ctx = context(root);
        let notifier = Recording(RefCell::new(Vec::new()));
        let organizer = FileOrganizer::new(&ctx, &notifier);
        let mut history = SessionHistory::in_memory();

        let outcome = MoveOutcome::Moved {
            source: root.join("a.zip"),
            destination: root.join("Archives/a.zip"),
        };
        organizer.commit(&outcome, &mut history);

        assert_eq!(history.entries().len(), 1);
        assert_eq!(history.entries()[0].kind, EntryKind::Moved);
        assert_eq!(notifier.0.borrow().len(), 1);
        assert!(notifier.0.borrow()[0].contains("a.zip"));
    }

    #[test]
    fn test_ensure_root() {
        let temp_dir = TempDir::new().unwrap();
        assert!(ensure_root(temp_dir.path()).is_ok());
        assert!(ensure_root(&temp_dir.path().join("nope")).is_err());
    }
}
