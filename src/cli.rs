//! Command-line orchestration for tidyfold.
//!
//! This module wires the engine components into the three top-level modes:
//! - a one-shot organize pass (engine, then retention sweep, then empty-directory reaping)
//! - watch mode, feeding new files into the engine until interrupted
//! - undo of the most recent organize session

use crate::config::Config;
use crate::context::RunContext;
use crate::file_organizer::{FileOrganizer, MoveOutcome, OrganizeError, OrganizeResult, ensure_root};
use crate::history::{HistoryEntry, HistoryError, SessionHistory};
use crate::notifier::{ConsoleNotifier, Notifier};
use crate::output::OutputFormatter;
use crate::reaper::{self, ReapReport};
use crate::retention::{self, SweepReport};
use crate::undo::{UndoManager, UndoReport};
use crate::watch::{self, WatchSummary};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{info, warn};

/// Represents a CLI command to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrganizeCommand {
    /// Organize the files currently in a directory.
    Organize {
        /// If true, simulate the operation without making changes.
        dry_run: bool,
    },
    /// Keep organizing files as they arrive until interrupted.
    Watch {
        dry_run: bool,
        /// How long a newly created file must sit before it is moved.
        settle_delay: Duration,
    },
    /// Undo the most recent organize session.
    Undo { dry_run: bool },
}

/// Everything a one-shot organize pass did.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Engine outcomes for the files found in the root, in processing order.
    pub outcomes: Vec<MoveOutcome>,
    pub aged: SweepReport,
    pub reaped: ReapReport,
    /// The history entries written (or, in a dry run, only collected) by this pass.
    pub history: Vec<HistoryEntry>,
}

impl RunReport {
    pub fn moved_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_moved()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes
            .iter()
            .chain(&self.aged.outcomes)
            .filter(|o| matches!(o, MoveOutcome::Failed { .. }))
            .count()
    }
}

/// Runs the CLI application with the given command and directory path.
///
/// Configuration is discovered next to the directory or in the user's config dir.
///
/// # Examples
///
/// ```no_run
/// use tidyfold::cli::{run_cli, OrganizeCommand};
/// use std::path::Path;
///
/// let result = run_cli(OrganizeCommand::Organize { dry_run: false }, Path::new("/path/to/directory"));
/// match result {
///     Ok(()) => println!("Operation completed successfully"),
///     Err(e) => eprintln!("Error: {}", e),
/// }
/// ```
pub fn run_cli(command: OrganizeCommand, dir_path: &Path) -> Result<(), String> {
    run_cli_with_config(command, dir_path, None)
}

/// Runs the CLI application with an optional explicit configuration file.
///
/// An unreadable or malformed configuration is reported and replaced by the
/// built-in defaults. Only a missing root directory (or a watch that cannot be
/// started) makes this return an error.
pub fn run_cli_with_config(
    command: OrganizeCommand,
    dir_path: &Path,
    config_path: Option<&Path>,
) -> Result<(), String> {
    match command {
        OrganizeCommand::Organize { dry_run } => {
            let context = load_context(dir_path, config_path, dry_run)?;
            run_organize(&context)
        }
        OrganizeCommand::Watch {
            dry_run,
            settle_delay,
        } => {
            let context = load_context(dir_path, config_path, dry_run)?;
            let cancel = install_interrupt_handler()?;
            run_watch(&context, cancel, settle_delay)
        }
        OrganizeCommand::Undo { dry_run } => undo_organization(dir_path, dry_run),
    }
}

/// Builds the run context for `dir_path` from whatever configuration is found.
fn load_context(
    dir_path: &Path,
    config_path: Option<&Path>,
    dry_run: bool,
) -> Result<RunContext, String> {
    let root = resolve_root(dir_path)?;
    let config = Config::load_or_default(config_path, &root);
    let context = match RunContext::from_config(&root, config) {
        Ok(context) => context,
        Err(e) => {
            warn!(error = %e, "filters unusable, falling back to defaults");
            OutputFormatter::warning(&format!("{}. Using built-in defaults.", e));
            RunContext::new(&root)
        }
    };
    Ok(context.with_dry_run(dry_run))
}

/// The directory as an absolute, symlink-free path.
///
/// Watch events and history records carry absolute paths, so everything is keyed
/// on the canonical root regardless of how the directory was typed.
fn resolve_root(dir_path: &Path) -> Result<PathBuf, String> {
    fs::canonicalize(dir_path)
        .map_err(|e| format!("Cannot open directory {}: {}", dir_path.display(), e))
}

fn install_interrupt_handler() -> Result<Arc<AtomicBool>, String> {
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
        .map_err(|e| format!("Could not install interrupt handler: {}", e))?;
    Ok(cancel)
}

fn run_organize(context: &RunContext) -> Result<(), String> {
    if context.dry_run {
        OutputFormatter::dry_run_notice(&format!(
            "Analyzing contents of: {}",
            context.root.display()
        ));
    } else {
        OutputFormatter::info(&format!("Organizing contents of: {}", context.root.display()));
    }

    let report = organize_directory(context, &ConsoleNotifier).map_err(|e| e.to_string())?;

    OutputFormatter::summary_table(
        &[report.outcomes.as_slice(), report.aged.outcomes.as_slice()].concat(),
        context,
    );
    if !report.reaped.removed.is_empty() {
        OutputFormatter::plain(&format!(
            "Empty folders removed: {}",
            report.reaped.removed.len()
        ));
    }
    for (path, reason) in &report.reaped.failed {
        OutputFormatter::warning(&format!(
            "Could not remove {}: {}",
            context.relative(path).display(),
            reason
        ));
    }

    if context.dry_run {
        OutputFormatter::success("Dry run complete. No files were modified.");
        OutputFormatter::plain(&format!(
            "Run 'tidyfold {}' (without --dry-run) to execute the organization.",
            context.root.display()
        ));
    } else {
        OutputFormatter::success("Organization complete!");
        if report.moved_count() > 0 {
            OutputFormatter::plain(&format!(
                "History saved. Use 'tidyfold {} --undo' to revert changes.",
                context.root.display()
            ));
        }
    }
    if report.failed_count() > 0 {
        OutputFormatter::warning("Some files could not be organized. Please review errors above.");
    }
    Ok(())
}

/// Runs one organize pass over the files directly inside `context.root`.
///
/// Every file goes through the move engine, then the whole tree is swept for aged
/// files, then empty directories are removed. Each outcome is printed and appended
/// to the session history as it happens.
///
/// # Errors
///
/// Fails only when the root is missing or cannot be listed. Per-file problems are
/// reported as [`MoveOutcome::Failed`] in the returned report.
pub fn organize_directory(
    context: &RunContext,
    notifier: &dyn Notifier,
) -> OrganizeResult<RunReport> {
    ensure_root(&context.root)?;
    let files = root_files(&context.root)?;

    let mut history = if context.dry_run {
        SessionHistory::in_memory()
    } else {
        SessionHistory::open(context.history_path())
    };
    if let Err(e) = history.record_start(&context.root) {
        warn!(error = %e, "session start not recorded");
        OutputFormatter::warning(&format!("{}. Undo may not be available.", e));
    }

    let organizer = FileOrganizer::new(context, notifier);
    let mut report = RunReport::default();

    let pb = OutputFormatter::create_progress_bar(files.len() as u64);
    for path in &files {
        if let Some(name) = path.file_name() {
            pb.set_message(name.to_string_lossy().into_owned());
        }
        if let Some(outcome) = organizer.process_path(path) {
            pb.suspend(|| OutputFormatter::outcome(&outcome, context));
            organizer.commit(&outcome, &mut history);
            report.outcomes.push(outcome);
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    report.aged = retention::sweep(context);
    for outcome in &report.aged.outcomes {
        OutputFormatter::outcome(outcome, context);
        history.append_or_warn(HistoryEntry::from_outcome(outcome));
    }
    let deleted = report.aged.deleted_count();
    if deleted > 0
        && context.settings.notifications_enabled
        && !context.dry_run
        && let Err(e) = notifier.notify("Cleanup", &format!("Deleted {} old file(s)", deleted))
    {
        warn!(error = %e, "notification not delivered");
    }

    report.reaped = reaper::reap(&context.root, context.dry_run);
    report.history = history.entries().to_vec();

    info!(
        moved = report.moved_count(),
        aged = deleted,
        reaped = report.reaped.removed.len(),
        "organize pass finished"
    );
    Ok(report)
}

/// Files directly inside `root`, sorted by name.
fn root_files(root: &Path) -> OrganizeResult<Vec<PathBuf>> {
    let entries = fs::read_dir(root).map_err(|e| OrganizeError::InvalidBasePath {
        path: root.to_path_buf(),
        source: e,
    })?;

    let mut files: Vec<PathBuf> = entries
        .flatten()
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
        .map(|entry| entry.path())
        .collect();
    files.sort();
    Ok(files)
}

fn run_watch(
    context: &RunContext,
    cancel: Arc<AtomicBool>,
    settle_delay: Duration,
) -> Result<(), String> {
    let notifier = ConsoleNotifier;
    let organizer = FileOrganizer::new(context, &notifier);
    let mut history = if context.dry_run {
        SessionHistory::in_memory()
    } else {
        SessionHistory::open(context.history_path())
    };
    if let Err(e) = history.record_start(&context.root) {
        warn!(error = %e, "session start not recorded");
    }

    if context.dry_run {
        OutputFormatter::dry_run_notice("Files will be reported, not moved.");
    }
    OutputFormatter::info(&format!(
        "Watching {} for new files. Press Ctrl-C to stop.",
        context.root.display()
    ));

    let summary = watch::watch_directory(organizer, &mut history, cancel, settle_delay)
        .map_err(|e| e.to_string())?;
    print_watch_summary(&summary, context);
    Ok(())
}

fn print_watch_summary(summary: &WatchSummary, context: &RunContext) {
    OutputFormatter::header("WATCH SUMMARY");
    OutputFormatter::plain(&format!("  Moved: {}", summary.moved));
    let rows = [
        ("Duplicates skipped", summary.duplicates_skipped),
        ("Duplicates deleted", summary.duplicates_deleted),
        ("Name collisions", summary.collisions),
        ("Failed", summary.failed),
    ];
    for (label, count) in rows {
        if count > 0 {
            OutputFormatter::plain(&format!("  {}: {}", label, count));
        }
    }
    if !summary.unprocessed.is_empty() {
        OutputFormatter::warning(&format!(
            "{} event(s) were not processed before stopping:",
            summary.unprocessed.len()
        ));
        for path in &summary.unprocessed {
            OutputFormatter::plain(&format!("    - {}", context.relative(path).display()));
        }
    }
}

/// Undoes the most recent organize session.
///
/// A missing log (or one without any session) is reported as "nothing to undo"
/// and is not an error.
fn undo_organization(base_path: &Path, dry_run: bool) -> Result<(), String> {
    if dry_run {
        OutputFormatter::dry_run_notice("Checking what undo would restore...");
    } else {
        OutputFormatter::info("Undoing previous organization...");
    }

    let root = resolve_root(base_path)?;
    match UndoManager::undo_last_session(&root, dry_run) {
        Ok(report) => {
            print_undo_report(&report, dry_run);
            Ok(())
        }
        Err(HistoryError::NoHistory { .. }) => {
            OutputFormatter::info("Nothing to undo.");
            Ok(())
        }
        Err(e) => Err(e.to_string()),
    }
}

fn print_undo_report(report: &UndoReport, dry_run: bool) {
    if dry_run {
        OutputFormatter::dry_run_notice(&format!(
            "Would restore: {}",
            report.restored_files
        ));
    } else {
        OutputFormatter::success("Undo complete!");
        OutputFormatter::plain(&format!("  Restored: {}", report.restored_files));
    }

    if !report.skipped_files.is_empty() {
        OutputFormatter::warning(&format!("Skipped: {}", report.skipped_files.len()));
        for (path, reason) in &report.skipped_files {
            OutputFormatter::plain(&format!("    - {}: {}", path.display(), reason));
        }
    }

    if !report.failed_restores.is_empty() {
        OutputFormatter::error(&format!("Failed: {}", report.failed_restores.len()));
        for (path, reason) in &report.failed_restores {
            OutputFormatter::error(&format!("    - {}: {}", path.display(), reason));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OrganizeSettings;
    use crate::history::EntryKind;
    use crate::notifier::NullNotifier;
    use tempfile::TempDir;

    #[test]
    fn test_organize_directory_records_session() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("a.jpg"), b"jpg").unwrap();
        fs::write(root.join("b.pdf"), b"pdf").unwrap();
        fs::create_dir(root.join("Stuff")).unwrap();

        let ctx = RunContext::new(root);
        let report = organize_directory(&ctx, &NullNotifier).unwrap();

        assert_eq!(report.moved_count(), 2);
        assert_eq!(report.history[0].kind, EntryKind::SessionStart);
        assert_eq!(report.history.len(), 3);
        assert_eq!(report.reaped.removed, vec![root.join("Stuff")]);
        assert!(ctx.history_path().exists());
    }

    #[test]
    fn test_dry_run_keeps_history_in_memory() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("a.jpg"), b"jpg").unwrap();

        let ctx = RunContext::new(root).with_dry_run(true);
        let report = organize_directory(&ctx, &NullNotifier).unwrap();

        assert_eq!(report.moved_count(), 1);
        assert_eq!(report.history.len(), 2);
        assert!(!ctx.history_path().exists());
        assert!(root.join("a.jpg").exists());
    }

    #[test]
    fn test_missing_root_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = RunContext::new(temp_dir.path().join("gone"));
        assert!(matches!(
            organize_directory(&ctx, &NullNotifier),
            Err(OrganizeError::InvalidBasePath { .. })
        ));
    }

    #[test]
    fn test_sweep_runs_after_moves() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let file = root.join("old.zip");
        fs::write(&file, b"zip").unwrap();
        let when = std::time::SystemTime::now() - Duration::from_secs(40 * 86_400);
        fs::File::options()
            .write(true)
            .open(&file)
            .unwrap()
            .set_modified(when)
            .unwrap();

        let ctx = RunContext::new(root).with_settings(OrganizeSettings {
            auto_delete_days: 30,
            ..OrganizeSettings::default()
        });
        let report = organize_directory(&ctx, &NullNotifier).unwrap();

        assert_eq!(report.moved_count(), 1);
        assert_eq!(
            report.aged.outcomes,
            vec![MoveOutcome::DeletedAged {
                path: root.join("Archives/old.zip")
            }]
        );
        assert!(!root.join("Archives").exists());
        assert_eq!(
            report.history.last().map(|e| e.kind),
            Some(EntryKind::DeletedAged)
        );
    }

    #[test]
    fn test_undo_without_history_is_not_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let result = run_cli(
            OrganizeCommand::Undo { dry_run: false },
            temp_dir.path(),
        );
        assert!(result.is_ok());
    }
}
