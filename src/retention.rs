//! Age-based cleanup of the organized tree.

use crate::context::RunContext;
use crate::file_organizer::{MoveOutcome, OrganizeError};
use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};
use walkdir::WalkDir;

const SECONDS_PER_DAY: u64 = 86_400;

/// Everything a sweep did, in walk order. Holds only `DeletedAged` and `Failed` outcomes.
#[derive(Debug, Default)]
pub struct SweepReport {
    pub outcomes: Vec<MoveOutcome>,
}

impl SweepReport {
    pub fn deleted_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| matches!(outcome, MoveOutcome::DeletedAged { .. }))
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.len() - self.deleted_count()
    }
}

/// Deletes every file under the root last modified more than
/// `settings.auto_delete_days` days ago.
///
/// A zero threshold returns immediately without walking anything.
pub fn sweep(context: &RunContext) -> SweepReport {
    let days = context.settings.auto_delete_days;
    if days == 0 {
        return SweepReport::default();
    }
    let age = Duration::from_secs(u64::from(days) * SECONDS_PER_DAY);
    let cutoff = SystemTime::now()
        .checked_sub(age)
        .unwrap_or(SystemTime::UNIX_EPOCH);
    sweep_older_than(context, cutoff)
}

/// Deletes every file under the root whose mtime is before `cutoff`.
pub fn sweep_older_than(context: &RunContext, cutoff: SystemTime) -> SweepReport {
    let mut report = SweepReport::default();

    for entry in WalkDir::new(&context.root).min_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "skipping unreadable entry during retention sweep");
                continue;
            }
        };
        if !entry.file_type().is_file() || context.is_artifact(entry.path()) {
            continue;
        }

        let modified = match entry.metadata().map(|m| m.modified()) {
            Ok(Ok(modified)) => modified,
            Ok(Err(e)) => {
                warn!(path = %entry.path().display(), error = %e, "no modification time");
                continue;
            }
            Err(e) => {
                warn!(path = %entry.path().display(), error = %e, "no metadata");
                continue;
            }
        };
        if modified >= cutoff {
            continue;
        }

        report.outcomes.push(delete_aged(entry.path(), context.dry_run));
    }

    debug!(
        deleted = report.deleted_count(),
        failed = report.failed_count(),
        "retention sweep finished"
    );
    report
}

fn delete_aged(path: &Path, dry_run: bool) -> MoveOutcome {
    if !dry_run && let Err(e) = fs::remove_file(path) {
        let error = OrganizeError::DeleteFailed {
            path: path.to_path_buf(),
            source: e,
        };
        warn!(error = %error, "aged file not deleted");
        return MoveOutcome::Failed {
            source: path.to_path_buf(),
            reason: error.to_string(),
        };
    }
    MoveOutcome::DeletedAged {
        path: path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OrganizeSettings;
    use std::fs::File;
    use tempfile::TempDir;

    fn age_file(path: &Path, days: u64) {
        let when = SystemTime::now() - Duration::from_secs(days * SECONDS_PER_DAY);
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(when)
            .unwrap();
    }

    fn context(root: &Path, days: u32) -> RunContext {
        RunContext::new(root).with_settings(OrganizeSettings {
            auto_delete_days: days,
            ..OrganizeSettings::default()
        })
    }

    #[test]
    fn test_old_files_are_deleted_recursively() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("Documents")).unwrap();
        let old = root.join("Documents/old.pdf");
        let fresh = root.join("fresh.txt");
        fs::write(&old, b"old").unwrap();
        fs::write(&fresh, b"new").unwrap();
        age_file(&old, 40);

        let report = sweep(&context(root, 30));

        assert_eq!(report.deleted_count(), 1);
        assert_eq!(
            report.outcomes,
            vec![MoveOutcome::DeletedAged { path: old.clone() }]
        );
        assert!(!old.exists());
        assert!(fresh.exists());
    }

    #[test]
    fn test_zero_days_disables_sweep() {
        let temp_dir = TempDir::new().unwrap();
        let old = temp_dir.path().join("ancient.zip");
        fs::write(&old, b"zip").unwrap();
        age_file(&old, 4000);

        let report = sweep(&context(temp_dir.path(), 0));
        assert!(report.outcomes.is_empty());
        assert!(old.exists());
    }

    #[test]
    fn test_dry_run_keeps_files() {
        let temp_dir = TempDir::new().unwrap();
        let old = temp_dir.path().join("old.mov");
        fs::write(&old, b"mov").unwrap();
        age_file(&old, 90);

        let report = sweep(&context(temp_dir.path(), 30).with_dry_run(true));
        assert_eq!(report.deleted_count(), 1);
        assert!(old.exists());
    }

    #[test]
    fn test_history_log_is_never_swept() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = context(temp_dir.path(), 1);
        fs::write(ctx.history_path(), b"{}\n").unwrap();
        age_file(&ctx.history_path(), 10);

        let report = sweep(&ctx);
        assert_eq!(report.deleted_count(), 0);
        assert!(ctx.history_path().exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_delete_does_not_stop_sweep() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let locked = root.join("Locked");
        fs::create_dir(&locked).unwrap();
        let stuck = locked.join("stuck.txt");
        let loose = root.join("loose.txt");
        fs::write(&stuck, b"old").unwrap();
        fs::write(&loose, b"old").unwrap();
        age_file(&stuck, 40);
        age_file(&loose, 40);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o555)).unwrap();
        // Permission bits are not enforced for privileged users.
        if fs::write(locked.join("writable"), b"").is_ok() {
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let report = sweep(&context(root, 30));
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        assert_eq!(report.deleted_count(), 1);
        assert_eq!(report.failed_count(), 1);
        assert!(report.outcomes.contains(&MoveOutcome::DeletedAged { path: loose.clone() }));
        assert!(
            report
                .outcomes
                .iter()
                .any(|o| matches!(o, MoveOutcome::Failed { source, .. } if *source == stuck))
        );
        assert!(stuck.exists());
        assert!(!loose.exists());
    }
}
