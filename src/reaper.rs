//! Removal of directories left empty after a run.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Result of one reaping pass.
#[derive(Debug, Default)]
pub struct ReapReport {
    /// Directories removed (or that would be, in a dry run), deepest first.
    pub removed: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
}

/// Removes every empty directory below `root`, children before parents.
///
/// `root` itself is never removed. In a dry run nothing is deleted, but a directory
/// whose only entries would have been removed is reported as well.
pub fn reap(root: &Path, dry_run: bool) -> ReapReport {
    let mut report = ReapReport::default();
    let mut gone: HashSet<PathBuf> = HashSet::new();

    for entry in WalkDir::new(root).min_depth(1).contents_first(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "skipping unreadable entry while reaping");
                continue;
            }
        };
        if !entry.file_type().is_dir() {
            continue;
        }

        let dir = entry.path();
        let empty = match fs::read_dir(dir) {
            Ok(mut entries) => entries.all(|child| {
                child.is_ok_and(|child| gone.contains(&child.path()))
            }),
            Err(e) => {
                report.failed.push((dir.to_path_buf(), e.to_string()));
                continue;
            }
        };
        if !empty {
            continue;
        }

        if dry_run {
            debug!(path = %dir.display(), "would remove empty directory");
        } else if let Err(e) = fs::remove_dir(dir) {
            warn!(path = %dir.display(), error = %e, "could not remove empty directory");
            report.failed.push((dir.to_path_buf(), e.to_string()));
            continue;
        }
        gone.insert(dir.to_path_buf());
        report.removed.push(dir.to_path_buf());
    }

    report
}
