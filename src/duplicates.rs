//! Duplicate detection against the file already sitting at a move target.
//!
//! A candidate is a duplicate only when the target directory holds an entry with the
//! exact same base name *and* the same content. Files with different names are never
//! compared, so identical content under two names is kept twice.

use crate::fingerprint::fingerprint;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Returns true when `target_dir/<candidate name>` exists and has identical content.
///
/// Any read failure is logged and treated as "not a duplicate".
pub fn is_duplicate(candidate: &Path, target_dir: &Path) -> bool {
    let Some(file_name) = candidate.file_name() else {
        return false;
    };
    if !target_dir.is_dir() {
        return false;
    }

    let existing = target_dir.join(file_name);
    if !existing.is_file() || existing == candidate {
        return false;
    }

    // Different lengths can never hash equal.
    if let (Ok(a), Ok(b)) = (fs::metadata(candidate), fs::metadata(&existing))
        && a.len() != b.len()
    {
        debug!(candidate = %candidate.display(), "same name, different size");
        return false;
    }

    match (fingerprint(candidate), fingerprint(&existing)) {
        (Ok(a), Ok(b)) => a == b,
        (Err(e), _) | (_, Err(e)) => {
            warn!(error = %e, "cannot determine duplicate status, assuming distinct");
            false
        }
    }
}
