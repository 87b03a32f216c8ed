//! Collector Module
//!
//! Walks the cache tree child-first, deleting expired entries and the
//! directories they leave empty.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::cache::{codec, FILE_EXTENSION};

// == Purge Report ==
/// Outcome of a single purge pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgeReport {
    /// Expired entry files deleted
    pub files_removed: usize,
    /// Empty directories deleted
    pub dirs_removed: usize,
    /// Entry files left in place (live, never-expiring or unreadable)
    pub files_kept: usize,
    /// Unlink, rmdir or listing failures that were skipped
    pub failures: usize,
}

// == Purge Expired ==
/// Removes every entry below `root` whose expiration is not after `now`.
///
/// `now` is captured by the caller once per pass. The root itself is never
/// removed. Failures are counted and skipped.
pub fn purge_expired(root: &Path, now: DateTime<Utc>) -> PurgeReport {
    let mut report = PurgeReport::default();
    walk(root, now, &mut report);
    report
}

fn walk(dir: &Path, now: DateTime<Utc>, report: &mut PurgeReport) {
    let children: Vec<(PathBuf, fs::FileType)> = match fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|entry| {
                let entry = entry.ok()?;
                let file_type = entry.file_type().ok()?;
                Some((entry.path(), file_type))
            })
            .collect(),
        Err(e) => {
            debug!(dir = %dir.display(), error = %e, "cannot list directory");
            report.failures += 1;
            return;
        }
    };

    for (path, file_type) in children {
        // Symlinks report neither is_dir nor is_file here, so they are never followed
        if file_type.is_dir() {
            walk(&path, now, report);
            remove_if_empty(&path, report);
        } else if file_type.is_file() && is_entry_file(&path) {
            purge_file(&path, now, report);
        }
    }
}

fn purge_file(path: &Path, now: DateTime<Utc>, report: &mut PurgeReport) {
    match codec::decode(path) {
        Some(entry) if entry.is_expired_at(now) => match fs::remove_file(path) {
            Ok(()) => {
                debug!(path = %path.display(), "purged expired entry");
                report.files_removed += 1;
            }
            Err(e) => {
                debug!(path = %path.display(), error = %e, "failed to unlink entry");
                report.failures += 1;
            }
        },
        _ => report.files_kept += 1,
    }
}

fn remove_if_empty(dir: &Path, report: &mut PurgeReport) {
    let is_empty = fs::read_dir(dir)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(false);

    if is_empty {
        match fs::remove_dir(dir) {
            Ok(()) => report.dirs_removed += 1,
            Err(e) => {
                debug!(dir = %dir.display(), error = %e, "failed to remove directory");
                report.failures += 1;
            }
        }
    }
}

fn is_entry_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == FILE_EXTENSION)
}
