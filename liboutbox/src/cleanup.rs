//! Deletes local files the remote side confirmed.

use std::fs;
use std::io;
use std::path::PathBuf;

use tracing::{debug, error, info};

use crate::utils::display_name;

#[derive(Debug, Default)]
pub struct CleanupReport {
    pub deleted: Vec<PathBuf>,
    /// Already gone at deletion time; not an error.
    pub missing: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, io::Error)>,
}

/// Delete every path in `succeeded` that still exists.
///
/// A failed delete is logged and the file stays where it is; it is not
/// queued again.
pub fn cleanup(succeeded: &[PathBuf]) -> CleanupReport {
    let mut report = CleanupReport::default();
    if succeeded.is_empty() {
        return report;
    }

    info!(count = succeeded.len(), "deleting transferred files");
    for path in succeeded {
        match fs::remove_file(path) {
            Ok(()) => {
                info!(file = %display_name(path), "deleted");
                report.deleted.push(path.clone());
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(file = %path.display(), "already gone");
                report.missing.push(path.clone());
            }
            Err(e) => {
                error!(file = %path.display(), error = %e, "could not delete transferred file");
                report.failed.push((path.clone(), e));
            }
        }
    }
    report
}
