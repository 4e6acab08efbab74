// src/scan.rs

use std::path::Path;

use anyhow::Result;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::filter::NameFilter;
use crate::queue::BatchQueue;

/// Queue every matching regular file directly inside `dir`.
///
/// Files found here are assumed settled, so there is no stability wait. The
/// debounce timer is restarted once, and only if something new was queued.
pub fn reconcile(queue: &BatchQueue, filter: &NameFilter, dir: &Path) -> Result<usize> {
    if !dir.is_dir() {
        info!(dir = %dir.display(), "watched directory missing, nothing to reconcile");
        return Ok(0);
    }
    info!(dir = %dir.display(), "scanning for files left from a previous run");

    let candidates: Vec<_> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        // follows symlinks, like the watcher's existence check
        .filter(|e| e.path().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            let hit = filter.matches_path(p);
            if hit {
                debug!(file = %p.display(), "existing file matches");
            }
            hit
        })
        .collect();

    let added = queue.enqueue_all(candidates)?;
    if added > 0 {
        info!(queued = added, "existing files queued");
    } else {
        info!("no new existing files to queue");
    }
    Ok(added)
}
