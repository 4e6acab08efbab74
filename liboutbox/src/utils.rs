//! Misc shared helpers.

use std::path::{Path, PathBuf};

/// File stem as used by the name filter (`report_up.pdf` → `report_up`).
///
/// Returns `None` for paths without a final component.
pub fn base_name(path: &Path) -> Option<String> {
    path.file_stem().map(|s| s.to_string_lossy().into_owned())
}

/// Final component for log lines; falls back to the full path.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Expand a leading `~` and `$VARS`; unknown variables are left as-is.
pub fn expand_path(raw: &str) -> PathBuf {
    let expanded = shellexpand::full(raw)
        .map(|c| c.into_owned())
        .unwrap_or_else(|_| shellexpand::tilde(raw).into_owned());
    PathBuf::from(expanded)
}

/// Best-effort absolute path; keeps the input when canonicalisation fails.
pub fn canonicalize_lossy<P: AsRef<Path>>(path: P) -> PathBuf {
    let p = path.as_ref();
    std::fs::canonicalize(p).unwrap_or_else(|_| p.to_path_buf())
}
