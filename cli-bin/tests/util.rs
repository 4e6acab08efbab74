//! tests/util.rs
//! Small helpers shared across integration tests.

#![allow(dead_code)]

use assert_cmd::Command;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Absolute path to the freshly-built `outbox` binary.
pub fn bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_outbox"))
}

/// Build a `Command` for `outbox` that runs inside `tmp` against an empty
/// config file, so nothing from the user's environment leaks in.
pub fn outbox(tmp: &TempDir) -> Command {
    let empty = tmp.path().join("empty.toml");
    if !empty.exists() {
        std::fs::write(&empty, "").unwrap();
    }
    let mut cmd = Command::new(bin());
    cmd.current_dir(tmp.path())
        .env("OUTBOX_CONFIG", &empty)
        .env_remove("RUST_LOG");
    cmd
}

/// Like [`outbox`] but pointed at an explicit config file.
pub fn outbox_with_config(tmp: &TempDir, config: &Path) -> Command {
    let mut cmd = outbox(tmp);
    cmd.env("OUTBOX_CONFIG", config);
    cmd
}

/// Minimal config: watch `dir` for `_up`, drop into `target`.
pub fn write_config(tmp: &TempDir, dir: &Path, target: &Path) -> PathBuf {
    let path = tmp.path().join("outbox.toml");
    std::fs::write(
        &path,
        format!(
            r#"[watch]
dir = "{}"
pattern = "_up"

[timing]
stability_wait_ms = 0
quiet_period_ms = 60000

[transfer]
max_wait_ms = 2000
poll_interval_ms = 10

[transport]
kind = "directory"
target = "{}"
"#,
            dir.display(),
            target.display()
        ),
    )
    .unwrap();
    path
}
