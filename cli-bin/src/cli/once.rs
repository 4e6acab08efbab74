//! `outbox once` – reconcile, flush, exit.

use anyhow::Result;
use serde_json::json;
use tracing::info;

use crate::cli::Format;
use liboutbox::config::Config;
use liboutbox::{BatchReport, Outbox};

/// Queue everything already in the directory and transfer it synchronously.
pub fn transfer_once(cfg: Config) -> Result<Option<BatchReport>> {
    let outbox = Outbox::from_config(cfg)?;
    let found = outbox.reconcile()?;
    info!(count = found, dir = %outbox.dir().display(), "existing files queued");
    outbox.drain()
}

pub fn run(cfg: Config, fmt: Format) -> Result<()> {
    let report = transfer_once(cfg)?.unwrap_or_default();
    match fmt {
        Format::Text => println!(
            "transferred {} of {}, deleted {}, failed {}, not attempted {}",
            report.transferred, report.size, report.deleted, report.failed, report.unattempted
        ),
        Format::Json => println!(
            "{}",
            serde_json::to_string_pretty(&json!({ "report": report }))?
        ),
    }
    Ok(())
}
