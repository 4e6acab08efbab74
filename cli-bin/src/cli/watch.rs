// src/cli/watch.rs

use std::io::{self, BufRead};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossbeam_channel::{unbounded, Receiver};
use serde_json::json;
use tracing::{error, info, warn};

use crate::cli::Format;
use liboutbox::config::Config;
use liboutbox::{Outbox, WatcherState, WatcherStatus};

const STATUS_EVERY: Duration = Duration::from_secs(30);
const TICK: Duration = Duration::from_millis(200);

/// Commands accepted on stdin while watching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Flush,
    Status,
}

impl Control {
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim().to_ascii_lowercase().as_str() {
            "flush" | "f" => Some(Self::Flush),
            "status" | "s" => Some(Self::Status),
            _ => None,
        }
    }
}

/// Forward recognised stdin lines; the thread ends at EOF.
fn spawn_stdin_reader() -> Result<Receiver<Control>> {
    let (tx, rx) = unbounded();
    thread::Builder::new()
        .name("outbox-stdin".into())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if line.trim().is_empty() {
                    continue;
                }
                match Control::parse(&line) {
                    Some(cmd) => {
                        if tx.send(cmd).is_err() {
                            break;
                        }
                    }
                    None => warn!("unknown command `{}` (try `flush` or `status`)", line.trim()),
                }
            }
        })
        .context("failed to spawn stdin reader")?;
    Ok(rx)
}

fn print_status(status: &WatcherStatus, fmt: Format) -> Result<()> {
    match fmt {
        Format::Text => println!(
            "{:?}: {} event(s), {} queued, {} pending, {} batch(es), {} transferred, {} failed, {} deleted",
            status.state,
            status.events_seen,
            status.paths_queued,
            status.pending,
            status.stats.batches,
            status.stats.transferred,
            status.stats.failed,
            status.stats.deleted,
        ),
        Format::Json => println!(
            "{}",
            json!({
                "state": format!("{:?}", status.state),
                "dir": status.watched_dir,
                "events_seen": status.events_seen,
                "events_dropped": status.events_dropped,
                "paths_queued": status.paths_queued,
                "pending": status.pending,
                "stats": status.stats,
            })
        ),
    }
    Ok(())
}

fn flush(outbox: &Outbox) {
    match outbox.flush_now() {
        Ok(Some(report)) => info!(
            transferred = report.transferred,
            size = report.size,
            "forced flush finished"
        ),
        Ok(None) => info!("nothing pending"),
        Err(e) => error!(error = %e, "forced flush failed"),
    }
}

pub fn run(cfg: Config, fmt: Format) -> Result<()> {
    let outbox = Outbox::from_config(cfg)?;

    let found = outbox.reconcile()?;
    if found > 0 {
        info!(count = found, "existing files queued");
    }

    let mut watcher = outbox.watch()?;
    info!("Watcher started. Press Ctrl+C to stop watching.");

    let running = Arc::new(AtomicBool::new(true));
    let r_clone = running.clone();
    ctrlc::set_handler(move || {
        info!("Ctrl+C received. Signaling watcher to stop...");
        r_clone.store(false, Ordering::SeqCst);
    })?;

    let controls = spawn_stdin_reader()?;
    let start_time = Instant::now();
    let mut last_status_time = Instant::now();

    while running.load(Ordering::SeqCst) {
        let status = watcher.status()?;
        if status.state == WatcherState::Stopped {
            warn!("watcher stopped on its own, exiting");
            break;
        }

        while let Ok(cmd) = controls.try_recv() {
            match cmd {
                Control::Flush => flush(&outbox),
                Control::Status => print_status(&watcher.status()?, fmt)?,
            }
        }

        if last_status_time.elapsed() >= STATUS_EVERY {
            info!(
                uptime_s = start_time.elapsed().as_secs(),
                events = status.events_seen,
                pending = status.pending,
                batches = status.stats.batches,
                deleted = status.stats.deleted,
                "watcher running"
            );
            last_status_time = Instant::now();
        }
        thread::sleep(TICK);
    }

    watcher.stop()?;
    if outbox.pending_count() > 0 || outbox.is_busy() {
        info!(pending = outbox.pending_count(), "finishing transfers before exit");
    }
    match outbox.drain() {
        Ok(Some(report)) => info!(
            transferred = report.transferred,
            size = report.size,
            "final flush finished"
        ),
        Ok(None) => {}
        Err(e) => error!(error = %e, "final flush failed"),
    }
    print_status(&watcher.status()?, fmt)?;
    Ok(())
}
