//! liboutbox – public API surface for the Outbox core.
//!
//! Files dropped into a watched directory are filtered by name, collected
//! into debounced batches, pushed through a remote transfer session, and
//! deleted once the remote side confirms them.
//!
//! Down-stream crates (`cli-bin`, tests) should go through the [`Outbox`]
//! façade and the types re-exported here.

pub mod cleanup;
pub mod config;
pub mod error;
pub mod filter;
pub mod logging;
pub mod pipeline;
pub mod queue;
pub mod scan;
pub mod settle;
pub mod transfer;
pub mod transports;
pub mod utils;
pub mod watcher;

#[cfg(test)]
mod pipeline_tests;
#[cfg(test)]
mod test_utils;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use config::Config;
pub use filter::NameFilter;
pub use pipeline::{BatchReport, StatsSnapshot};
pub use transfer::{Session, Transport};
pub use watcher::{FileWatcher, WatcherState, WatcherStatus};

use pipeline::{QueueStats, TransferPipeline};
use queue::BatchQueue;
use transfer::BatchExecutor;

/// Primary façade – one instance per watched directory.
pub struct Outbox {
    cfg: Config,
    dir: PathBuf,
    filter: NameFilter,
    queue: BatchQueue,
    stats: Arc<QueueStats>,
}

impl Outbox {
    /// Validate `cfg` and build the transport it names.
    pub fn from_config(cfg: Config) -> Result<Self> {
        cfg.validate()?;
        let transport = match &cfg.transport {
            Some(t) => transports::from_config(t),
            None => anyhow::bail!("no [transport] configured"),
        };
        Self::with_transport(cfg, transport)
    }

    /// Build around an explicit transport; `cfg.transport` is ignored.
    pub fn with_transport(cfg: Config, transport: Arc<dyn Transport>) -> Result<Self> {
        cfg.validate_watch()?;
        let filter = cfg.name_filter()?;
        let dir = utils::canonicalize_lossy(cfg.watch_dir());

        let stats = Arc::new(QueueStats::default());
        let executor = BatchExecutor::new(transport, cfg.transfer_policy());
        let pipeline = TransferPipeline::new(executor, stats.clone());
        let queue = BatchQueue::new(cfg.quiet_period(), Arc::new(pipeline));

        Ok(Self {
            cfg,
            dir,
            filter,
            queue,
            stats,
        })
    }

    /// Queue matching files already sitting in the watched directory.
    pub fn reconcile(&self) -> Result<usize> {
        scan::reconcile(&self.queue, &self.filter, &self.dir)
            .with_context(|| format!("reconcile of {} failed", self.dir.display()))
    }

    /// Start watching; the returned watcher is already in `Watching` state.
    pub fn watch(&self) -> Result<FileWatcher> {
        let mut watcher = FileWatcher::new(
            &self.dir,
            self.filter.clone(),
            self.queue.clone(),
            self.stats.clone(),
            self.cfg.watcher_config(),
        )?;
        watcher.start()?;
        Ok(watcher)
    }

    /// Transfer whatever is pending right now, on the calling thread.
    pub fn flush_now(&self) -> Result<Option<BatchReport>> {
        self.queue.force_flush()
    }

    /// Flush what is pending, then wait for every started batch (including
    /// one the debounce timer kicked off) to finish. Call before exiting.
    pub fn drain(&self) -> Result<Option<BatchReport>> {
        let report = self.queue.force_flush()?;
        self.queue.wait_idle()?;
        Ok(report)
    }

    /// A batch is transferring or about to.
    pub fn is_busy(&self) -> bool {
        self.queue.is_busy()
    }

    pub fn pending_count(&self) -> usize {
        self.queue.pending_count()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn filter(&self) -> &NameFilter {
        &self.filter
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Canonical form of the watched directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
