//! File system watcher for Outbox
//!
//! Monitors a single directory (non-recursive) with the `notify` crate and
//! feeds files that were created in, or moved into, that directory to the
//! [`BatchQueue`]. Raw events travel over a bounded channel to one consumer
//! thread, which applies the name filter and the stability wait before
//! queueing. A small state-machine lets the watcher be paused, resumed and
//! shut down cleanly.

use crate::filter::NameFilter;
use crate::pipeline::{QueueStats, StatsSnapshot};
use crate::queue::BatchQueue;
use crate::settle::StabilityWait;
use crate::utils::display_name;
use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, TrySendError};
use notify::{
    event::{CreateKind, ModifyKind, RenameMode},
    Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcherTrait,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

// ────── configuration ─────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    pub stability_wait_ms: u64,
    pub max_queue_size: usize,
    pub poll_ms: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            stability_wait_ms: 500,
            max_queue_size: 10_000,
            poll_ms: 100,
        }
    }
}

// ────── public state/useful telemetry ────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatcherState {
    Initializing,
    Watching,
    Paused,
    ShuttingDown,
    Stopped,
}

#[derive(Debug, Clone)]
pub struct WatcherStatus {
    pub state: WatcherState,
    pub events_seen: usize,
    pub events_dropped: usize,
    pub paths_queued: usize,
    pub pending: usize,
    pub start_time: Option<Instant>,
    pub watched_dir: PathBuf,
    pub stats: StatsSnapshot,
}

// ────── event mapping ────────────────────────────────────────────────────────
/// The path that arrived in the watched directory, if `event` is an arrival.
///
/// Created files and the destination side of renames count; folders,
/// modifications and removals do not.
pub(crate) fn arrival_path(event: &Event) -> Option<PathBuf> {
    match event.kind {
        EventKind::Create(CreateKind::Folder) => None,
        EventKind::Create(_) => event.paths.first().cloned(),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => event.paths.first().cloned(),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => event.paths.get(1).cloned(),
        // backends that cannot tell the two sides apart; the existence check
        // after the stability wait drops the "from" side
        EventKind::Modify(ModifyKind::Name(RenameMode::Any)) => event.paths.last().cloned(),
        _ => None,
    }
}

struct Consumer {
    filter: NameFilter,
    settle: StabilityWait,
    queue: BatchQueue,
    watched_dir: PathBuf,
    paths_queued: Arc<AtomicUsize>,
}

impl Consumer {
    fn handle(&self, event: Event) {
        let Some(path) = arrival_path(&event) else {
            return;
        };
        if path.parent() != Some(self.watched_dir.as_path()) {
            debug!(file = %path.display(), "outside watched directory, ignoring");
            return;
        }
        if !self.filter.matches_path(&path) {
            debug!(file = %display_name(&path), "name does not match, ignoring");
            return;
        }
        if !self.settle.settle(&path) {
            return;
        }

        info!(file = %display_name(&path), "matching file detected");
        match self.queue.enqueue(path) {
            Ok(true) => {
                self.paths_queued.fetch_add(1, Ordering::SeqCst);
            }
            Ok(false) => {}
            Err(e) => error!(error = %e, "could not queue file"),
        }
    }
}

// ────── main watcher struct ───────────────────────────────────────────────────
pub struct FileWatcher {
    state: Arc<Mutex<WatcherState>>,
    watched_dir: PathBuf,
    queue: BatchQueue,
    stats: Arc<QueueStats>,
    _watcher: RecommendedWatcher,
    processor_thread: Option<JoinHandle<()>>,
    stop_flag: Arc<AtomicBool>,
    events_seen: Arc<AtomicUsize>,
    events_dropped: Arc<AtomicUsize>,
    paths_queued: Arc<AtomicUsize>,
    start_time: Instant,
}

impl FileWatcher {
    pub fn new(
        dir: &Path,
        filter: NameFilter,
        queue: BatchQueue,
        stats: Arc<QueueStats>,
        config: WatcherConfig,
    ) -> Result<Self> {
        // ── basic shared state/channels ───────────────────────────────────────
        let stop_flag = Arc::new(AtomicBool::new(false));
        let events_seen = Arc::new(AtomicUsize::new(0));
        let events_dropped = Arc::new(AtomicUsize::new(0));
        let paths_queued = Arc::new(AtomicUsize::new(0));
        let state = Arc::new(Mutex::new(WatcherState::Initializing));

        let (tx, rx) = bounded(config.max_queue_size);

        // ── start actual OS watcher ───────────────────────────────────────────
        let dropped = events_dropped.clone();
        let mut actual_watcher = RecommendedWatcher::new(
            move |ev| {
                if let Err(TrySendError::Full(_)) = tx.try_send(ev) {
                    dropped.fetch_add(1, Ordering::SeqCst);
                }
            },
            notify::Config::default(),
        )?;

        actual_watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch path {}", dir.display()))?;

        // notify reports child paths joined onto `dir` as given
        let consumer = Consumer {
            filter,
            settle: StabilityWait::new(Duration::from_millis(config.stability_wait_ms)),
            queue: queue.clone(),
            watched_dir: dir.to_path_buf(),
            paths_queued: paths_queued.clone(),
        };

        // ── spawn processor thread ────────────────────────────────────────────
        let stop_flag_clone = stop_flag.clone();
        let events_seen_clone = events_seen.clone();
        let state_clone = state.clone();
        let poll = Duration::from_millis(config.poll_ms);

        let processor_thread = thread::Builder::new()
            .name("outbox-watch".into())
            .spawn(move || {
                run_consumer(consumer, rx, state_clone, stop_flag_clone, events_seen_clone, poll)
            })
            .context("failed to spawn watcher thread")?;

        Ok(Self {
            state,
            watched_dir: dir.to_path_buf(),
            queue,
            stats,
            _watcher: actual_watcher,
            processor_thread: Some(processor_thread),
            stop_flag,
            events_seen,
            events_dropped,
            paths_queued,
            start_time: Instant::now(),
        })
    }

    // ── public API ////////////////////////////////////////////////////////////
    pub fn start(&mut self) -> Result<()> {
        let mut g = self.state.lock().map_err(|_| anyhow!("state"))?;
        match *g {
            WatcherState::Initializing | WatcherState::Paused => {
                *g = WatcherState::Watching;
                info!(dir = %self.watched_dir.display(), "watching");
                Ok(())
            }
            WatcherState::Watching => Ok(()), // idempotent
            _ => Err(anyhow!("cannot start from {:?}", *g)),
        }
    }

    pub fn pause(&mut self) -> Result<()> {
        let mut g = self.state.lock().map_err(|_| anyhow!("state"))?;
        match *g {
            WatcherState::Watching => {
                *g = WatcherState::Paused;
                Ok(())
            }
            WatcherState::Paused => Ok(()),
            _ => Err(anyhow!("cannot pause from {:?}", *g)),
        }
    }

    pub fn resume(&mut self) -> Result<()> {
        let mut g = self.state.lock().map_err(|_| anyhow!("state"))?;
        match *g {
            WatcherState::Paused => {
                *g = WatcherState::Watching;
                Ok(())
            }
            WatcherState::Watching => Ok(()),
            _ => Err(anyhow!("cannot resume from {:?}", *g)),
        }
    }

    /// Stop consuming events. Files already queued stay queued; the owner
    /// decides whether to flush them.
    pub fn stop(&mut self) -> Result<()> {
        {
            let mut g = self.state.lock().map_err(|_| anyhow!("state"))?;
            if matches!(*g, WatcherState::Stopped | WatcherState::ShuttingDown) {
                return Ok(());
            }
            *g = WatcherState::ShuttingDown;
        }

        self.stop_flag.store(true, Ordering::SeqCst);

        if let Some(h) = self.processor_thread.take() {
            let _ = h.join();
        }

        *self.state.lock().map_err(|_| anyhow!("state"))? = WatcherState::Stopped;
        info!(dir = %self.watched_dir.display(), "watcher stopped");
        Ok(())
    }

    pub fn status(&self) -> Result<WatcherStatus> {
        let st = self.state.lock().map_err(|_| anyhow!("state"))?.clone();
        Ok(WatcherStatus {
            state: st,
            events_seen: self.events_seen.load(Ordering::SeqCst),
            events_dropped: self.events_dropped.load(Ordering::SeqCst),
            paths_queued: self.paths_queued.load(Ordering::SeqCst),
            pending: self.queue.pending_count(),
            start_time: Some(self.start_time),
            watched_dir: self.watched_dir.clone(),
            stats: self.stats.snapshot(),
        })
    }

    pub fn queue(&self) -> &BatchQueue {
        &self.queue
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        let _ = self.stop(); // ignore errors during drop
    }
}

fn current_state(state: &Mutex<WatcherState>) -> Option<WatcherState> {
    state.lock().ok().map(|g| g.clone())
}

fn run_consumer(
    consumer: Consumer,
    rx: Receiver<notify::Result<Event>>,
    state: Arc<Mutex<WatcherState>>,
    stop_flag: Arc<AtomicBool>,
    events_seen: Arc<AtomicUsize>,
    poll: Duration,
) {
    // an event received just as the watcher was paused waits here for resume
    let mut held: Option<Event> = None;

    while !stop_flag.load(Ordering::Relaxed) {
        // honour current state
        match current_state(&state) {
            None | Some(WatcherState::ShuttingDown) | Some(WatcherState::Stopped) => break,
            // events wait in the channel until we resume
            Some(WatcherState::Paused) | Some(WatcherState::Initializing) => {
                thread::sleep(poll);
                continue;
            }
            Some(WatcherState::Watching) => {}
        }

        let event = match held.take() {
            Some(ev) => ev,
            None => match rx.recv_timeout(poll) {
                Ok(Ok(ev)) => {
                    events_seen.fetch_add(1, Ordering::SeqCst);
                    ev
                }
                Ok(Err(e)) => {
                    error!("watcher channel error: {:?}", e);
                    continue;
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            },
        };

        // the state may have changed while we were blocked in recv
        match current_state(&state) {
            Some(WatcherState::Watching) => consumer.handle(event),
            Some(WatcherState::Paused) | Some(WatcherState::Initializing) => held = Some(event),
            _ => break,
        }
    }

    if let Ok(mut g) = state.lock() {
        *g = WatcherState::Stopped;
    }
}
