//! Debounced batch queue.
//!
//! Arrivals land in an ordered, duplicate-free [`PendingSet`]. Every arrival
//! re-arms a single debounce timer; when the timer survives a full quiet
//! period the set is snapshotted, cleared and handed to the
//! [`BatchHandler`]. The set and the timer handle live behind one mutex. The
//! handler runs outside that mutex and behind a second one, so arrivals are
//! never blocked by a transfer and at most one batch runs at a time.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, Weak};
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use tracing::{debug, error, info};

use crate::pipeline::{BatchHandler, BatchReport};
use crate::utils::display_name;

// ────── pending set ──────────────────────────────────────────────────────────
/// Insertion-ordered set of paths awaiting transfer.
#[derive(Debug, Default)]
pub struct PendingSet {
    order: Vec<PathBuf>,
    index: HashSet<PathBuf>,
}

impl PendingSet {
    /// Append `path` unless already present. Returns `true` if it was added.
    pub fn insert(&mut self, path: PathBuf) -> bool {
        if self.index.contains(&path) {
            return false;
        }
        self.index.insert(path.clone());
        self.order.push(path);
        true
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.index.contains(path)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Take everything, in arrival order, leaving the set empty.
    pub fn take(&mut self) -> Vec<PathBuf> {
        self.index.clear();
        std::mem::take(&mut self.order)
    }
}

// ────── debounce timer ───────────────────────────────────────────────────────
/// Handle on one armed timer thread. Dropping or cancelling it disarms the
/// thread; a thread that already woke up is caught by the generation check.
struct DebounceTimer {
    generation: u64,
    cancel_tx: Sender<()>,
}

impl DebounceTimer {
    fn arm(generation: u64, delay: Duration, shared: Weak<Shared>) -> std::io::Result<Self> {
        let (cancel_tx, cancel_rx) = bounded::<()>(1);
        thread::Builder::new()
            .name("outbox-debounce".into())
            .spawn(move || {
                if let Err(RecvTimeoutError::Timeout) = cancel_rx.recv_timeout(delay) {
                    if let Some(shared) = shared.upgrade() {
                        shared.on_timer(generation);
                    }
                }
            })?;
        Ok(Self {
            generation,
            cancel_tx,
        })
    }

    fn cancel(self) {
        let _ = self.cancel_tx.try_send(());
    }
}

// ────── queue ────────────────────────────────────────────────────────────────
struct QueueState {
    pending: PendingSet,
    timer: Option<DebounceTimer>,
    generation: u64,
    /// Batches snapshotted but not yet finished.
    in_flight: usize,
}

struct Shared {
    state: Mutex<QueueState>,
    /// Signalled whenever `in_flight` drops back to zero.
    idle: Condvar,
    transfer_lock: Mutex<()>,
    quiet_period: Duration,
    handler: Arc<dyn BatchHandler>,
}

/// Cloneable handle; all clones share one pending set and one timer.
#[derive(Clone)]
pub struct BatchQueue {
    shared: Arc<Shared>,
}

impl BatchQueue {
    pub fn new(quiet_period: Duration, handler: Arc<dyn BatchHandler>) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(QueueState {
                    pending: PendingSet::default(),
                    timer: None,
                    generation: 0,
                    in_flight: 0,
                }),
                idle: Condvar::new(),
                transfer_lock: Mutex::new(()),
                quiet_period,
                handler,
            }),
        }
    }

    pub fn quiet_period(&self) -> Duration {
        self.shared.quiet_period
    }

    /// Queue `path` and restart the quiet period, even if it was already
    /// queued. Returns `true` if the path was new.
    pub fn enqueue(&self, path: PathBuf) -> Result<bool> {
        let mut st = self.shared.lock_state()?;
        let name = display_name(&path);
        let added = st.pending.insert(path);
        if added {
            info!(file = %name, pending = st.pending.len(), "queued");
        } else {
            debug!(file = %name, "already queued, restarting quiet period");
        }
        self.shared.rearm(&mut st)?;
        Ok(added)
    }

    /// Queue every path not already pending; restart the quiet period once if
    /// anything was added. Returns the number of new paths.
    pub fn enqueue_all<I>(&self, paths: I) -> Result<usize>
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let mut st = self.shared.lock_state()?;
        let mut added = 0usize;
        for path in paths {
            let name = display_name(&path);
            if st.pending.insert(path) {
                debug!(file = %name, "queued");
                added += 1;
            }
        }
        if added > 0 {
            self.shared.rearm(&mut st)?;
        }
        Ok(added)
    }

    /// Flush now instead of waiting out the quiet period. Runs the batch on
    /// the calling thread and returns its report, or `None` if nothing was
    /// pending.
    pub fn force_flush(&self) -> Result<Option<BatchReport>> {
        let batch = {
            let mut st = self.shared.lock_state()?;
            if let Some(timer) = st.timer.take() {
                timer.cancel();
            }
            if st.pending.is_empty() {
                return Ok(None);
            }
            st.in_flight += 1;
            st.pending.take()
        };
        self.shared.run_batch(batch).map(Some)
    }

    /// Block until no batch is transferring or about to transfer. Paths still
    /// pending are not flushed.
    pub fn wait_idle(&self) -> Result<()> {
        let mut st = self.shared.lock_state()?;
        if st.in_flight > 0 {
            info!(batches = st.in_flight, "waiting for running batch to finish");
        }
        while st.in_flight > 0 {
            st = self
                .shared
                .idle
                .wait(st)
                .map_err(|_| anyhow!("queue mutex poisoned"))?;
        }
        Ok(())
    }

    pub fn is_busy(&self) -> bool {
        match self.shared.state.lock() {
            Ok(g) => g.in_flight > 0,
            Err(poisoned) => poisoned.into_inner().in_flight > 0,
        }
    }

    /// Disarm the timer without flushing; pending paths stay queued.
    pub fn cancel_timer(&self) -> Result<()> {
        let mut st = self.shared.lock_state()?;
        if let Some(timer) = st.timer.take() {
            timer.cancel();
        }
        Ok(())
    }

    pub fn pending_count(&self) -> usize {
        match self.shared.state.lock() {
            Ok(g) => g.pending.len(),
            Err(poisoned) => poisoned.into_inner().pending.len(),
        }
    }

    pub fn is_pending(&self, path: &Path) -> bool {
        match self.shared.state.lock() {
            Ok(g) => g.pending.contains(path),
            Err(poisoned) => poisoned.into_inner().pending.contains(path),
        }
    }

    pub fn is_timer_armed(&self) -> bool {
        match self.shared.state.lock() {
            Ok(g) => g.timer.is_some(),
            Err(poisoned) => poisoned.into_inner().timer.is_some(),
        }
    }
}

impl Shared {
    fn lock_state(&self) -> Result<MutexGuard<'_, QueueState>> {
        self.state
            .lock()
            .map_err(|_| anyhow!("queue mutex poisoned"))
    }

    /// Replace the live timer. Caller holds the state lock.
    fn rearm(self: &Arc<Self>, st: &mut QueueState) -> Result<()> {
        if let Some(old) = st.timer.take() {
            old.cancel();
        }
        st.generation += 1;
        let timer = DebounceTimer::arm(st.generation, self.quiet_period, Arc::downgrade(self))
            .context("failed to spawn debounce timer")?;
        st.timer = Some(timer);
        debug!(
            generation = st.generation,
            quiet_ms = self.quiet_period.as_millis() as u64,
            "debounce timer armed"
        );
        Ok(())
    }

    fn on_timer(&self, generation: u64) {
        let batch = {
            let mut st = match self.state.lock() {
                Ok(g) => g,
                Err(_) => {
                    error!("queue mutex poisoned, dropping timer");
                    return;
                }
            };
            match &st.timer {
                Some(t) if t.generation == generation => {}
                _ => {
                    debug!(generation, "stale debounce timer ignored");
                    return;
                }
            }
            st.timer = None;
            if st.pending.is_empty() {
                return;
            }
            st.in_flight += 1;
            st.pending.take()
        };

        if let Err(e) = self.run_batch(batch) {
            error!(error = %e, "batch could not run");
        }
    }

    /// Caller has already counted `batch` in `in_flight`.
    fn run_batch(&self, batch: Vec<PathBuf>) -> Result<BatchReport> {
        let _done = InFlight(self);
        let _running = self
            .transfer_lock
            .lock()
            .map_err(|_| anyhow!("transfer mutex poisoned"))?;
        Ok(self.handler.handle_batch(batch))
    }
}

/// Ends one in-flight batch on drop, even if the handler panicked.
struct InFlight<'a>(&'a Shared);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut st = match self.0.state.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        st.in_flight = st.in_flight.saturating_sub(1);
        if st.in_flight == 0 {
            self.0.idle.notify_all();
        }
    }
}
