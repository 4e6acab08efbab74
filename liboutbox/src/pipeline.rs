//! Transfer-then-cleanup stage run for every flushed batch.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::cleanup;
use crate::transfer::BatchExecutor;

/// Receives every batch the queue flushes. Calls are serialised by the queue.
pub trait BatchHandler: Send + Sync {
    fn handle_batch(&self, batch: Vec<PathBuf>) -> BatchReport;
}

/// Per-batch summary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub size: usize,
    pub transferred: usize,
    pub failed: usize,
    pub skipped: usize,
    pub unattempted: usize,
    pub deleted: usize,
    pub delete_failed: usize,
    pub aborted: bool,
}

/// Running totals, readable from any thread.
#[derive(Debug, Default)]
pub struct QueueStats {
    batches: AtomicUsize,
    transferred: AtomicUsize,
    failed: AtomicUsize,
    deleted: AtomicUsize,
    delete_failed: AtomicUsize,
    sessions_aborted: AtomicUsize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub batches: usize,
    pub transferred: usize,
    pub failed: usize,
    pub deleted: usize,
    pub delete_failed: usize,
    pub sessions_aborted: usize,
}

impl QueueStats {
    pub fn record(&self, report: &BatchReport) {
        self.batches.fetch_add(1, Ordering::SeqCst);
        self.transferred.fetch_add(report.transferred, Ordering::SeqCst);
        self.failed
            .fetch_add(report.failed + report.unattempted, Ordering::SeqCst);
        self.deleted.fetch_add(report.deleted, Ordering::SeqCst);
        self.delete_failed
            .fetch_add(report.delete_failed, Ordering::SeqCst);
        if report.aborted {
            self.sessions_aborted.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            batches: self.batches.load(Ordering::SeqCst),
            transferred: self.transferred.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            deleted: self.deleted.load(Ordering::SeqCst),
            delete_failed: self.delete_failed.load(Ordering::SeqCst),
            sessions_aborted: self.sessions_aborted.load(Ordering::SeqCst),
        }
    }
}

/// Transfers a batch, deletes what was confirmed, updates the counters.
pub struct TransferPipeline {
    executor: BatchExecutor,
    stats: Arc<QueueStats>,
}

impl TransferPipeline {
    pub fn new(executor: BatchExecutor, stats: Arc<QueueStats>) -> Self {
        Self { executor, stats }
    }
}

impl BatchHandler for TransferPipeline {
    fn handle_batch(&self, batch: Vec<PathBuf>) -> BatchReport {
        info!(count = batch.len(), "batch started");
        let outcome = self.executor.transfer(&batch);
        let cleaned = cleanup::cleanup(&outcome.succeeded);

        let report = BatchReport {
            size: batch.len(),
            transferred: outcome.succeeded.len(),
            failed: outcome.failed.len(),
            skipped: outcome.skipped.len(),
            unattempted: outcome.unattempted.len(),
            deleted: cleaned.deleted.len(),
            delete_failed: cleaned.failed.len(),
            aborted: outcome.is_aborted(),
        };

        let not_sent = report.failed + report.unattempted;
        if not_sent > 0 {
            warn!(
                failed = report.failed,
                unattempted = report.unattempted,
                "{not_sent} file(s) were not transferred and remain on disk"
            );
        }
        info!(
            transferred = report.transferred,
            deleted = report.deleted,
            size = report.size,
            "batch finished"
        );

        self.stats.record(&report);
        report
    }
}
