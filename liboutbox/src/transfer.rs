//! Batch transfer executor.
//!
//! A batch is pushed through exactly one remote [`Session`]. Files go one at a
//! time, in batch order; each is confirmed by polling the session until
//! [`TransferPolicy::max_wait`] runs out. A per-file failure is logged and the
//! batch moves on. A session-level failure ends the batch and leaves the
//! remaining files untouched on disk.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::utils::display_name;

/// Opens sessions against a remote target.
pub trait Transport: Send + Sync {
    /// Short label for logs (`directory`, `command`, ...).
    fn name(&self) -> &str;

    /// Open one session for a whole batch.
    fn open(&self) -> Result<Box<dyn Session>>;
}

/// One connection/context to the remote target, reused for a whole batch.
///
/// Errors are classified through [`crate::error::Error::is_session_fatal`]:
/// `Error::Session` ends the batch, anything else fails only the current file.
pub trait Session: Send {
    /// Start sending `path`.
    fn submit(&mut self, path: &Path) -> Result<()>;

    /// Has the remote side confirmed `path`? Polled until the policy gives up.
    fn confirmed(&mut self, path: &Path) -> Result<bool>;

    /// Called when confirmation timed out.
    fn abandon(&mut self, _path: &Path) {}

    /// Always called once before the executor returns.
    fn close(&mut self) -> Result<()>;
}

/// Confirmation polling policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferPolicy {
    pub max_wait: Duration,
    pub poll_interval: Duration,
    /// Pause after each confirmed file before the next one starts.
    pub post_transfer_wait: Duration,
}

impl Default for TransferPolicy {
    fn default() -> Self {
        Self {
            max_wait: Duration::from_secs(300),
            poll_interval: Duration::from_millis(500),
            post_transfer_wait: Duration::ZERO,
        }
    }
}

/// What happened to each path of a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferOutcome {
    /// Confirmed by the remote side; safe to delete.
    pub succeeded: Vec<PathBuf>,
    /// Attempted and failed (timeout or transport error).
    pub failed: Vec<PathBuf>,
    /// Gone from disk before their turn came.
    pub skipped: Vec<PathBuf>,
    /// Never attempted because the session was unavailable.
    pub unattempted: Vec<PathBuf>,
    /// Set when the session could not be opened or was lost.
    pub session_error: Option<String>,
}

impl TransferOutcome {
    pub fn is_aborted(&self) -> bool {
        self.session_error.is_some()
    }
}

enum Confirmation {
    Confirmed,
    TimedOut,
}

/// Runs batches through a [`Transport`].
pub struct BatchExecutor {
    transport: Arc<dyn Transport>,
    policy: TransferPolicy,
}

impl BatchExecutor {
    pub fn new(transport: Arc<dyn Transport>, policy: TransferPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn policy(&self) -> TransferPolicy {
        self.policy
    }

    pub fn transfer(&self, batch: &[PathBuf]) -> TransferOutcome {
        let mut outcome = TransferOutcome::default();
        if batch.is_empty() {
            debug!("no files to transfer");
            return outcome;
        }

        info!(
            count = batch.len(),
            transport = self.transport.name(),
            "opening transfer session"
        );
        let mut session = match self.transport.open() {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, count = batch.len(), "could not open session, batch left on disk");
                outcome.session_error = Some(e.to_string());
                outcome.unattempted = batch.to_vec();
                return outcome;
            }
        };

        let total = batch.len();
        for (i, path) in batch.iter().enumerate() {
            if !path.exists() {
                debug!(file = %path.display(), "vanished before transfer, skipping");
                outcome.skipped.push(path.clone());
                continue;
            }

            info!(
                progress = %format!("{}/{}", i + 1, total),
                file = %display_name(path),
                "transferring"
            );
            match self.send_one(session.as_mut(), path) {
                Ok(Confirmation::Confirmed) => {
                    info!(file = %display_name(path), "transfer confirmed");
                    outcome.succeeded.push(path.clone());
                    if !self.policy.post_transfer_wait.is_zero() {
                        thread::sleep(self.policy.post_transfer_wait);
                    }
                }
                Ok(Confirmation::TimedOut) => {
                    warn!(
                        file = %display_name(path),
                        waited_ms = self.policy.max_wait.as_millis() as u64,
                        "no confirmation before timeout"
                    );
                    outcome.failed.push(path.clone());
                }
                Err(e) if e.is_session_fatal() => {
                    warn!(error = %e, remaining = total - i - 1, "session lost, aborting batch");
                    outcome.failed.push(path.clone());
                    outcome.unattempted.extend(batch[i + 1..].iter().cloned());
                    outcome.session_error = Some(e.to_string());
                    break;
                }
                Err(e) => {
                    warn!(file = %display_name(path), error = %e, "transfer failed");
                    outcome.failed.push(path.clone());
                }
            }
        }

        if let Err(e) = session.close() {
            warn!(error = %e, "closing session failed");
        }

        info!(
            transferred = outcome.succeeded.len(),
            total,
            "transfer session finished"
        );
        outcome
    }

    fn send_one(&self, session: &mut dyn Session, path: &Path) -> Result<Confirmation> {
        session.submit(path)?;

        let started = Instant::now();
        loop {
            if session.confirmed(path)? {
                debug!(
                    file = %display_name(path),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "confirmation received"
                );
                return Ok(Confirmation::Confirmed);
            }
            let elapsed = started.elapsed();
            if elapsed >= self.policy.max_wait {
                session.abandon(path);
                return Ok(Confirmation::TimedOut);
            }
            thread::sleep(self.policy.poll_interval.min(self.policy.max_wait - elapsed));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{Script, ScriptedTransport};
    use std::fs;
    use tempfile::tempdir;

    fn fast_policy() -> TransferPolicy {
        TransferPolicy {
            max_wait: Duration::from_millis(60),
            poll_interval: Duration::from_millis(5),
            post_transfer_wait: Duration::ZERO,
        }
    }

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let p = dir.join(name);
        fs::write(&p, name).unwrap();
        p
    }

    #[test]
    fn empty_batch_opens_no_session() {
        let transport = Arc::new(ScriptedTransport::default());
        let exec = BatchExecutor::new(transport.clone(), fast_policy());
        let outcome = exec.transfer(&[]);
        assert_eq!(outcome, TransferOutcome::default());
        assert_eq!(transport.opens(), 0);
    }

    #[test]
    fn one_session_for_whole_batch_in_order() {
        let tmp = tempdir().unwrap();
        let files: Vec<_> = ["a", "b", "c"].iter().map(|n| touch(tmp.path(), n)).collect();
        let transport = Arc::new(ScriptedTransport::default());
        let exec = BatchExecutor::new(transport.clone(), fast_policy());

        let outcome = exec.transfer(&files);
        assert_eq!(outcome.succeeded, files);
        assert_eq!(transport.opens(), 1);
        assert_eq!(transport.closes(), 1);
        assert_eq!(transport.submitted(), files);
    }

    #[test]
    fn per_file_failures_do_not_stop_the_batch() {
        let tmp = tempdir().unwrap();
        let a = touch(tmp.path(), "a");
        let b = touch(tmp.path(), "b");
        let c = touch(tmp.path(), "c");
        let d = touch(tmp.path(), "d");
        let transport = Arc::new(
            ScriptedTransport::default()
                .with("b", Script::Never)
                .with("c", Script::FailSubmit),
        );
        let exec = BatchExecutor::new(transport.clone(), fast_policy());

        let outcome = exec.transfer(&[a.clone(), b.clone(), c.clone(), d.clone()]);
        assert_eq!(outcome.succeeded, vec![a, d]);
        assert_eq!(outcome.failed, vec![b.clone(), c]);
        assert!(!outcome.is_aborted());
        assert_eq!(transport.abandoned(), vec![b]);
        assert_eq!(transport.closes(), 1);
    }

    #[test]
    fn slow_confirmation_within_max_wait_succeeds() {
        let tmp = tempdir().unwrap();
        let a = touch(tmp.path(), "a");
        let transport = Arc::new(ScriptedTransport::default().with("a", Script::ConfirmAfter(3)));
        let exec = BatchExecutor::new(transport, fast_policy());
        assert_eq!(exec.transfer(&[a.clone()]).succeeded, vec![a]);
    }

    #[test]
    fn open_failure_leaves_everything_unattempted() {
        let tmp = tempdir().unwrap();
        let files: Vec<_> = ["a", "b"].iter().map(|n| touch(tmp.path(), n)).collect();
        let transport = Arc::new(ScriptedTransport::default().failing_open());
        let exec = BatchExecutor::new(transport.clone(), fast_policy());

        let outcome = exec.transfer(&files);
        assert!(outcome.succeeded.is_empty());
        assert_eq!(outcome.unattempted, files);
        assert!(outcome.is_aborted());
        assert_eq!(transport.closes(), 0);
    }

    #[test]
    fn lost_session_aborts_remaining_and_still_closes() {
        let tmp = tempdir().unwrap();
        let a = touch(tmp.path(), "a");
        let b = touch(tmp.path(), "b");
        let c = touch(tmp.path(), "c");
        let transport = Arc::new(ScriptedTransport::default().with("b", Script::LoseSession));
        let exec = BatchExecutor::new(transport.clone(), fast_policy());

        let outcome = exec.transfer(&[a.clone(), b.clone(), c.clone()]);
        assert_eq!(outcome.succeeded, vec![a]);
        assert_eq!(outcome.failed, vec![b]);
        assert_eq!(outcome.unattempted, vec![c]);
        assert!(outcome.is_aborted());
        assert_eq!(transport.closes(), 1);
    }

    #[test]
    fn vanished_files_are_skipped() {
        let tmp = tempdir().unwrap();
        let a = touch(tmp.path(), "a");
        let ghost = tmp.path().join("ghost");
        let transport = Arc::new(ScriptedTransport::default());
        let exec = BatchExecutor::new(transport.clone(), fast_policy());

        let outcome = exec.transfer(&[ghost.clone(), a.clone()]);
        assert_eq!(outcome.skipped, vec![ghost]);
        assert_eq!(outcome.succeeded, vec![a.clone()]);
        assert_eq!(transport.submitted(), vec![a]);
    }
}
