// liboutbox/src/pipeline_tests.rs

use super::pipeline::{BatchHandler, QueueStats, StatsSnapshot, TransferPipeline};
use super::transfer::{BatchExecutor, TransferPolicy};
use crate::test_utils::{Script, ScriptedTransport};

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

fn policy() -> TransferPolicy {
    TransferPolicy {
        max_wait: Duration::from_millis(50),
        poll_interval: Duration::from_millis(5),
        post_transfer_wait: Duration::ZERO,
    }
}

fn touch(dir: &Path, name: &str) -> PathBuf {
    let p = dir.join(name);
    fs::write(&p, name).unwrap();
    p
}

fn pipeline(transport: ScriptedTransport) -> (TransferPipeline, Arc<QueueStats>) {
    let stats = Arc::new(QueueStats::default());
    let exec = BatchExecutor::new(Arc::new(transport), policy());
    (TransferPipeline::new(exec, stats.clone()), stats)
}

#[test]
fn only_confirmed_files_are_deleted() {
    let tmp = tempdir().unwrap();
    let one = touch(tmp.path(), "one_up.txt");
    let two = touch(tmp.path(), "two_up.txt");
    let three = touch(tmp.path(), "three_up.txt");

    let (p, stats) = pipeline(ScriptedTransport::default().with("two_up.txt", Script::Never));
    let report = p.handle_batch(vec![one.clone(), two.clone(), three.clone()]);

    assert_eq!(report.size, 3);
    assert_eq!(report.transferred, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.deleted, 2);
    assert!(!report.aborted);

    assert!(!one.exists());
    assert!(two.exists(), "unconfirmed file must stay on disk");
    assert!(!three.exists());

    assert_eq!(
        stats.snapshot(),
        StatsSnapshot {
            batches: 1,
            transferred: 2,
            failed: 1,
            deleted: 2,
            delete_failed: 0,
            sessions_aborted: 0,
        }
    );
}

#[test]
fn session_loss_keeps_the_rest_on_disk() {
    let tmp = tempdir().unwrap();
    let a = touch(tmp.path(), "a");
    let b = touch(tmp.path(), "b");
    let c = touch(tmp.path(), "c");

    let (p, stats) = pipeline(ScriptedTransport::default().with("b", Script::LoseSession));
    let report = p.handle_batch(vec![a.clone(), b.clone(), c.clone()]);

    assert!(report.aborted);
    assert_eq!(report.deleted, 1);
    assert_eq!(report.unattempted, 1);
    assert!(!a.exists());
    assert!(b.exists() && c.exists());
    assert_eq!(stats.snapshot().sessions_aborted, 1);
    assert_eq!(stats.snapshot().failed, 2);
}

#[test]
fn unopenable_session_deletes_nothing() {
    let tmp = tempdir().unwrap();
    let a = touch(tmp.path(), "a");

    let (p, _stats) = pipeline(ScriptedTransport::default().failing_open());
    let report = p.handle_batch(vec![a.clone()]);

    assert!(report.aborted);
    assert_eq!(report.deleted, 0);
    assert!(a.exists());
}

#[test]
fn vanished_file_is_skipped_not_failed() {
    let tmp = tempdir().unwrap();
    let a = touch(tmp.path(), "a");
    let ghost = tmp.path().join("ghost");

    let (p, stats) = pipeline(ScriptedTransport::default());
    let report = p.handle_batch(vec![ghost, a]);

    assert_eq!(report.skipped, 1);
    assert_eq!(report.deleted, 1);
    assert_eq!(stats.snapshot().failed, 0);
}
