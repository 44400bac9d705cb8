use super::*;
use std::time::Duration as StdDuration;

fn config(dir: &std::path::Path, ttl_secs: u64) -> LeaderElectionConfig {
    LeaderElectionConfig {
        enabled: true,
        path: dir.to_string_lossy().to_string(),
        lease_ttl: StdDuration::from_secs(ttl_secs),
    }
}

#[test]
fn first_caller_acquires_an_unheld_lease() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), 5);
    let mut lock = LeaderLock::new(&cfg, "replica-a");

    assert!(lock.acquire().unwrap());
    assert!(lock.is_leader().unwrap());
}

#[test]
fn second_caller_is_rejected_while_lease_is_fresh() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), 5);

    let mut holder = LeaderLock::new(&cfg, "replica-a");
    assert!(holder.acquire().unwrap());

    let mut challenger = LeaderLock::new(&cfg, "replica-b");
    assert!(!challenger.acquire().unwrap());
    assert!(!challenger.is_leader().unwrap());
}

#[test]
fn holder_renews_without_losing_the_lease() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), 5);
    let mut lock = LeaderLock::new(&cfg, "replica-a");

    assert!(lock.acquire().unwrap());
    assert!(lock.acquire().unwrap());
    assert!(lock.is_leader().unwrap());
}

#[test]
fn stale_lease_is_taken_over() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), 0);

    let mut holder = LeaderLock::new(&cfg, "replica-a");
    assert!(holder.acquire().unwrap());

    // ttl is 0 here, so stale_after is 0 and any elapsed time exceeds it.
    std::thread::sleep(StdDuration::from_millis(5));

    let mut challenger = LeaderLock::new(&cfg, "replica-b");
    assert!(challenger.acquire().unwrap());
    assert!(challenger.is_leader().unwrap());

    // The original holder no longer owns the (now different) inode.
    assert!(!holder.is_leader().unwrap());
}

#[test]
fn release_removes_the_lease_file() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), 5);
    let mut lock = LeaderLock::new(&cfg, "replica-a");

    assert!(lock.acquire().unwrap());
    lock.release().unwrap();
    assert!(!lock.is_leader().unwrap());
    assert!(!cfg.lease_path().exists());
}

#[test]
fn release_is_a_no_op_when_not_holding_the_lease() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), 5);

    let mut holder = LeaderLock::new(&cfg, "replica-a");
    assert!(holder.acquire().unwrap());

    let mut bystander = LeaderLock::new(&cfg, "replica-b");
    assert!(bystander.release().is_ok());
    assert!(holder.is_leader().unwrap());
}

#[test]
fn renew_period_is_half_ttl_floored_at_500ms() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), 10);
    let lock = LeaderLock::new(&cfg, "replica-a");
    assert_eq!(lock.renew_period(), StdDuration::from_secs(5));

    let cfg_short = config(dir.path(), 1);
    let lock_short = LeaderLock::new(&cfg_short, "replica-a");
    assert_eq!(lock_short.renew_period(), StdDuration::from_millis(500));
}
