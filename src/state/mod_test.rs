use super::*;
use chrono::TimeZone;
use std::time::Duration as StdDuration;

fn at(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + seconds, 0).unwrap()
}

const GRACE: StdDuration = StdDuration::from_secs(300);
const SETTLING: StdDuration = StdDuration::from_secs(120);

fn base_input(now: DateTime<Utc>, current: Option<HealthRecord>, failing: bool, ttl_expired: bool) -> EvaluationInput {
    EvaluationInput {
        current,
        ttl_expired,
        has_failing_resources: failing,
        grace_period: GRACE,
        settling_period: SETTLING,
        now,
    }
}

#[test]
fn fresh_namespace_with_no_problems_becomes_ok() {
    let outcome = evaluate(base_input(at(0), None, false, false));
    assert_eq!(outcome.status, Status::Ok);
    assert!(outcome.changed);
    assert!(outcome.status_finalize_at.is_none());
}

#[test]
fn ok_namespace_with_failing_resources_becomes_unstable_with_a_finalize_deadline() {
    let current = HealthRecord {
        status: Status::Ok,
        status_timestamp: at(0),
        status_finalize_at: None,
    };
    let outcome = evaluate(base_input(at(10), Some(current), true, false));
    assert_eq!(outcome.status, Status::Unstable);
    assert!(outcome.changed);
    assert_eq!(outcome.status_timestamp, at(10));
    assert_eq!(outcome.status_finalize_at, Some(at(10) + ChronoDuration::seconds(120)));
}

#[test]
fn unstable_namespace_stays_unstable_until_settling_period_elapses() {
    let current = HealthRecord {
        status: Status::Unstable,
        status_timestamp: at(0),
        status_finalize_at: Some(at(120)),
    };
    let outcome = evaluate(base_input(at(60), Some(current), true, false));
    assert_eq!(outcome.status, Status::Unstable);
    assert!(!outcome.changed);
    // unchanged status must not touch the timestamp
    assert_eq!(outcome.status_timestamp, at(0));
}

#[test]
fn unstable_namespace_escalates_to_failing_once_settling_elapses() {
    let current = HealthRecord {
        status: Status::Unstable,
        status_timestamp: at(0),
        status_finalize_at: Some(at(120)),
    };
    let outcome = evaluate(base_input(at(120), Some(current), true, false));
    assert_eq!(outcome.status, Status::Failing);
    assert!(outcome.changed);
    assert_eq!(outcome.status_timestamp, at(120));
    assert_eq!(outcome.status_finalize_at, Some(at(120) + ChronoDuration::seconds(300)));
}

#[test]
fn failing_namespace_escalates_to_failed_once_grace_period_elapses() {
    let current = HealthRecord {
        status: Status::Failing,
        status_timestamp: at(120),
        status_finalize_at: Some(at(420)),
    };
    let outcome = evaluate(base_input(at(500), Some(current), true, false));
    assert_eq!(outcome.status, Status::Failed);
    assert!(outcome.changed);
}

#[test]
fn failed_namespace_recovers_to_ok_once_resources_clear() {
    let current = HealthRecord {
        status: Status::Failed,
        status_timestamp: at(500),
        status_finalize_at: None,
    };
    let outcome = evaluate(base_input(at(600), Some(current), false, false));
    assert_eq!(outcome.status, Status::Ok);
    assert!(outcome.changed);
    assert!(outcome.status_finalize_at.is_none());
}

#[test]
fn ttl_expiry_forces_stale_even_with_no_failing_resources() {
    let current = HealthRecord {
        status: Status::Ok,
        status_timestamp: at(0),
        status_finalize_at: None,
    };
    let outcome = evaluate(base_input(at(10), Some(current), false, true));
    assert_eq!(outcome.status, Status::Stale);
    assert!(outcome.changed);
}

#[test]
fn repeated_evaluation_of_an_unchanged_status_never_moves_the_timestamp() {
    let current = HealthRecord {
        status: Status::Ok,
        status_timestamp: at(0),
        status_finalize_at: None,
    };
    let first = evaluate(base_input(at(50), Some(current), false, false));
    assert!(!first.changed);
    assert_eq!(first.status_timestamp, at(0));

    let second_record = HealthRecord {
        status: first.status,
        status_timestamp: first.status_timestamp,
        status_finalize_at: first.status_finalize_at,
    };
    let second = evaluate(base_input(at(100), Some(second_record), false, false));
    assert!(!second.changed);
    assert_eq!(second.status_timestamp, at(0));
}
