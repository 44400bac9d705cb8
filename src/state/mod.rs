//! The namespace health state machine.
//!
//! A namespace's health is one of six statuses. `Ok` and `Stale` are
//! entered and left in a single step; `Unstable` and `Failing` are
//! intermediate holding states that only escalate once their namespace's
//! settling or grace period has elapsed, which absorbs flapping workloads
//! instead of reacting to every failed pod immediately.
//!
//! ```text
//! Unknown/Ok/Stale --(failing resources)--> Unstable --(settling elapses, still failing)--> Failing --(grace elapses, still failing)--> Failed
//!        ^                                     |                                                |
//!        +-------------------(resources recover)---------------------------------------------+
//! ```
//!
//! `status_timestamp` only moves forward when `status` itself changes.
//! Re-evaluating an unchanged status (the common case — most ticks find
//! nothing new) must be a no-op on the timestamp, or every tick would
//! look like a fresh transition to anything watching for status changes.

use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Unknown,
    Ok,
    Unstable,
    Failing,
    Failed,
    Stale,
}

impl Status {
    /// Numeric code exposed on the `nsreaper_namespace_status` gauge.
    pub fn metric_code(self) -> i64 {
        match self {
            Status::Ok => 0,
            Status::Stale => 1,
            Status::Failing => 2,
            Status::Failed => 3,
            Status::Unstable => 4,
            Status::Unknown => 5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Unknown => "unknown",
            Status::Ok => "ok",
            Status::Unstable => "unstable",
            Status::Failing => "failing",
            Status::Failed => "failed",
            Status::Stale => "stale",
        }
    }
}

impl std::str::FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unknown" => Ok(Status::Unknown),
            "ok" => Ok(Status::Ok),
            "unstable" => Ok(Status::Unstable),
            "failing" => Ok(Status::Failing),
            "failed" => Ok(Status::Failed),
            "stale" => Ok(Status::Stale),
            other => Err(format!("unrecognized namespace status: {other}")),
        }
    }
}

/// What the collector last wrote for a namespace, read back from its
/// annotations.
#[derive(Debug, Clone)]
pub struct HealthRecord {
    pub status: Status,
    pub status_timestamp: DateTime<Utc>,
    pub status_finalize_at: Option<DateTime<Utc>>,
}

/// Fresh evidence gathered this tick, plus the durations that govern how
/// long a namespace may sit in an intermediate state.
pub struct EvaluationInput {
    pub current: Option<HealthRecord>,
    pub ttl_expired: bool,
    pub has_failing_resources: bool,
    pub grace_period: StdDuration,
    pub settling_period: StdDuration,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationOutcome {
    pub status: Status,
    pub status_timestamp: DateTime<Utc>,
    pub status_finalize_at: Option<DateTime<Utc>>,
    /// Whether `status` actually changed from the previous tick. Callers
    /// use this to decide whether a notification is due — `notify_on_status`
    /// fires only when this is `true`.
    pub changed: bool,
}

fn chrono_duration(d: StdDuration) -> ChronoDuration {
    ChronoDuration::from_std(d).unwrap_or_else(|_| ChronoDuration::seconds(i64::MAX / 2))
}

/// Computes the next status for a namespace given the evidence collected
/// this tick. Pure function: no I/O, no clock reads (the caller passes
/// `now` explicitly so this is deterministic and easy to test).
pub fn evaluate(input: EvaluationInput) -> EvaluationOutcome {
    let previous_status = input.current.as_ref().map(|c| c.status).unwrap_or(Status::Unknown);
    let previous_timestamp = input.current.as_ref().map(|c| c.status_timestamp).unwrap_or(input.now);
    let previous_finalize_at = input.current.as_ref().and_then(|c| c.status_finalize_at);

    let elapsed = |finalize_at: Option<DateTime<Utc>>| finalize_at.map(|t| input.now >= t).unwrap_or(false);

    let candidate = if input.ttl_expired {
        Status::Stale
    } else if input.has_failing_resources {
        match previous_status {
            Status::Ok | Status::Unknown | Status::Stale => Status::Unstable,
            Status::Unstable => {
                if elapsed(previous_finalize_at) {
                    Status::Failing
                } else {
                    Status::Unstable
                }
            }
            Status::Failing => {
                if elapsed(previous_finalize_at) {
                    Status::Failed
                } else {
                    Status::Failing
                }
            }
            Status::Failed => Status::Failed,
        }
    } else {
        Status::Ok
    };

    let changed = candidate != previous_status;
    let status_timestamp = if changed { input.now } else { previous_timestamp };

    let status_finalize_at = match candidate {
        Status::Unstable if changed => Some(input.now + chrono_duration(input.settling_period)),
        Status::Failing if changed => Some(input.now + chrono_duration(input.grace_period)),
        Status::Unstable | Status::Failing => previous_finalize_at,
        _ => None,
    };

    EvaluationOutcome {
        status: candidate,
        status_timestamp,
        status_finalize_at,
        changed,
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
