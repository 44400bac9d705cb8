//! The `check-namespace` probe action: gathers failure evidence for one
//! namespace, runs it through the health state machine, and writes the
//! outcome back onto the namespace's annotations.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::Utc;
use tracing::info;

use crate::adapter::dto::NamespacePhase;
use crate::config::{duration, NamespacePolicy};
use crate::error::{Error, Result};
use crate::matcher;
use crate::probe::ProbeContext;
use crate::state::{self, EvaluationInput, HealthRecord, Status};
use crate::types::annotation;

/// Whether `policy.ttl` has elapsed since the namespace was created, if a
/// TTL is configured at all.
pub fn is_ttl_expired(policy: &NamespacePolicy, created_at: Option<chrono::DateTime<Utc>>, now: chrono::DateTime<Utc>) -> bool {
    match (policy.ttl, created_at) {
        (Some(ttl), Some(created_at)) => {
            let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::seconds(i64::MAX / 2));
            now >= created_at + ttl
        }
        _ => false,
    }
}

pub fn read_health_record(annotations: &BTreeMap<String, String>) -> Option<HealthRecord> {
    let status = Status::from_str(annotations.get(&annotation::status())?).ok()?;
    let status_timestamp = annotations
        .get(&annotation::status_timestamp())
        .and_then(|v| chrono::DateTime::parse_from_rfc3339(v).ok())
        .map(|t| t.with_timezone(&Utc))?;
    let status_finalize_at = annotations
        .get(&annotation::status_finalize_at())
        .and_then(|v| chrono::DateTime::parse_from_rfc3339(v).ok())
        .map(|t| t.with_timezone(&Utc));

    Some(HealthRecord {
        status,
        status_timestamp,
        status_finalize_at,
    })
}

/// Renders the human-readable `status_timeframe` annotation for the
/// duration governing `status`: the settling period while unstable, the
/// grace period while failing, otherwise the TTL (or nothing, if none
/// applies).
fn timeframe_for(status: Status, policy: &NamespacePolicy) -> Option<String> {
    match status {
        Status::Unstable => Some(duration::format(policy.settling_period)),
        Status::Failing => Some(duration::format(policy.grace_period)),
        Status::Stale => policy.ttl.map(duration::format),
        _ => None,
    }
}

pub async fn run(ctx: &ProbeContext, namespace: &str) -> Result<()> {
    let ns = ctx
        .adapter
        .get_namespace(namespace)
        .await
        .ok_or_else(|| Error::NamespaceGone(namespace.to_string()))?;

    if ns.phase == NamespacePhase::Terminating {
        info!(namespace, "namespace is terminating, skipping probe");
        return Ok(());
    }

    let Some(policy) = matcher::match_namespace(&ctx.config.namespaces, &ns) else {
        info!(namespace, "namespace matches no policy, skipping");
        return Ok(());
    };

    let failing_resources = match ctx.prometheus.fetch_namespace_alerts(namespace).await {
        Some(alerts) => alerts,
        None => {
            ctx.adapter
                .failing_workloads(namespace, ctx.config.probe.include_daemonsets)
                .await
        }
    };
    let has_failing_resources = !failing_resources.is_empty();

    let ttl_expired = is_ttl_expired(policy, ns.creation_timestamp, Utc::now());
    let current = read_health_record(&ns.annotations);

    let outcome = state::evaluate(EvaluationInput {
        current,
        ttl_expired,
        has_failing_resources,
        grace_period: policy.grace_period,
        settling_period: policy.settling_period,
        now: Utc::now(),
    });

    let mut annotations = BTreeMap::new();
    annotations.insert(annotation::status(), outcome.status.as_str().to_string());
    annotations.insert(annotation::status_timestamp(), outcome.status_timestamp.to_rfc3339());
    annotations.insert(annotation::last_checked(), Utc::now().to_rfc3339());
    annotations.insert(annotation::failing_resources(), failing_resources.join(","));
    if let Some(finalize_at) = outcome.status_finalize_at {
        annotations.insert(annotation::status_finalize_at(), finalize_at.to_rfc3339());
    }
    if let Some(timeframe) = timeframe_for(outcome.status, policy) {
        annotations.insert(annotation::status_timeframe(), timeframe);
    }

    // Invariant: setting `status` to a new value clears any notification
    // recorded against the previous status episode, so the action
    // controller treats the new episode as un-notified.
    if outcome.changed {
        annotations.insert(annotation::notified_timestamp(), String::new());
        annotations.insert(annotation::notified_status(), String::new());
    }

    ctx.adapter
        .patch_namespace(namespace, &BTreeMap::new(), &annotations)
        .await
        .map_err(|e| Error::ExternalDependency(format!("failed to patch namespace status: {e}")))?;

    info!(
        namespace,
        status = outcome.status.as_str(),
        changed = outcome.changed,
        failing = failing_resources.len(),
        "namespace health evaluated"
    );

    Ok(())
}

#[cfg(test)]
#[path = "check_namespace_test.rs"]
mod tests;
