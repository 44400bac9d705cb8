//! Action controller: turns a namespace's recorded health status into
//! the side effects the matched policy asks for — deletion and
//! notification.
//!
//! Three independent tasks: delete namespaces stuck at `stale`, delete
//! namespaces stuck at `failed`, and notify the owner of namespaces
//! sitting at `failing`/`unstable`. None
//! of them ever touch a namespace that is `Terminating` or on the
//! deny-list, and none of them call out to the People API — the `owner`
//! annotation is already a resolved, opaque address by the time this
//! controller reads it.

use std::collections::BTreeMap;
use std::str::FromStr;

use tracing::{info, warn};

use crate::adapter::{KubernetesAdapter, NamespaceDto, NamespaceFilter};
use crate::config::{Config, NamespacePolicy, StatusActionConfig};
use crate::matcher;
use crate::metrics::SharedMetrics;
use crate::notify::{NotificationContext, Notifier};
use crate::state::Status;
use crate::types::{annotation, is_denied};

fn status_action<'a>(policy: &'a NamespacePolicy, status: Status) -> Option<&'a StatusActionConfig> {
    match status {
        Status::Stale => Some(&policy.stale),
        Status::Failed => Some(&policy.failed),
        Status::Failing => Some(&policy.failing),
        Status::Unstable => Some(&policy.unstable),
        Status::Ok | Status::Unknown => None,
    }
}

fn current_status(ns: &NamespaceDto) -> Status {
    ns.annotations
        .get(&annotation::status())
        .and_then(|s| Status::from_str(s).ok())
        .unwrap_or(Status::Unknown)
}

/// A namespace is eligible for this controller's actions only while it
/// is `Active` and not on the deny-list — the core never mutates a
/// `Terminating` namespace, and never adopts or acts on the
/// control-plane namespaces or its own.
fn in_scope(ns: &NamespaceDto, manager_namespace: &str) -> bool {
    use crate::adapter::dto::NamespacePhase;
    ns.phase == NamespacePhase::Active && !is_denied(&ns.name, manager_namespace)
}

fn status_filter(status: Status) -> NamespaceFilter {
    let mut filter = NamespaceFilter::default();
    filter
        .include_annotations
        .insert(annotation::managed(), "^true$".to_string());
    filter
        .include_annotations
        .insert(annotation::status(), format!("^{}$", status.as_str()));
    filter
}

/// Deletes namespaces whose matched policy asks for deletion while
/// `stale`. Fires `notify_on_delete` immediately before deleting, since
/// there is no namespace left to notify about afterward.
pub async fn delete_stale_namespaces(
    adapter: &KubernetesAdapter,
    config: &Config,
    notifier: &dyn Notifier,
    metrics: &SharedMetrics,
) {
    delete_namespaces_at(adapter, config, notifier, metrics, Status::Stale).await;
}

/// Deletes namespaces whose matched policy asks for deletion while
/// `failed`.
pub async fn delete_failed_namespaces(
    adapter: &KubernetesAdapter,
    config: &Config,
    notifier: &dyn Notifier,
    metrics: &SharedMetrics,
) {
    delete_namespaces_at(adapter, config, notifier, metrics, Status::Failed).await;
}

async fn delete_namespaces_at(
    adapter: &KubernetesAdapter,
    config: &Config,
    notifier: &dyn Notifier,
    metrics: &SharedMetrics,
    status: Status,
) {
    let namespaces = adapter.get_namespaces_by(&status_filter(status)).await;

    for ns in &namespaces {
        if !in_scope(ns, &config.context.namespace) {
            continue;
        }
        let Some(policy) = matcher::match_namespace(&config.namespaces, ns) else {
            continue;
        };
        let Some(action) = status_action(policy, status) else {
            continue;
        };
        if !action.delete {
            continue;
        }

        if action.notify_on_delete {
            notify(ns, status, "scheduled-deletion", notifier, metrics).await;
        }

        info!(namespace = %ns.name, status = status.as_str(), "deleting namespace");
        match adapter.delete_namespace(&ns.name, 0).await {
            Ok(()) => metrics.record_namespace_deleted(status.as_str()),
            Err(e) => warn!(namespace = %ns.name, error = %e, "failed to delete namespace"),
        }
    }
}

/// Notifies the owner of any managed namespace whose policy has
/// `notify_on_status` set for its current status. Gated on
/// `notified_timestamp` being absent, which the health state machine
/// clears on every status transition — so this produces at most one
/// notification per status episode no matter how many ticks elapse while
/// the namespace sits at that status.
pub async fn notify_failing_or_unstable(
    adapter: &KubernetesAdapter,
    config: &Config,
    notifier: &dyn Notifier,
    metrics: &SharedMetrics,
) {
    let mut filter = NamespaceFilter::default();
    filter
        .include_annotations
        .insert(annotation::managed(), "^true$".to_string());
    filter
        .include_annotations
        .insert(annotation::status(), "^(failing|unstable)$".to_string());
    filter.include_annotations.insert(annotation::owner(), ".+".to_string());

    let namespaces = adapter.get_namespaces_by(&filter).await;

    for ns in &namespaces {
        if !in_scope(ns, &config.context.namespace) {
            continue;
        }
        if already_notified(ns) {
            continue;
        }
        let Some(policy) = matcher::match_namespace(&config.namespaces, ns) else {
            continue;
        };
        let status = current_status(ns);
        let Some(action) = status_action(policy, status) else {
            continue;
        };
        if !action.notify_on_status {
            continue;
        }

        if !notify(ns, status, "status-change", notifier, metrics).await {
            // Delivery failed: leave the markers unset so the next tick
            // retries, per the external-dependency rule in §7.
            continue;
        }

        let mut annotations = BTreeMap::new();
        annotations.insert(annotation::notified_timestamp(), chrono::Utc::now().to_rfc3339());
        annotations.insert(annotation::notified_status(), status.as_str().to_string());
        if let Err(e) = adapter.patch_namespace(&ns.name, &BTreeMap::new(), &annotations).await {
            warn!(namespace = %ns.name, error = %e, "failed to record notification");
        }
    }
}

/// `notified_timestamp` is present and non-empty, and was recorded for
/// the namespace's *current* status — matching the annotation table's
/// invariant that a status transition clears both fields.
fn already_notified(ns: &NamespaceDto) -> bool {
    let timestamp = ns.annotations.get(&annotation::notified_timestamp());
    let recorded_for = ns.annotations.get(&annotation::notified_status());
    match (timestamp, recorded_for) {
        (Some(t), Some(s)) if !t.is_empty() && !s.is_empty() => *s == current_status(ns).as_str(),
        _ => false,
    }
}

/// Sends the notification and reports whether delivery succeeded, so
/// callers that record a "notified" marker only do so on success.
async fn notify(ns: &NamespaceDto, status: Status, reason: &str, notifier: &dyn Notifier, metrics: &SharedMetrics) -> bool {
    let owner = ns.annotations.get(&annotation::owner()).map(String::as_str);
    let ctx = NotificationContext::new(&ns.name, status, reason, owner);
    match notifier.notify(&ctx).await {
        Ok(()) => {
            metrics.record_notification(reason, true);
            true
        }
        Err(e) => {
            metrics.record_notification(reason, false);
            warn!(namespace = %ns.name, error = %e, "failed to send notification");
            false
        }
    }
}

#[cfg(test)]
#[path = "action_test.rs"]
mod tests;
