//! Annotation keys written onto managed namespaces.
//!
//! These are the only channel the collector and action controllers use to
//! pass state between ticks — there is no separate datastore. Every key
//! lives under one vendor prefix so a namespace can be inspected with
//! `kubectl get ns <name> -o jsonpath='{.metadata.annotations}'` and read
//! as a coherent unit.

pub const ANNOTATION_PREFIX: &str = "nsreaper.ska-telescope.org";

pub mod annotation {
    use super::ANNOTATION_PREFIX;

    macro_rules! annotation_key {
        ($name:ident, $suffix:literal) => {
            pub fn $name() -> String {
                format!("{}/{}", ANNOTATION_PREFIX, $suffix)
            }
        };
    }

    annotation_key!(managed, "managed");
    annotation_key!(status, "status");
    annotation_key!(status_timestamp, "status-timestamp");
    annotation_key!(status_finalize_at, "status-finalize-at");
    annotation_key!(status_timeframe, "status-timeframe");
    annotation_key!(failing_resources, "failing-resources");
    annotation_key!(owner, "owner");
    annotation_key!(notified_timestamp, "notified-timestamp");
    annotation_key!(notified_status, "notified-status");
    annotation_key!(action, "action");
    annotation_key!(target_namespace, "namespace");
    annotation_key!(team, "team");
    annotation_key!(project, "project");
    annotation_key!(pipeline_id, "pipeline-id");
    annotation_key!(project_id, "project-id");
    annotation_key!(environment, "environment");
    annotation_key!(last_checked, "last-checked");
}

/// Namespaces the collect controller never adopts and the action
/// controller never acts on, regardless of policy match: the core
/// control-plane namespaces, plus the manager's own namespace (passed in
/// at call sites since it's only known from config).
pub const DENY_LIST: &[&str] = &["kube-system", "kube-public", "kube-node-lease", "default"];

/// True if `name` is in the static deny-list or is the manager's own
/// namespace (`context.namespace` in config) — such namespaces are never
/// adopted, reconciled, notified about, or deleted.
pub fn is_denied(name: &str, manager_namespace: &str) -> bool {
    DENY_LIST.contains(&name) || name == manager_namespace
}
