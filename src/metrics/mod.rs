//! Prometheus metrics for the namespace lifecycle manager.
//!
//! Exposes one gauge per managed namespace carrying its current health
//! status as a numeric code (see `Status::metric_code`), labeled with the
//! ownership metadata recorded in its annotations so dashboards can slice
//! by team, project or pipeline without a join against another source.

use prometheus::{self, Encoder, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crate::state::Status;

#[derive(Clone)]
pub struct ControllerMetrics {
    registry: Registry,
    /// Current status of each managed namespace, by status code.
    pub namespace_status: IntGaugeVec,
    /// Count of collect/action controller task runs, by task name and
    /// outcome ("ok" or "error").
    pub task_runs_total: IntCounterVec,
    /// Count of namespace deletions triggered, by reason (the status that
    /// caused the delete).
    pub namespaces_deleted_total: IntCounterVec,
    /// Count of notifications sent, by channel and outcome.
    pub notifications_total: IntCounterVec,
    /// 1 if this replica currently holds the leader lock, 0 otherwise.
    /// Purely observational — no task in this crate reads it back to
    /// decide whether it is leader; `LeaderLock::is_leader` is the source
    /// of truth, this is just its value published for dashboards.
    pub leader: IntGauge,
    /// The exact label tuple published for each namespace on the
    /// previous `sync_namespace_gauges` call, so a namespace that
    /// disappears between ticks can have its series removed instead of
    /// lingering at a stale value forever.
    published: Mutex<BTreeMap<String, Vec<String>>>,
}

const NAMESPACE_LABELS: &[&str] = &["namespace", "team", "project", "user", "environment", "pipeline_id", "project_id"];

impl ControllerMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let namespace_status = IntGaugeVec::new(
            Opts::new(
                "nsreaper_namespace_status",
                "Current health status of a managed namespace (0=ok,1=stale,2=failing,3=failed,4=unstable,5=unknown)",
            ),
            NAMESPACE_LABELS,
        )?;
        registry.register(Box::new(namespace_status.clone()))?;

        let task_runs_total = IntCounterVec::new(
            Opts::new("nsreaper_task_runs_total", "Total scheduled task runs"),
            &["task", "outcome"],
        )?;
        registry.register(Box::new(task_runs_total.clone()))?;

        let namespaces_deleted_total = IntCounterVec::new(
            Opts::new("nsreaper_namespaces_deleted_total", "Total namespaces deleted by the action controller"),
            &["reason"],
        )?;
        registry.register(Box::new(namespaces_deleted_total.clone()))?;

        let notifications_total = IntCounterVec::new(
            Opts::new("nsreaper_notifications_total", "Total notifications sent"),
            &["channel", "outcome"],
        )?;
        registry.register(Box::new(notifications_total.clone()))?;

        let leader = IntGauge::new("nsreaper_leader", "1 if this replica currently holds the leader lock")?;
        registry.register(Box::new(leader.clone()))?;

        Ok(Self {
            registry,
            namespace_status,
            task_runs_total,
            namespaces_deleted_total,
            notifications_total,
            leader,
            published: Mutex::new(BTreeMap::new()),
        })
    }

    pub fn set_leader(&self, is_leader: bool) {
        self.leader.set(if is_leader { 1 } else { 0 });
    }

    fn label_values(labels: &NamespaceLabels) -> Vec<String> {
        vec![
            labels.namespace.clone(),
            labels.team.clone(),
            labels.project.clone(),
            labels.user.clone(),
            labels.environment.clone(),
            labels.pipeline_id.clone(),
            labels.project_id.clone(),
        ]
    }

    pub fn set_namespace_status(&self, labels: &NamespaceLabels, status: Status) {
        let values = Self::label_values(labels);
        let refs: Vec<&str> = values.iter().map(String::as_str).collect();
        self.namespace_status.with_label_values(&refs).set(status.metric_code());
        self.published
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(labels.namespace.clone(), values);
    }

    /// Publishes the current status of every managed namespace and
    /// removes the gauge series for any namespace that was published on
    /// a previous tick but isn't present this time — the collect
    /// controller's view of "managed namespaces" is authoritative, so a
    /// namespace missing from it (deleted, unmanaged, or gone) should not
    /// leave a stale series behind.
    pub fn sync_namespace_gauges(&self, current: &[(NamespaceLabels, Status)]) {
        let mut still_present = std::collections::HashSet::new();
        for (labels, status) in current {
            self.set_namespace_status(labels, *status);
            still_present.insert(labels.namespace.clone());
        }

        let mut published = self.published.lock().unwrap_or_else(|e| e.into_inner());
        let gone: Vec<String> = published
            .keys()
            .filter(|ns| !still_present.contains(*ns))
            .cloned()
            .collect();
        for namespace in gone {
            if let Some(values) = published.remove(&namespace) {
                let refs: Vec<&str> = values.iter().map(String::as_str).collect();
                let _ = self.namespace_status.remove_label_values(&refs);
            }
        }
    }

    pub fn record_task_run(&self, task: &str, ok: bool) {
        self.task_runs_total
            .with_label_values(&[task, if ok { "ok" } else { "error" }])
            .inc();
    }

    pub fn record_namespace_deleted(&self, reason: &str) {
        self.namespaces_deleted_total.with_label_values(&[reason]).inc();
    }

    pub fn record_notification(&self, channel: &str, ok: bool) {
        self.notifications_total
            .with_label_values(&[channel, if ok { "ok" } else { "error" }])
            .inc();
    }

    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|e| prometheus::Error::Msg(format!("failed to encode metrics as utf-8: {e}")))
    }
}

/// Label values pulled from a namespace's ownership annotations, with
/// `"unknown"` standing in for anything absent so every gauge series has
/// a complete label set.
#[derive(Debug, Clone)]
pub struct NamespaceLabels {
    pub namespace: String,
    pub team: String,
    pub project: String,
    pub user: String,
    pub environment: String,
    pub pipeline_id: String,
    pub project_id: String,
}

impl NamespaceLabels {
    pub fn from_annotations(namespace: &str, annotations: &std::collections::BTreeMap<String, String>) -> Self {
        let get = |key: String| annotations.get(&key).cloned().unwrap_or_else(|| "unknown".to_string());

        // `owner` holds the base64 "name::slack_id" address; the gauge
        // label wants the human name, not the opaque address.
        let user = annotations
            .get(&crate::types::annotation::owner())
            .and_then(|address| crate::probe::get_owner_info::decode_owner_address(address))
            .map(|(name, _)| name)
            .unwrap_or_else(|| "unknown".to_string());

        Self {
            namespace: namespace.to_string(),
            team: get(crate::types::annotation::team()),
            project: get(crate::types::annotation::project()),
            user,
            environment: get(crate::types::annotation::environment()),
            pipeline_id: get(crate::types::annotation::pipeline_id()),
            project_id: get(crate::types::annotation::project_id()),
        }
    }
}

pub type SharedMetrics = Arc<ControllerMetrics>;

pub fn create_metrics() -> Result<SharedMetrics, prometheus::Error> {
    Ok(Arc::new(ControllerMetrics::new()?))
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
