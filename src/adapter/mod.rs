//! Thin, typed wrapper around the Kubernetes API.
//!
//! Every read here degrades to an empty result instead of propagating a
//! transient cluster error: controllers run on a period anyway, and a
//! blip that empties one tick's namespace list is cheaper to tolerate
//! than to retry inline. Writes (`patch_namespace`, `delete_namespace`,
//! job/cronjob creation) propagate their error, since the caller needs
//! to know whether its action actually landed.

pub mod dto;

use std::collections::BTreeMap;
use std::time::Duration;

use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, ReplicaSet, StatefulSet};
use k8s_openapi::api::batch::v1::{CronJob, Job};
use k8s_openapi::api::core::v1::{Namespace, Pod};
use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams, PostParams, PropagationPolicy};
use kube::Client;
use regex::Regex;
use tracing::warn;

pub use dto::{CronJobDto, JobDto, NamespaceDto};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Label/annotation include-exclude filter, evaluated per namespace.
///
/// A namespace matches when every `include_*` key is present and its
/// value matches the associated regex, and no `exclude_*` key matches.
/// An empty filter matches everything.
#[derive(Debug, Clone, Default)]
pub struct NamespaceFilter {
    pub include_labels: BTreeMap<String, String>,
    pub exclude_labels: BTreeMap<String, String>,
    pub include_annotations: BTreeMap<String, String>,
    pub exclude_annotations: BTreeMap<String, String>,
}

impl NamespaceFilter {
    fn matches_map(wanted: &BTreeMap<String, String>, actual: &BTreeMap<String, String>) -> bool {
        wanted.iter().all(|(key, pattern)| {
            actual
                .get(key)
                .map(|value| regex_matches(pattern, value))
                .unwrap_or(false)
        })
    }

    fn excluded_by_map(unwanted: &BTreeMap<String, String>, actual: &BTreeMap<String, String>) -> bool {
        unwanted.iter().any(|(key, pattern)| {
            actual
                .get(key)
                .map(|value| regex_matches(pattern, value))
                .unwrap_or(false)
        })
    }

    pub fn matches(&self, ns: &NamespaceDto) -> bool {
        Self::matches_map(&self.include_labels, &ns.labels)
            && Self::matches_map(&self.include_annotations, &ns.annotations)
            && !Self::excluded_by_map(&self.exclude_labels, &ns.labels)
            && !Self::excluded_by_map(&self.exclude_annotations, &ns.annotations)
    }
}

fn regex_matches(pattern: &str, value: &str) -> bool {
    match Regex::new(pattern) {
        Ok(re) => re.is_match(value),
        Err(_) => pattern == value,
    }
}

/// Typed Kubernetes client used by every controller and probe.
#[derive(Clone)]
pub struct KubernetesAdapter {
    client: Client,
}

impl KubernetesAdapter {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Lists all namespaces matching `filter`. Never fails: a cluster
    /// error is logged and treated as "no namespaces this tick".
    pub async fn get_namespaces_by(&self, filter: &NamespaceFilter) -> Vec<NamespaceDto> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let list = match tokio::time::timeout(REQUEST_TIMEOUT, api.list(&ListParams::default())).await
        {
            Ok(Ok(list)) => list,
            Ok(Err(e)) => {
                warn!(error = %e, "failed to list namespaces");
                return Vec::new();
            }
            Err(_) => {
                warn!("timed out listing namespaces");
                return Vec::new();
            }
        };

        list.items
            .iter()
            .map(NamespaceDto::from)
            .filter(|ns| filter.matches(ns))
            .collect()
    }

    pub async fn get_namespace(&self, name: &str) -> Option<NamespaceDto> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        match tokio::time::timeout(REQUEST_TIMEOUT, api.get(name)).await {
            Ok(Ok(ns)) => Some(NamespaceDto::from(&ns)),
            Ok(Err(kube::Error::Api(e))) if e.code == 404 => None,
            Ok(Err(e)) => {
                warn!(namespace = name, error = %e, "failed to fetch namespace");
                None
            }
            Err(_) => {
                warn!(namespace = name, "timed out fetching namespace");
                None
            }
        }
    }

    /// Merge-patches a namespace's labels/annotations. Propagates errors:
    /// a caller that just decided "mark this namespace as failing" needs
    /// to know that the write didn't happen.
    pub async fn patch_namespace(
        &self,
        name: &str,
        labels: &BTreeMap<String, String>,
        annotations: &BTreeMap<String, String>,
    ) -> kube::Result<()> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let patch = serde_json::json!({
            "metadata": {
                "labels": labels,
                "annotations": annotations,
            }
        });
        api.patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }

    /// Deletes a namespace with the given grace period in seconds. The
    /// action controller always passes `0` unless a policy is extended
    /// to specify otherwise (§4.7: "Deletion uses grace_period = 0 unless
    /// the policy specifies otherwise").
    pub async fn delete_namespace(&self, name: &str, grace_period_seconds: u32) -> kube::Result<()> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let dp = DeleteParams {
            grace_period_seconds: Some(grace_period_seconds),
            ..DeleteParams::default()
        };
        api.delete(name, &dp).await?;
        Ok(())
    }

    pub async fn get_cronjobs_by(&self, namespace: &str, label_selector: &str) -> Vec<CronJobDto> {
        let api: Api<CronJob> = Api::namespaced(self.client.clone(), namespace);
        let params = ListParams::default().labels(label_selector);
        match tokio::time::timeout(REQUEST_TIMEOUT, api.list(&params)).await {
            Ok(Ok(list)) => list.items.iter().map(CronJobDto::from).collect(),
            Ok(Err(e)) => {
                warn!(namespace, error = %e, "failed to list cronjobs");
                Vec::new()
            }
            Err(_) => {
                warn!(namespace, "timed out listing cronjobs");
                Vec::new()
            }
        }
    }

    pub async fn create_cronjob(&self, namespace: &str, cronjob: &CronJob) -> kube::Result<()> {
        let api: Api<CronJob> = Api::namespaced(self.client.clone(), namespace);
        api.create(&PostParams::default(), cronjob).await?;
        Ok(())
    }

    pub async fn replace_cronjob(&self, namespace: &str, name: &str, cronjob: &CronJob) -> kube::Result<()> {
        let api: Api<CronJob> = Api::namespaced(self.client.clone(), namespace);
        let patch = serde_json::to_value(cronjob).unwrap_or_default();
        api.patch(name, &PatchParams::apply("nsreaper"), &Patch::Apply(&patch))
            .await?;
        Ok(())
    }

    pub async fn get_jobs_by(&self, namespace: &str, label_selector: &str) -> Vec<JobDto> {
        let api: Api<Job> = Api::namespaced(self.client.clone(), namespace);
        let params = ListParams::default().labels(label_selector);
        match tokio::time::timeout(REQUEST_TIMEOUT, api.list(&params)).await {
            Ok(Ok(list)) => list.items.iter().map(JobDto::from).collect(),
            Ok(Err(e)) => {
                warn!(namespace, error = %e, "failed to list jobs");
                Vec::new()
            }
            Err(_) => {
                warn!(namespace, "timed out listing jobs");
                Vec::new()
            }
        }
    }

    pub async fn create_job(&self, namespace: &str, job: &Job) -> kube::Result<()> {
        let api: Api<Job> = Api::namespaced(self.client.clone(), namespace);
        api.create(&PostParams::default(), job).await?;
        Ok(())
    }

    /// Kubernetes-API fallback for failure detection, used when
    /// Prometheus is disabled or unreachable. Scans Deployments,
    /// StatefulSets and ReplicaSets for `available_replicas < desired`,
    /// and DaemonSets too when `include_daemonsets` is set — daemonset
    /// pods are frequently node-bound and tolerate a degree of
    /// unavailability by design, hence the flag rather than always-on.
    /// Returns the names of every failing workload, since
    /// `failing_resources` records them individually rather than just a
    /// yes/no verdict.
    pub async fn failing_workloads(&self, namespace: &str, include_daemonsets: bool) -> Vec<String> {
        let mut failing = Vec::new();

        let deployments: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        match tokio::time::timeout(REQUEST_TIMEOUT, deployments.list(&ListParams::default())).await {
            Ok(Ok(list)) => failing.extend(list.items.iter().filter_map(|d| {
                let status = d.status.as_ref()?;
                let desired = d.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1);
                let available = status.available_replicas.unwrap_or(0);
                (available < desired).then(|| d.metadata.name.clone().unwrap_or_default())
            })),
            Ok(Err(e)) => warn!(namespace, error = %e, "failed to list deployments"),
            Err(_) => warn!(namespace, "timed out listing deployments"),
        }

        let statefulsets: Api<StatefulSet> = Api::namespaced(self.client.clone(), namespace);
        match tokio::time::timeout(REQUEST_TIMEOUT, statefulsets.list(&ListParams::default())).await {
            Ok(Ok(list)) => failing.extend(list.items.iter().filter_map(|s| {
                let status = s.status.as_ref()?;
                let desired = s.spec.as_ref().and_then(|sp| sp.replicas).unwrap_or(1);
                let available = status.available_replicas.unwrap_or(0);
                (available < desired).then(|| s.metadata.name.clone().unwrap_or_default())
            })),
            Ok(Err(e)) => warn!(namespace, error = %e, "failed to list statefulsets"),
            Err(_) => warn!(namespace, "timed out listing statefulsets"),
        }

        let replicasets: Api<ReplicaSet> = Api::namespaced(self.client.clone(), namespace);
        match tokio::time::timeout(REQUEST_TIMEOUT, replicasets.list(&ListParams::default())).await {
            Ok(Ok(list)) => failing.extend(list.items.iter().filter_map(|r| {
                let status = r.status.as_ref()?;
                let desired = r.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1);
                let available = status.available_replicas.unwrap_or(0);
                (available < desired).then(|| r.metadata.name.clone().unwrap_or_default())
            })),
            Ok(Err(e)) => warn!(namespace, error = %e, "failed to list replicasets"),
            Err(_) => warn!(namespace, "timed out listing replicasets"),
        }

        if include_daemonsets {
            let daemonsets: Api<DaemonSet> = Api::namespaced(self.client.clone(), namespace);
            match tokio::time::timeout(REQUEST_TIMEOUT, daemonsets.list(&ListParams::default())).await {
                Ok(Ok(list)) => failing.extend(list.items.iter().filter_map(|d| {
                    let status = d.status.as_ref()?;
                    (status.number_unavailable.unwrap_or(0) > 0).then(|| d.metadata.name.clone().unwrap_or_default())
                })),
                Ok(Err(e)) => warn!(namespace, error = %e, "failed to list daemonsets"),
                Err(_) => warn!(namespace, "timed out listing daemonsets"),
            }
        }

        failing
    }

    pub async fn delete_job(&self, namespace: &str, name: &str) -> kube::Result<()> {
        let api: Api<Job> = Api::namespaced(self.client.clone(), namespace);
        let dp = DeleteParams {
            propagation_policy: Some(PropagationPolicy::Background),
            ..DeleteParams::default()
        };
        api.delete(name, &dp).await?;
        Ok(())
    }

    pub async fn delete_cronjob(&self, namespace: &str, name: &str) -> kube::Result<()> {
        let api: Api<CronJob> = Api::namespaced(self.client.clone(), namespace);
        let dp = DeleteParams {
            propagation_policy: Some(PropagationPolicy::Background),
            ..DeleteParams::default()
        };
        api.delete(name, &dp).await?;
        Ok(())
    }

    /// Deletes every pod matching `label_selector` in `namespace`. Used
    /// alongside `delete_job`: a Job's own deletion eventually reaps its
    /// pods through garbage collection, but the reconciler deletes them
    /// explicitly by `job-name=<job>` so a recreated Job never races a
    /// straggling pod from the one it replaced.
    pub async fn delete_pods_by_label(&self, namespace: &str, label_selector: &str) -> kube::Result<()> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let params = ListParams::default().labels(label_selector);
        let pods = match tokio::time::timeout(REQUEST_TIMEOUT, api.list(&params)).await {
            Ok(Ok(list)) => list,
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                warn!(namespace, "timed out listing pods for deletion");
                return Ok(());
            }
        };
        for pod in pods.items {
            if let Some(name) = pod.metadata.name {
                api.delete(&name, &DeleteParams::default()).await?;
            }
        }
        Ok(())
    }

    /// True once the named Job has fully disappeared from the API.
    /// Polled by the reconciler's bounded wait before recreating a Job
    /// whose rendered manifest has drifted — Jobs are immutable, so a
    /// drifted Job must be gone before its replacement can take the name.
    pub async fn job_gone(&self, namespace: &str, name: &str) -> bool {
        let api: Api<Job> = Api::namespaced(self.client.clone(), namespace);
        matches!(api.get(name).await, Err(kube::Error::Api(e)) if e.code == 404)
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
