//! Collect controller: adopts unmanaged namespaces, keeps one probe
//! CronJob and one owner-lookup Job per managed namespace reconciled in
//! the manager's own namespace, and republishes the status gauges read
//! back from each namespace's annotations.
//!
//! Every manager-owned CronJob/Job lives in `context.namespace`, not the
//! namespace it probes — routed back to its target purely through the
//! `managed`/`namespace`/`action` annotation triad (mirrored onto labels
//! so the adapter's label-selector listing can find them again).

use std::collections::BTreeMap;

use k8s_openapi::api::batch::v1::{CronJob, CronJobSpec, Job, JobSpec, JobTemplateSpec};
use k8s_openapi::api::core::v1::{Container, EnvVar, PodSpec, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::adapter::{JobDto, KubernetesAdapter, NamespaceDto, NamespaceFilter};
use crate::config::Config;
use crate::matcher;
use crate::metrics::{NamespaceLabels, SharedMetrics};
use crate::state::Status;
use crate::types::{annotation, is_denied};

const MANAGED_LABEL: &str = "nsreaper.ska-telescope.org/managed";
const NAMESPACE_LABEL: &str = "nsreaper.ska-telescope.org/namespace";
const ACTION_LABEL: &str = "nsreaper.ska-telescope.org/action";
const SPEC_HASH_ANNOTATION: &str = "nsreaper.ska-telescope.org/spec-hash";
const PROBE_IMAGE_ENV: &str = "NSREAPER_PROBE_IMAGE";
const DEFAULT_PROBE_IMAGE: &str = "nsreaper-probe:latest";
const CHECK_SCHEDULE: &str = "*/5 * * * *";

/// Bounded wait for a drifted Job to disappear before its replacement is
/// created: ten 1s polls, matching the 10s ceiling every other blocking
/// wait in this crate respects.
const JOB_GONE_POLL_INTERVAL: std::time::Duration = std::time::Duration::from_secs(1);
const JOB_GONE_POLL_ATTEMPTS: u32 = 10;

fn probe_image() -> String {
    std::env::var(PROBE_IMAGE_ENV).unwrap_or_else(|_| DEFAULT_PROBE_IMAGE.to_string())
}

fn object_name(action: &str, namespace: &str) -> String {
    format!("nsreaper-{action}-{namespace}")
}

/// First 4 bytes (8 hex chars) of the sha256 of the rendered PodSpec —
/// enough to detect drift without carrying a full digest around on every
/// managed object.
fn spec_hash(pod_spec: &PodSpec) -> String {
    let encoded = serde_json::to_vec(pod_spec).unwrap_or_default();
    let digest = Sha256::digest(&encoded);
    hex::encode(&digest[..4])
}

fn routing_labels(target_namespace: &str, action: &str) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(MANAGED_LABEL.to_string(), "true".to_string());
    labels.insert(NAMESPACE_LABEL.to_string(), target_namespace.to_string());
    labels.insert(ACTION_LABEL.to_string(), action.to_string());
    labels
}

fn routing_annotations(target_namespace: &str, action: &str) -> BTreeMap<String, String> {
    let mut annotations = BTreeMap::new();
    annotations.insert(annotation::managed(), "true".to_string());
    annotations.insert(annotation::target_namespace(), target_namespace.to_string());
    annotations.insert(annotation::action(), action.to_string());
    annotations
}

fn probe_pod_spec(action: &str, target_namespace: &str) -> PodSpec {
    let container = Container {
        name: action.to_string(),
        image: Some(probe_image()),
        args: Some(vec![
            "--action".to_string(),
            action.to_string(),
            "--namespace".to_string(),
            target_namespace.to_string(),
        ]),
        env: Some(vec![EnvVar {
            name: "NSREAPER_TARGET_NAMESPACE".to_string(),
            value: Some(target_namespace.to_string()),
            ..Default::default()
        }]),
        ..Default::default()
    };

    PodSpec {
        containers: vec![container],
        restart_policy: Some("OnFailure".to_string()),
        ..Default::default()
    }
}

/// Renders the periodic `check-namespace` CronJob for `target_namespace`,
/// to be created in `manager_namespace`.
fn build_cronjob(manager_namespace: &str, target_namespace: &str) -> CronJob {
    const ACTION: &str = "check-namespace";
    let labels = routing_labels(target_namespace, ACTION);
    let pod_spec = probe_pod_spec(ACTION, target_namespace);

    let job_spec = JobSpec {
        template: PodTemplateSpec {
            metadata: Some(ObjectMeta {
                labels: Some(labels.clone()),
                ..Default::default()
            }),
            spec: Some(pod_spec),
        },
        backoff_limit: Some(2),
        ttl_seconds_after_finished: Some(600),
        ..Default::default()
    };

    let cronjob_spec = CronJobSpec {
        schedule: CHECK_SCHEDULE.to_string(),
        job_template: JobTemplateSpec {
            metadata: Some(ObjectMeta {
                labels: Some(labels.clone()),
                ..Default::default()
            }),
            spec: Some(job_spec),
        },
        concurrency_policy: Some("Forbid".to_string()),
        successful_jobs_history_limit: Some(1),
        failed_jobs_history_limit: Some(1),
        ..Default::default()
    };

    CronJob {
        metadata: ObjectMeta {
            name: Some(object_name(ACTION, target_namespace)),
            namespace: Some(manager_namespace.to_string()),
            labels: Some(labels),
            annotations: Some(routing_annotations(target_namespace, ACTION)),
            ..Default::default()
        },
        spec: Some(cronjob_spec),
        status: None,
    }
}

/// Renders the one-shot `get-owner-info` Job for `target_namespace`, to
/// be created in `manager_namespace`. Carries `spec_hash` so the
/// reconciler can detect drift and recreate it (Jobs are immutable).
fn build_owner_info_job(manager_namespace: &str, target_namespace: &str) -> Job {
    const ACTION: &str = "get-owner-info";
    let labels = routing_labels(target_namespace, ACTION);
    let pod_spec = probe_pod_spec(ACTION, target_namespace);
    let hash = spec_hash(&pod_spec);

    let mut annotations = routing_annotations(target_namespace, ACTION);
    annotations.insert(SPEC_HASH_ANNOTATION.to_string(), hash);

    Job {
        metadata: ObjectMeta {
            name: Some(object_name(ACTION, target_namespace)),
            namespace: Some(manager_namespace.to_string()),
            labels: Some(labels.clone()),
            annotations: Some(annotations),
            ..Default::default()
        },
        spec: Some(JobSpec {
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(pod_spec),
            },
            backoff_limit: Some(2),
            ttl_seconds_after_finished: Some(600),
            ..Default::default()
        }),
        status: None,
    }
}

/// Adopts namespaces matching a configured policy that aren't managed
/// yet. Runs unconditionally on every replica: each
/// candidate is independently deny-listed, policy-matched, and created
/// via a plain `create` — a second replica racing the same namespace
/// gets a harmless 409 from the Kubernetes API, not a corrupted object.
pub async fn adopt_new_namespaces(adapter: &KubernetesAdapter, config: &Config) {
    let manager_namespace = &config.context.namespace;
    let namespaces = adapter.get_namespaces_by(&NamespaceFilter::default()).await;

    for ns in &namespaces {
        if is_denied(&ns.name, manager_namespace) {
            continue;
        }
        if ns.annotations.get(&annotation::managed()).map(String::as_str) == Some("true") {
            continue;
        }
        use crate::adapter::dto::NamespacePhase;
        if ns.phase == NamespacePhase::Terminating {
            continue;
        }
        if matcher::match_namespace(&config.namespaces, ns).is_none() {
            continue;
        }

        info!(namespace = %ns.name, "adopting namespace");

        let delay = config.prometheus.cronjob_delay;
        if config.prometheus.enabled && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let cronjob = build_cronjob(manager_namespace, &ns.name);
        if let Err(e) = adapter.create_cronjob(manager_namespace, &cronjob).await {
            warn!(namespace = %ns.name, error = %e, "failed to create probe cronjob");
            continue;
        }

        let job = build_owner_info_job(manager_namespace, &ns.name);
        if let Err(e) = adapter.create_job(manager_namespace, &job).await {
            warn!(namespace = %ns.name, error = %e, "failed to create owner-info job");
        }

        let mut annotations = BTreeMap::new();
        annotations.insert(annotation::managed(), "true".to_string());
        annotations.insert(annotation::status(), Status::Unknown.as_str().to_string());
        annotations.insert(annotation::target_namespace(), manager_namespace.clone());
        if let Err(e) = adapter.patch_namespace(&ns.name, &BTreeMap::new(), &annotations).await {
            warn!(namespace = %ns.name, error = %e, "failed to mark namespace as adopted");
        }
    }
}

/// A manager-owned object's routing metadata, read back off its
/// annotations. `None` if either annotation is missing — such an object
/// was not created by this controller and is left alone.
fn routing_of(annotations: &BTreeMap<String, String>) -> Option<(String, String)> {
    let target = annotations.get(&annotation::target_namespace())?.clone();
    let action = annotations.get(&annotation::action())?.clone();
    Some((target, action))
}

fn still_matched(namespaces: &[NamespaceDto], config: &Config, target: &str) -> bool {
    namespaces
        .iter()
        .find(|ns| ns.name == target)
        .map(|ns| matcher::match_namespace(&config.namespaces, ns).is_some())
        .unwrap_or(false)
}

/// Reconciles every manager-owned `check-namespace` CronJob: deletes it
/// if its target namespace is gone or no longer matches any policy,
/// otherwise re-renders and applies it unconditionally —
/// `replace_cronjob` is a server-side apply, so this is idempotent and
/// needs no drift hash of its own.
pub async fn reconcile_cronjobs(adapter: &KubernetesAdapter, config: &Config) {
    let manager_namespace = &config.context.namespace;
    let namespaces = adapter.get_namespaces_by(&NamespaceFilter::default()).await;
    let cronjobs = adapter
        .get_cronjobs_by(manager_namespace, &format!("{MANAGED_LABEL}=true"))
        .await;

    for cronjob in &cronjobs {
        let Some((target, action)) = routing_of(&cronjob.annotations) else {
            continue;
        };
        if action != "check-namespace" {
            continue;
        }

        if !namespaces.iter().any(|ns| ns.name == target) {
            info!(namespace = %target, cronjob = %cronjob.name, "target namespace gone, pruning cronjob");
            if let Err(e) = adapter.delete_cronjob(manager_namespace, &cronjob.name).await {
                warn!(namespace = %target, cronjob = %cronjob.name, error = %e, "failed to prune cronjob");
            }
            continue;
        }

        if !still_matched(&namespaces, config, &target) {
            info!(namespace = %target, cronjob = %cronjob.name, "namespace no longer matches any policy, pruning cronjob");
            if let Err(e) = adapter.delete_cronjob(manager_namespace, &cronjob.name).await {
                warn!(namespace = %target, cronjob = %cronjob.name, error = %e, "failed to prune cronjob");
            }
            continue;
        }

        debug!(namespace = %target, "reapplying cronjob");
        let desired = build_cronjob(manager_namespace, &target);
        if let Err(e) = adapter
            .replace_cronjob(manager_namespace, &cronjob.name, &desired)
            .await
        {
            warn!(namespace = %target, cronjob = %cronjob.name, error = %e, "failed to reconcile cronjob");
        }
    }
}

/// Reconciles every manager-owned `get-owner-info` Job: prunes it if its
/// target is gone or unmatched, and recreates it with a
/// bounded wait when its rendered manifest has drifted, since Jobs
/// cannot be patched in place.
pub async fn reconcile_jobs(adapter: &KubernetesAdapter, config: &Config) {
    let manager_namespace = &config.context.namespace;
    let namespaces = adapter.get_namespaces_by(&NamespaceFilter::default()).await;
    let jobs = adapter
        .get_jobs_by(manager_namespace, &format!("{MANAGED_LABEL}=true"))
        .await;

    for job in &jobs {
        let Some((target, action)) = routing_of(&job.annotations) else {
            continue;
        };
        if action != "get-owner-info" {
            continue;
        }

        if !namespaces.iter().any(|ns| ns.name == target) {
            prune_job(adapter, manager_namespace, job).await;
            continue;
        }
        if !still_matched(&namespaces, config, &target) {
            prune_job(adapter, manager_namespace, job).await;
            continue;
        }

        let desired = build_owner_info_job(manager_namespace, &target);
        let desired_hash = desired
            .metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get(SPEC_HASH_ANNOTATION))
            .cloned()
            .unwrap_or_default();
        let current_hash = job.annotations.get(SPEC_HASH_ANNOTATION).cloned().unwrap_or_default();

        if current_hash == desired_hash {
            continue;
        }

        info!(namespace = %target, job = %job.name, "job spec drifted, recreating");
        prune_job(adapter, manager_namespace, job).await;

        let mut attempts = 0;
        while attempts < JOB_GONE_POLL_ATTEMPTS && !adapter.job_gone(manager_namespace, &job.name).await {
            tokio::time::sleep(JOB_GONE_POLL_INTERVAL).await;
            attempts += 1;
        }

        if let Err(e) = adapter.create_job(manager_namespace, &desired).await {
            warn!(namespace = %target, job = %job.name, error = %e, "failed to recreate drifted job");
        }
    }
}

async fn prune_job(adapter: &KubernetesAdapter, manager_namespace: &str, job: &JobDto) {
    if let Err(e) = adapter
        .delete_pods_by_label(manager_namespace, &format!("job-name={}", job.name))
        .await
    {
        warn!(job = %job.name, error = %e, "failed to delete job's pods");
    }
    if let Err(e) = adapter.delete_job(manager_namespace, &job.name).await {
        warn!(job = %job.name, error = %e, "failed to prune job");
    }
}

/// Re-publishes the `nsreaper_namespace_status` gauge for every managed
/// namespace from its current annotations, and removes gauges for
/// namespaces that were managed as of the previous tick but have since
/// disappeared.
pub async fn generate_metrics(adapter: &KubernetesAdapter, config: &Config, metrics: &SharedMetrics) {
    let namespaces = adapter.get_namespaces_by(&NamespaceFilter::default()).await;
    let entries: Vec<(NamespaceLabels, Status)> = namespaces
        .iter()
        .filter(|ns| ns.annotations.get(&annotation::managed()).map(String::as_str) == Some("true"))
        .filter(|ns| matcher::match_namespace(&config.namespaces, ns).is_some())
        .map(|ns| {
            let status = ns
                .annotations
                .get(&annotation::status())
                .and_then(|s| s.parse::<Status>().ok())
                .unwrap_or(Status::Unknown);
            (NamespaceLabels::from_annotations(&ns.name, &ns.annotations), status)
        })
        .collect();

    metrics.sync_namespace_gauges(&entries);
}

#[cfg(test)]
#[path = "collect_test.rs"]
mod tests;
