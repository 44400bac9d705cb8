//! Plain data transfer objects the rest of the crate operates on, so that
//! `k8s_openapi` types never leak past the adapter boundary.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use k8s_openapi::api::batch::v1::{CronJob, Job};
use k8s_openapi::api::core::v1::Namespace;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamespacePhase {
    Active,
    Terminating,
    Unknown,
}

#[derive(Debug, Clone)]
pub struct NamespaceDto {
    pub name: String,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub phase: NamespacePhase,
    pub creation_timestamp: Option<DateTime<Utc>>,
}

impl From<&Namespace> for NamespaceDto {
    fn from(ns: &Namespace) -> Self {
        let phase = ns
            .status
            .as_ref()
            .and_then(|s| s.phase.as_deref())
            .map(|p| match p {
                "Active" => NamespacePhase::Active,
                "Terminating" => NamespacePhase::Terminating,
                _ => NamespacePhase::Unknown,
            })
            .unwrap_or(NamespacePhase::Unknown);

        NamespaceDto {
            name: ns.metadata.name.clone().unwrap_or_default(),
            labels: ns.metadata.labels.clone().unwrap_or_default().into_iter().collect(),
            annotations: ns
                .metadata
                .annotations
                .clone()
                .unwrap_or_default()
                .into_iter()
                .collect(),
            phase,
            creation_timestamp: ns
                .metadata
                .creation_timestamp
                .as_ref()
                .map(|t| t.0),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CronJobDto {
    pub name: String,
    pub namespace: String,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
}

impl From<&CronJob> for CronJobDto {
    fn from(cj: &CronJob) -> Self {
        CronJobDto {
            name: cj.metadata.name.clone().unwrap_or_default(),
            namespace: cj.metadata.namespace.clone().unwrap_or_default(),
            labels: cj.metadata.labels.clone().unwrap_or_default().into_iter().collect(),
            annotations: cj
                .metadata
                .annotations
                .clone()
                .unwrap_or_default()
                .into_iter()
                .collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct JobDto {
    pub name: String,
    pub namespace: String,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub succeeded: i32,
    pub failed: i32,
}

impl From<&Job> for JobDto {
    fn from(job: &Job) -> Self {
        let status = job.status.as_ref();
        JobDto {
            name: job.metadata.name.clone().unwrap_or_default(),
            namespace: job.metadata.namespace.clone().unwrap_or_default(),
            labels: job.metadata.labels.clone().unwrap_or_default().into_iter().collect(),
            annotations: job
                .metadata
                .annotations
                .clone()
                .unwrap_or_default()
                .into_iter()
                .collect(),
            succeeded: status.and_then(|s| s.succeeded).unwrap_or(0),
            failed: status.and_then(|s| s.failed).unwrap_or(0),
        }
    }
}
