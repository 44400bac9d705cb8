//! The probe runner: a short-lived process dispatched by a Kubernetes
//! Job, one per namespace per tick, that performs a single named action
//! against that namespace and exits.

pub mod check_namespace;
pub mod get_owner_info;
pub mod prometheus;

use std::sync::Arc;

use crate::adapter::KubernetesAdapter;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::people::PeopleClient;
use prometheus::PrometheusClient;

/// Dependencies a probe action needs. Built once per process invocation.
pub struct ProbeContext {
    pub adapter: KubernetesAdapter,
    pub prometheus: PrometheusClient,
    pub people: PeopleClient,
    pub config: Arc<Config>,
}

impl ProbeContext {
    pub fn new(adapter: KubernetesAdapter, config: Arc<Config>) -> Self {
        let prometheus = PrometheusClient::new(&config.prometheus);
        let people = PeopleClient::new(&config.people_api);
        Self {
            adapter,
            prometheus,
            people,
            config,
        }
    }
}

/// Runs the named probe action against `namespace`.
pub async fn dispatch(ctx: &ProbeContext, action: &str, namespace: &str) -> Result<()> {
    match action {
        "check-namespace" => check_namespace::run(ctx, namespace).await,
        "get-owner-info" => get_owner_info::run(ctx, namespace).await,
        other => Err(Error::UnknownAction(other.to_string())),
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
