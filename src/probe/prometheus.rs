//! Prometheus alert lookups used as the primary signal of namespace
//! health. When Prometheus is unreachable or disabled, callers fall back
//! to inspecting workload status directly through the Kubernetes adapter.

use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::config::PrometheusConfig;
use crate::tls::load_root_certificate;

/// Prometheus alert queries get a longer ceiling than the 10s Kubernetes
/// API calls use — `/api/v1/alerts` against a busy Prometheus can take a
/// while to evaluate, per §5(c)'s 15-20s allowance for this call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Deserialize)]
struct AlertsResponse {
    data: AlertsData,
}

#[derive(Debug, Deserialize)]
struct AlertsData {
    alerts: Vec<Alert>,
}

#[derive(Debug, Deserialize)]
struct Alert {
    labels: std::collections::BTreeMap<String, String>,
    state: String,
}

impl Alert {
    fn is_critical(&self) -> bool {
        self.labels.get("severity").map(String::as_str) == Some("critical")
    }
}

#[derive(Clone)]
pub struct PrometheusClient {
    http: reqwest::Client,
    base_url: String,
    enabled: bool,
    whitelisted_alerts: Vec<String>,
}

impl PrometheusClient {
    pub fn new(config: &PrometheusConfig) -> Self {
        let mut builder = reqwest::Client::builder().timeout(REQUEST_TIMEOUT);
        if config.insecure {
            builder = builder.danger_accept_invalid_certs(true);
        }
        if let Some(ca_path) = &config.ca {
            match load_root_certificate(ca_path) {
                Ok(cert) => builder = builder.add_root_certificate(cert),
                Err(e) => warn!(path = %ca_path, error = %e, "failed to load prometheus CA certificate"),
            }
        }
        let http = builder.build().unwrap_or_else(|_| reqwest::Client::new());

        Self {
            http,
            base_url: config.url.clone(),
            enabled: config.enabled,
            whitelisted_alerts: config.whitelisted_alerts.clone(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled && !self.base_url.is_empty()
    }

    /// Fetches the set of firing alert names scoped to `namespace`,
    /// restricted to the configured whitelist. Returns `None` (rather
    /// than an empty set) when the lookup itself failed, so callers can
    /// tell "no alerts" apart from "couldn't ask".
    pub async fn fetch_namespace_alerts(&self, namespace: &str) -> Option<Vec<String>> {
        if !self.is_enabled() {
            return None;
        }

        let url = format!("{}/api/v1/alerts", self.base_url.trim_end_matches('/'));
        let response = match self.http.get(&url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(namespace, error = %e, "failed to reach prometheus");
                return None;
            }
        };

        if !response.status().is_success() {
            warn!(namespace, status = %response.status(), "prometheus returned an error status");
            return None;
        }

        let parsed: AlertsResponse = match response.json().await {
            Ok(p) => p,
            Err(e) => {
                warn!(namespace, error = %e, "failed to parse prometheus response");
                return None;
            }
        };

        // Severity is the primary signal: a critical alert is failure
        // evidence unless its name is on the whitelist, which exempts
        // specific known-noisy alerts even at critical severity. Being
        // whitelisted never promotes a non-critical alert to failure
        // evidence.
        let alerts = parsed
            .data
            .alerts
            .into_iter()
            .filter(|a| a.state == "firing")
            .filter(|a| a.labels.get("namespace").map(|n| n == namespace).unwrap_or(false))
            .filter(Alert::is_critical)
            .filter(|a| !self.is_whitelisted(a))
            .map(|a| a.labels.get("alertname").cloned().unwrap_or_default())
            .collect();

        Some(alerts)
    }

    fn is_whitelisted(&self, alert: &Alert) -> bool {
        alert
            .labels
            .get("alertname")
            .map(|name| self.whitelisted_alerts.iter().any(|w| w == name))
            .unwrap_or(false)
    }
}

#[cfg(test)]
#[path = "prometheus_test.rs"]
mod tests;
