//! Layered YAML configuration, loaded once per process and handed to each
//! controller's constructor as an owned, immutable value.
//!
//! Nothing here is a process-global singleton: `Config::load` is a plain
//! function that returns an owned `Config`, and every constructor in this
//! crate takes that value (or a clone/`Arc` of it) explicitly.

pub mod duration;

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};

fn default_config_path() -> String {
    std::env::var("CONFIG_PATH").unwrap_or_else(|_| "/etc/config/config.yml".to_string())
}

/// Top level configuration shared by both controllers.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub context: ContextConfig,
    #[serde(default)]
    pub leader_election: LeaderElectionConfig,
    #[serde(default)]
    pub namespaces: Vec<NamespacePolicy>,
    #[serde(default)]
    pub people_api: PeopleApiConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub prometheus: PrometheusConfig,
    #[serde(default)]
    pub probe: ProbeConfig,
}

impl Config {
    /// Loads configuration from `CONFIG_PATH` (or the given path override),
    /// falling back to an all-defaults `Config` when the file is absent.
    /// A present-but-unparsable file is a configuration error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| default_config_path().into());

        let contents = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "config file not found, using defaults");
                return Ok(Config::minimal_default());
            }
            Err(e) => {
                return Err(Error::Config(format!(
                    "failed to read config file {}: {e}",
                    path.display()
                )))
            }
        };

        serde_yaml::from_str(&contents)
            .map_err(|e| Error::Config(format!("failed to parse config file {}: {e}", path.display())))
    }

    fn minimal_default() -> Self {
        Config {
            context: ContextConfig {
                namespace: "default".to_string(),
            },
            leader_election: LeaderElectionConfig::default(),
            namespaces: Vec::new(),
            people_api: PeopleApiConfig::default(),
            notifier: NotifierConfig::default(),
            metrics: MetricsConfig::default(),
            prometheus: PrometheusConfig::default(),
            probe: ProbeConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContextConfig {
    pub namespace: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LeaderElectionConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_leader_path")]
    pub path: String,
    #[serde(
        default = "default_lease_ttl",
        deserialize_with = "duration::deserialize"
    )]
    pub lease_ttl: Duration,
}

fn default_leader_path() -> String {
    "/etc/leader".to_string()
}

fn default_lease_ttl() -> Duration {
    Duration::from_secs(5)
}

impl Default for LeaderElectionConfig {
    fn default() -> Self {
        LeaderElectionConfig {
            enabled: false,
            path: default_leader_path(),
            lease_ttl: default_lease_ttl(),
        }
    }
}

impl LeaderElectionConfig {
    pub fn lease_path(&self) -> std::path::PathBuf {
        Path::new(&self.path).join("lease")
    }
}

/// A single label/annotation conjunction: every listed key must equal the
/// namespace's value for that key.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MatchCondition {
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub annotations: HashMap<String, String>,
}

/// Per-status action flags, shared shape across `stale`/`failed`/`failing`/`unstable`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusActionConfig {
    #[serde(default)]
    pub delete: bool,
    #[serde(default)]
    pub notify_on_delete: bool,
    #[serde(default)]
    pub notify_on_status: bool,
}

/// One entry of `namespaces[]`: a matcher plus the durations and per-status
/// action flags that apply once a namespace matches it.
#[derive(Debug, Clone, Deserialize)]
pub struct NamespacePolicy {
    #[serde(default)]
    pub names: Option<Vec<String>>,
    #[serde(default)]
    pub any: Option<Vec<MatchCondition>>,
    #[serde(default)]
    pub all: Option<Vec<MatchCondition>>,

    #[serde(default, deserialize_with = "duration::deserialize_opt")]
    pub ttl: Option<Duration>,
    #[serde(
        default = "default_grace_period",
        deserialize_with = "duration::deserialize"
    )]
    pub grace_period: Duration,
    #[serde(
        default = "default_settling_period",
        deserialize_with = "duration::deserialize"
    )]
    pub settling_period: Duration,

    #[serde(default)]
    pub stale: StatusActionConfig,
    #[serde(default)]
    pub failed: StatusActionConfig,
    #[serde(default)]
    pub failing: StatusActionConfig,
    #[serde(default)]
    pub unstable: StatusActionConfig,
}

fn default_grace_period() -> Duration {
    Duration::from_secs(300)
}

fn default_settling_period() -> Duration {
    Duration::from_secs(120)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PeopleApiConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub ca: Option<String>,
    #[serde(default)]
    pub insecure: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotifierConfig {
    #[serde(default)]
    pub webhook_url: String,
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub registry_path: Option<String>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        MetricsConfig {
            enabled: true,
            registry_path: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PrometheusConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub ca: Option<String>,
    #[serde(default)]
    pub insecure: bool,
    #[serde(default)]
    pub whitelisted_alerts: Vec<String>,
    #[serde(
        default = "default_cronjob_delay",
        deserialize_with = "duration::deserialize"
    )]
    pub cronjob_delay: Duration,
}

fn default_cronjob_delay() -> Duration {
    Duration::from_secs(0)
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        PrometheusConfig {
            enabled: false,
            url: String::new(),
            ca: None,
            insecure: false,
            whitelisted_alerts: Vec::new(),
            cronjob_delay: default_cronjob_delay(),
        }
    }
}

/// Whether the `check-namespace` probe's Kubernetes-API fallback also
/// scans DaemonSets, on top of Deployments/StatefulSets/ReplicaSets.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProbeConfig {
    #[serde(default)]
    pub include_daemonsets: bool,
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
