use super::*;

const MINIMAL_YAML: &str = r#"
context:
  namespace: ska-namespace-manager
"#;

#[test]
fn parses_minimal_config_with_defaults() {
    let cfg: Config = serde_yaml::from_str(MINIMAL_YAML).unwrap();
    assert_eq!(cfg.context.namespace, "ska-namespace-manager");
    assert!(cfg.namespaces.is_empty());
    assert!(!cfg.leader_election.enabled);
    assert_eq!(cfg.leader_election.lease_ttl, Duration::from_secs(5));
    assert_eq!(cfg.prometheus.cronjob_delay, Duration::ZERO);
    assert!(!cfg.probe.include_daemonsets);
}

#[test]
fn parses_full_namespace_policy() {
    let yaml = r#"
context:
  namespace: ska-namespace-manager
namespaces:
  - names: ["ci-*"]
    ttl: "2h"
    grace_period: "10m"
    settling_period: "5m"
    stale:
      delete: true
      notify_on_delete: true
    failing:
      notify_on_status: true
  - any:
      - labels:
          team: "sdp"
    all:
      - annotations:
          environment: "integration"
    failed:
      delete: true
"#;
    let cfg: Config = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(cfg.namespaces.len(), 2);

    let first = &cfg.namespaces[0];
    assert_eq!(first.names.as_deref(), Some(&["ci-*".to_string()][..]));
    assert_eq!(first.ttl, Some(Duration::from_secs(2 * 3600)));
    assert_eq!(first.grace_period, Duration::from_secs(600));
    assert!(first.stale.delete);
    assert!(first.stale.notify_on_delete);
    assert!(first.failing.notify_on_status);
    assert!(!first.failing.delete);

    let second = &cfg.namespaces[1];
    assert!(second.names.is_none());
    assert_eq!(second.any.as_ref().unwrap()[0].labels["team"], "sdp");
    assert_eq!(
        second.all.as_ref().unwrap()[0].annotations["environment"],
        "integration"
    );
    assert!(second.failed.delete);
}

#[test]
fn rejects_malformed_duration_in_policy() {
    let yaml = r#"
context:
  namespace: ska-namespace-manager
namespaces:
  - names: ["ci-*"]
    ttl: "not-a-duration"
"#;
    let result: Result<Config, _> = serde_yaml::from_str(yaml);
    assert!(result.is_err());
}

#[test]
fn missing_config_file_falls_back_to_defaults() {
    let cfg = Config::load(Some(Path::new("/nonexistent/path/config.yml"))).unwrap();
    assert_eq!(cfg.context.namespace, "default");
    assert!(cfg.namespaces.is_empty());
}

#[test]
fn present_but_invalid_config_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yml");
    std::fs::write(&path, "not: [valid, yaml: structure").unwrap();

    let err = Config::load(Some(&path)).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[test]
fn loads_from_explicit_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yml");
    std::fs::write(&path, MINIMAL_YAML).unwrap();

    let cfg = Config::load(Some(&path)).unwrap();
    assert_eq!(cfg.context.namespace, "ska-namespace-manager");
}
