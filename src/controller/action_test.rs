use super::*;
use crate::adapter::dto::NamespacePhase;
use std::time::Duration as StdDuration;

fn policy(stale: StatusActionConfig, failed: StatusActionConfig) -> NamespacePolicy {
    NamespacePolicy {
        names: None,
        any: None,
        all: None,
        ttl: None,
        grace_period: StdDuration::from_secs(300),
        settling_period: StdDuration::from_secs(120),
        stale,
        failed,
        failing: StatusActionConfig::default(),
        unstable: StatusActionConfig::default(),
    }
}

fn namespace(annotations: &[(&str, &str)]) -> NamespaceDto {
    NamespaceDto {
        name: "ci-1234".to_string(),
        labels: BTreeMap::new(),
        annotations: annotations
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        phase: NamespacePhase::Active,
        creation_timestamp: None,
    }
}

#[test]
fn status_action_maps_each_non_ok_status_to_its_config_block() {
    let p = policy(
        StatusActionConfig { delete: true, ..Default::default() },
        StatusActionConfig { notify_on_delete: true, ..Default::default() },
    );
    assert!(status_action(&p, Status::Stale).unwrap().delete);
    assert!(status_action(&p, Status::Failed).unwrap().notify_on_delete);
    assert!(status_action(&p, Status::Ok).is_none());
    assert!(status_action(&p, Status::Unknown).is_none());
}

#[test]
fn current_status_defaults_to_unknown_without_an_annotation() {
    let ns = namespace(&[]);
    assert_eq!(current_status(&ns), Status::Unknown);
}

#[test]
fn current_status_parses_a_recognized_value() {
    let ns = namespace(&[(annotation::status().as_str(), "failing")]);
    assert_eq!(current_status(&ns), Status::Failing);
}

#[test]
fn in_scope_excludes_terminating_namespaces() {
    let mut ns = namespace(&[]);
    ns.phase = NamespacePhase::Terminating;
    assert!(!in_scope(&ns, "nsreaper"));
}

#[test]
fn in_scope_excludes_the_deny_list_and_the_managers_own_namespace() {
    let mut kube_system = namespace(&[]);
    kube_system.name = "kube-system".to_string();
    assert!(!in_scope(&kube_system, "nsreaper"));

    let mut own = namespace(&[]);
    own.name = "nsreaper".to_string();
    assert!(!in_scope(&own, "nsreaper"));

    assert!(in_scope(&namespace(&[]), "nsreaper"));
}

#[test]
fn already_notified_true_only_when_recorded_for_the_current_status() {
    let ns = namespace(&[
        (annotation::status().as_str(), "failing"),
        (annotation::notified_timestamp().as_str(), "2026-01-01T00:00:00Z"),
        (annotation::notified_status().as_str(), "failing"),
    ]);
    assert!(already_notified(&ns));
}

#[test]
fn already_notified_false_when_recorded_status_does_not_match_current() {
    // The state machine clears both fields on a transition; a namespace
    // caught mid-transition (new status, stale notified_status) must not
    // be treated as already notified for its new episode.
    let ns = namespace(&[
        (annotation::status().as_str(), "failed"),
        (annotation::notified_timestamp().as_str(), "2026-01-01T00:00:00Z"),
        (annotation::notified_status().as_str(), "failing"),
    ]);
    assert!(!already_notified(&ns));
}

#[test]
fn already_notified_false_when_cleared_to_empty_strings() {
    let ns = namespace(&[
        (annotation::status().as_str(), "failing"),
        (annotation::notified_timestamp().as_str(), ""),
        (annotation::notified_status().as_str(), ""),
    ]);
    assert!(!already_notified(&ns));
}

#[test]
fn already_notified_false_without_either_annotation() {
    let ns = namespace(&[(annotation::status().as_str(), "failing")]);
    assert!(!already_notified(&ns));
}
