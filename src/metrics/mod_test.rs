use super::*;
use std::collections::BTreeMap;

#[test]
fn namespace_status_gauge_reflects_the_latest_set_call() {
    let metrics = ControllerMetrics::new().unwrap();
    let labels = NamespaceLabels {
        namespace: "ci-1234".to_string(),
        team: "sdp".to_string(),
        project: "ska-low".to_string(),
        user: "alice".to_string(),
        environment: "integration".to_string(),
        pipeline_id: "1".to_string(),
        project_id: "2".to_string(),
    };

    metrics.set_namespace_status(&labels, Status::Failing);
    let encoded = metrics.encode().unwrap();
    assert!(encoded.contains("nsreaper_namespace_status"));
    assert!(encoded.contains("ci-1234"));
}

#[test]
fn task_run_counters_separate_ok_from_error() {
    let metrics = ControllerMetrics::new().unwrap();
    metrics.record_task_run("collect_cronjobs", true);
    metrics.record_task_run("collect_cronjobs", false);

    let ok = metrics
        .task_runs_total
        .with_label_values(&["collect_cronjobs", "ok"])
        .get();
    let err = metrics
        .task_runs_total
        .with_label_values(&["collect_cronjobs", "error"])
        .get();
    assert_eq!(ok, 1);
    assert_eq!(err, 1);
}

#[test]
fn namespace_labels_fall_back_to_unknown_when_annotations_are_absent() {
    let labels = NamespaceLabels::from_annotations("ci-1234", &BTreeMap::new());
    assert_eq!(labels.team, "unknown");
    assert_eq!(labels.project, "unknown");
    assert_eq!(labels.namespace, "ci-1234");
}

#[test]
fn sync_namespace_gauges_removes_series_for_namespaces_that_disappeared() {
    let metrics = ControllerMetrics::new().unwrap();
    let alpha = NamespaceLabels {
        namespace: "alpha".to_string(),
        team: "sdp".to_string(),
        project: "ska-low".to_string(),
        user: "alice".to_string(),
        environment: "integration".to_string(),
        pipeline_id: "1".to_string(),
        project_id: "2".to_string(),
    };
    let beta = NamespaceLabels {
        namespace: "beta".to_string(),
        ..alpha.clone()
    };

    metrics.sync_namespace_gauges(&[(alpha.clone(), Status::Ok), (beta, Status::Failing)]);
    assert!(metrics.encode().unwrap().contains("beta"));

    // `beta` is gone on the next tick; its series should disappear too.
    metrics.sync_namespace_gauges(&[(alpha, Status::Ok)]);
    let encoded = metrics.encode().unwrap();
    assert!(encoded.contains("alpha"));
    assert!(!encoded.contains("beta"));
}

#[test]
fn namespace_labels_read_real_annotation_values() {
    let mut annotations = BTreeMap::new();
    annotations.insert(crate::types::annotation::team(), "sdp".to_string());
    let labels = NamespaceLabels::from_annotations("ci-1234", &annotations);
    assert_eq!(labels.team, "sdp");
    assert_eq!(labels.project, "unknown");
}
