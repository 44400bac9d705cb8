use super::*;

const MANAGER: &str = "nsreaper";

#[test]
fn object_name_is_deterministic_and_action_scoped() {
    assert_eq!(object_name("check-namespace", "ci-1234"), "nsreaper-check-namespace-ci-1234");
    assert_eq!(object_name("check-namespace", "ci-1234"), object_name("check-namespace", "ci-1234"));
    assert_ne!(object_name("check-namespace", "ci-1234"), object_name("get-owner-info", "ci-1234"));
}

#[test]
fn build_cronjob_is_created_in_the_manager_namespace_and_routed_to_its_target() {
    let cronjob = build_cronjob(MANAGER, "ci-1234");
    assert_eq!(cronjob.metadata.namespace.as_deref(), Some(MANAGER));
    assert_eq!(
        cronjob.metadata.name.as_deref(),
        Some("nsreaper-check-namespace-ci-1234")
    );

    let labels = cronjob.metadata.labels.as_ref().unwrap();
    assert_eq!(labels.get(MANAGED_LABEL), Some(&"true".to_string()));
    assert_eq!(labels.get(NAMESPACE_LABEL), Some(&"ci-1234".to_string()));
    assert_eq!(labels.get(ACTION_LABEL), Some(&"check-namespace".to_string()));

    let annotations = cronjob.metadata.annotations.as_ref().unwrap();
    assert_eq!(annotations.get(&annotation::managed()), Some(&"true".to_string()));
    assert_eq!(annotations.get(&annotation::target_namespace()), Some(&"ci-1234".to_string()));
    assert_eq!(annotations.get(&annotation::action()), Some(&"check-namespace".to_string()));
}

#[test]
fn build_owner_info_job_carries_a_spec_hash() {
    let job = build_owner_info_job(MANAGER, "ci-1234");
    assert_eq!(job.metadata.namespace.as_deref(), Some(MANAGER));
    let annotations = job.metadata.annotations.as_ref().unwrap();
    assert!(annotations.contains_key(SPEC_HASH_ANNOTATION));
    assert_eq!(annotations.get(SPEC_HASH_ANNOTATION).unwrap().len(), 8);
}

#[test]
fn spec_hash_is_stable_for_identical_input_and_differs_for_different_namespaces() {
    let a = probe_pod_spec("check-namespace", "ci-1234");
    let b = probe_pod_spec("check-namespace", "ci-1234");
    assert_eq!(spec_hash(&a), spec_hash(&b));

    let c = probe_pod_spec("check-namespace", "ci-5678");
    assert_ne!(spec_hash(&a), spec_hash(&c));
}

#[test]
fn routing_of_reads_back_target_and_action() {
    let cronjob = build_cronjob(MANAGER, "ci-1234");
    let annotations = cronjob.metadata.annotations.clone().unwrap();
    assert_eq!(
        routing_of(&annotations),
        Some(("ci-1234".to_string(), "check-namespace".to_string()))
    );
}

#[test]
fn routing_of_is_none_for_objects_missing_either_annotation() {
    assert_eq!(routing_of(&BTreeMap::new()), None);
}

#[test]
fn probe_image_defaults_when_env_var_is_unset() {
    std::env::remove_var(PROBE_IMAGE_ENV);
    assert_eq!(probe_image(), DEFAULT_PROBE_IMAGE);
}
