use super::common::*;
use crate::certification::domain::CertificationState;
use crate::certification::service::ServiceError;
use crate::certification::stores::{
    ProjectProgramRepository, RepositoryError, SamplingGroupRef, SamplingMembership, SideEffect,
};

#[test]
fn register_rejects_duplicate_ids() {
    let (_, service) = build_service();
    service.register(pairing("sv-1", program())).expect("registers");

    match service.register(pairing("sv-1", program())) {
        Err(ServiceError::Repository(RepositoryError::Conflict)) => {}
        other => panic!("expected conflict, got {other:?}"),
    }
}

#[test]
fn transition_commits_before_dispatching_effects() {
    let (backend, service) = build_service();
    let entity = pairing("sv-2", program());
    let id = entity.id.clone();
    service.register(entity).expect("registers");

    service
        .attempt_transition(&id, CertificationState::Inspection, &superuser())
        .expect("legal transition");

    let stored = service.get(&id).expect("fetches");
    assert_eq!(stored.state, CertificationState::Inspection);
    assert_eq!(stored.version, 1);

    let effects = backend.effects();
    assert_eq!(effects.len(), 1);
    assert!(matches!(effects[0], SideEffect::StateChangedNotice { .. }));
}

#[test]
fn failed_transition_dispatches_nothing() {
    let (backend, service) = build_service();
    let entity = pairing("sv-3", program());
    let id = entity.id.clone();
    service.register(entity).expect("registers");

    let result = service.attempt_transition(&id, CertificationState::Complete, &superuser());
    assert!(result.is_err());
    assert!(backend.effects().is_empty());
    assert_eq!(service.get(&id).expect("fetches").version, 0);
}

#[test]
fn group_transition_advances_every_sampling_peer() {
    let (backend, service) = build_service();
    let group = SamplingGroupRef("sg-sv".to_string());

    for (name, is_test) in [("sv-4a", true), ("sv-4b", false)] {
        let entity = pairing(name, program());
        let id = entity.id.clone();
        service.register(entity).expect("registers");
        backend.set_membership(
            &id,
            SamplingMembership {
                group: group.clone(),
                is_test_entity: is_test,
                group_has_test_entity: true,
                uncovered_questions: 0,
            },
        );
    }

    let seed = pairing("sv-4a", program()).id;
    service
        .attempt_transition_group(&seed, CertificationState::Inspection, &superuser())
        .expect("group advances");

    for name in ["sv-4a", "sv-4b"] {
        let stored = service.get(&pairing(name, program()).id).expect("fetches");
        assert_eq!(stored.state, CertificationState::Inspection);
    }
}

#[test]
fn decertify_check_only_commits_nothing() {
    let (backend, service) = build_service();
    let entity = certified_pairing("sv-5", program());
    let id = entity.id.clone();
    backend.insert(entity).expect("seeds certified pairing");

    let report = service
        .decertify(&id, &superuser(), true, false)
        .expect("check-only run succeeds");

    assert!(!report.performed);
    let stored = service.get(&id).expect("fetches");
    assert_eq!(stored.state, CertificationState::Complete);
    assert_eq!(stored.version, 0);
}

#[test]
fn commit_rejects_stale_versions() {
    let (backend, _) = build_service();
    let entity = pairing("sv-6", program());
    backend.insert(entity.clone()).expect("inserts");

    let mut first = entity.clone();
    first.version = 1;
    backend.commit(first, 0).expect("first writer wins");

    let mut second = entity;
    second.version = 1;
    match backend.commit(second, 0) {
        Err(RepositoryError::Stale { expected, found }) => {
            assert_eq!(expected, 0);
            assert_eq!(found, 1);
        }
        other => panic!("expected stale write, got {other:?}"),
    }
}

#[test]
fn report_for_certified_pairing_skips_the_short_circuit() {
    let (backend, service) = build_service();
    let entity = certified_pairing("sv-7", program());
    let id = entity.id.clone();
    backend.insert(entity).expect("seeds certified pairing");
    answered_checklist(&backend, &id, 5);

    let report = service
        .report_eligibility_for_certification(&id)
        .expect("reports");

    assert!(report.eligible);
    assert!(report.get("already_certified").is_none());
}

#[test]
fn state_choices_expose_both_variants() {
    let (_, service) = build_service();

    assert_eq!(service.state_choices(false).len(), 7);
    assert_eq!(service.state_choices(true).len(), 8);
}
