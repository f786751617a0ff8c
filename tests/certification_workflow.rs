//! Integration specifications for the certification lifecycle.
//!
//! Scenarios exercise the public service facade and HTTP router end to end:
//! registration, eligibility evaluation, lifecycle transitions, certification
//! and decertification, without reaching into private modules.

mod common {
    use std::collections::BTreeSet;
    use std::sync::Arc;

    use greenlight::certification::{
        Actor, CatalogOverrides, CertificationService, CompanyRef, CompanyType,
        EvaluationSources, MemoryBackend, ProgramConfig, ProgramRef, ProjectProgram,
        ProjectProgramId, ProjectRef,
    };

    pub(super) fn owner_company() -> CompanyRef {
        CompanyRef {
            id: "sponsor-1".to_string(),
            name: "Cascade Energy Alliance".to_string(),
            company_type: CompanyType::General,
        }
    }

    pub(super) fn rater_company() -> CompanyRef {
        CompanyRef {
            id: "rater-1".to_string(),
            name: "Summit Ratings".to_string(),
            company_type: CompanyType::Rater,
        }
    }

    pub(super) fn program() -> ProgramRef {
        ProgramRef {
            slug: "cascade-efficiency".to_string(),
            name: "Cascade Efficiency Program".to_string(),
            owner: owner_company(),
            config: ProgramConfig::default(),
        }
    }

    pub(super) fn pairing(id: &str) -> ProjectProgram {
        ProjectProgram::new(
            ProjectProgramId(id.to_string()),
            ProjectRef {
                id: format!("project-{id}"),
                address: "44 Juniper Ln".to_string(),
            },
            program(),
            rater_company(),
        )
    }

    pub(super) fn superuser() -> Actor {
        Actor {
            user_id: "admin".to_string(),
            company: owner_company(),
            capabilities: BTreeSet::new(),
            is_superuser: true,
        }
    }

    pub(super) fn build_service() -> (
        Arc<MemoryBackend>,
        Arc<CertificationService<MemoryBackend>>,
    ) {
        let backend = Arc::new(MemoryBackend::new());
        let sources = EvaluationSources {
            checklist: backend.clone(),
            relationships: backend.clone(),
            annotations: backend.clone(),
            simulation: backend.clone(),
            sampling: backend.clone(),
            qa: backend.clone(),
        };
        let service = Arc::new(CertificationService::new(
            backend.clone(),
            sources,
            backend.clone(),
            backend.clone(),
            backend.clone(),
            backend.clone(),
            CatalogOverrides::new(),
        ));
        (backend, service)
    }
}

mod lifecycle {
    use super::common::*;
    use greenlight::certification::{
        CertificationState, ProjectProgramId, RepositoryError, ServiceError, SideEffect,
        TransitionError, UnansweredQuestion,
    };

    #[test]
    fn pairing_walks_from_registration_to_certification_and_back() {
        let (backend, service) = build_service();
        let entity = pairing("wf-1");
        let id = entity.id.clone();
        service.register(entity).expect("registers");
        backend.set_checklist(&id, Vec::new(), 12);

        assert!(service
            .is_eligible_for_certification(&id)
            .expect("evaluates"));

        for target in [
            CertificationState::Inspection,
            CertificationState::QaPending,
            CertificationState::CertificationPending,
            CertificationState::Complete,
        ] {
            service
                .attempt_transition(&id, target, &superuser())
                .expect("legal transition");
        }

        let certified = service.get(&id).expect("fetches");
        assert_eq!(certified.state, CertificationState::Complete);
        assert!(certified.certification_date.is_some());
        assert!(certified.is_certified().expect("invariant holds"));

        // Certification fanned out the full effect set through the dispatcher.
        let effects = backend.effects();
        assert!(effects
            .iter()
            .any(|effect| matches!(effect, SideEffect::CertificationNotice { .. })));
        assert!(effects
            .iter()
            .any(|effect| matches!(effect, SideEffect::InvalidateAnalytics { .. })));

        let report = service
            .decertify(&id, &superuser(), false, false)
            .expect("decertifies");
        assert!(report.performed);
        assert_eq!(report.undone[0], "removed certification date");

        let unwound = service.get(&id).expect("fetches");
        assert_eq!(unwound.state, CertificationState::Inspection);
        assert!(unwound.certification_date.is_none());
    }

    #[test]
    fn ineligible_pairing_is_stopped_at_the_certify_edge() {
        let (backend, service) = build_service();
        let entity = pairing("wf-2");
        let id = entity.id.clone();
        service.register(entity).expect("registers");
        backend.set_checklist(
            &id,
            vec![UnansweredQuestion {
                measure: "blower-door-test".to_string(),
                is_optional: false,
            }],
            11,
        );

        for target in [
            CertificationState::Inspection,
            CertificationState::QaPending,
            CertificationState::CertificationPending,
        ] {
            service
                .attempt_transition(&id, target, &superuser())
                .expect("pre-certification transitions are unguarded by the checklist");
        }

        match service.attempt_transition(&id, CertificationState::Complete, &superuser()) {
            Err(ServiceError::Transition(TransitionError::EligibilityFailed(report))) => {
                assert_eq!(
                    report.failing_messages(),
                    vec!["There is 1 required checklist question remaining.".to_string()],
                );
            }
            other => panic!("expected eligibility failure, got {other:?}"),
        }

        let entity = service.get(&id).expect("fetches");
        assert_eq!(entity.state, CertificationState::CertificationPending);
        assert!(backend.effects().iter().all(|effect| !matches!(
            effect,
            SideEffect::CertificationNotice { .. }
        )));
    }

    #[test]
    fn unknown_pairing_is_not_found() {
        let (_, service) = build_service();
        let missing = ProjectProgramId("nope".to_string());

        match service.evaluate(&missing, false) {
            Err(ServiceError::Repository(RepositoryError::NotFound)) => {}
            other => panic!("expected not found, got {other:?}"),
        }
    }

    #[test]
    fn refresh_progress_persists_the_percentage() {
        let (backend, service) = build_service();
        let entity = pairing("wf-3");
        let id = entity.id.clone();
        service.register(entity).expect("registers");
        backend.set_checklist(
            &id,
            vec![UnansweredQuestion {
                measure: "blower-door-test".to_string(),
                is_optional: false,
            }],
            3,
        );

        let pct = service.refresh_progress(&id).expect("refreshes");
        assert_eq!(pct, 75.0);
        assert_eq!(service.get(&id).expect("fetches").pct_complete, 75.0);
    }
}

mod routing {
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::common::*;
    use greenlight::certification::{certification_router, CertificationState};

    #[tokio::test]
    async fn eligibility_endpoint_reports_requirements() {
        let (backend, service) = build_service();
        let entity = pairing("rt-1");
        let id = entity.id.clone();
        service.register(entity).expect("registers");
        backend.set_checklist(&id, Vec::new(), 6);

        let router = certification_router(service);
        let response = router
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/api/v1/certification/pairings/rt-1/eligibility")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router dispatch");

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("body");
        let payload: Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(payload.get("eligible"), Some(&json!(true)));
        assert!(payload
            .get("requirements")
            .and_then(Value::as_array)
            .is_some());
    }

    #[tokio::test]
    async fn transition_endpoint_returns_effects() {
        let (backend, service) = build_service();
        let entity = pairing("rt-2");
        let id = entity.id.clone();
        service.register(entity).expect("registers");
        backend.set_checklist(&id, Vec::new(), 6);

        let router = certification_router(service);
        let request_body = json!({
            "target_state": "inspection",
            "actor": superuser(),
        });
        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/certification/pairings/rt-2/transition")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        serde_json::to_vec(&request_body).expect("serialize"),
                    ))
                    .expect("request"),
            )
            .await
            .expect("router dispatch");

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("body");
        let payload: Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(payload.get("state"), Some(&json!("inspection")));
        let effects = payload
            .get("effects")
            .and_then(Value::as_array)
            .expect("effects present");
        assert_eq!(effects[0].get("kind"), Some(&json!("state_changed_notice")));
    }

    #[tokio::test]
    async fn illegal_transition_maps_to_conflict() {
        let (_, service) = build_service();
        let entity = pairing("rt-3");
        service.register(entity).expect("registers");

        let router = certification_router(service);
        let request_body = json!({
            "target_state": "complete",
            "actor": superuser(),
        });
        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/certification/pairings/rt-3/transition")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        serde_json::to_vec(&request_body).expect("serialize"),
                    ))
                    .expect("request"),
            )
            .await
            .expect("router dispatch");

        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn decertify_endpoint_reports_the_unwind() {
        let (backend, service) = build_service();
        let entity = pairing("rt-4");
        let id = entity.id.clone();
        service.register(entity).expect("registers");
        backend.set_checklist(&id, Vec::new(), 6);
        for target in [
            CertificationState::Inspection,
            CertificationState::QaPending,
            CertificationState::CertificationPending,
            CertificationState::Complete,
        ] {
            service
                .attempt_transition(&id, target, &superuser())
                .expect("legal transition");
        }

        let router = certification_router(service);
        let request_body = json!({
            "actor": superuser(),
        });
        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/certification/pairings/rt-4/decertify")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        serde_json::to_vec(&request_body).expect("serialize"),
                    ))
                    .expect("request"),
            )
            .await
            .expect("router dispatch");

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("body");
        let payload: Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(payload.get("performed"), Some(&json!(true)));
        let undone = payload
            .get("undone")
            .and_then(Value::as_array)
            .expect("undone present");
        assert_eq!(undone[0], json!("removed certification date"));
    }

    #[tokio::test]
    async fn missing_pairing_maps_to_not_found() {
        let (_, service) = build_service();
        let router = certification_router(service);

        let response = router
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/api/v1/certification/pairings/ghost/eligibility")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router dispatch");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn states_endpoint_lists_the_standard_machine() {
        let (_, service) = build_service();
        let router = certification_router(service);

        let response = router
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/api/v1/certification/states")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router dispatch");

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("body");
        let payload: Value = serde_json::from_slice(&body).expect("json");
        let states = payload.as_array().expect("array payload");
        assert_eq!(states.len(), 7);
        assert_eq!(states[0].get("description"), Some(&json!("Pending")));
    }
}
