use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::decertify::DecertifyError;
use super::domain::{Actor, CertificationState, ProjectProgramId};
use super::service::{CertificationService, ServiceError};
use super::state_machine::TransitionError;
use super::stores::{ProjectProgramRepository, RepositoryError};

/// Router builder exposing HTTP endpoints for eligibility, transitions and
/// decertification.
pub fn certification_router<R>(service: Arc<CertificationService<R>>) -> Router
where
    R: ProjectProgramRepository + 'static,
{
    Router::new()
        .route(
            "/api/v1/certification/pairings/:pairing_id/eligibility",
            get(eligibility_handler::<R>),
        )
        .route(
            "/api/v1/certification/pairings/:pairing_id/transition",
            post(transition_handler::<R>),
        )
        .route(
            "/api/v1/certification/pairings/:pairing_id/decertify",
            post(decertify_handler::<R>),
        )
        .route("/api/v1/certification/states", get(states_handler::<R>))
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct EligibilityParams {
    #[serde(default)]
    fail_fast: bool,
}

pub(crate) async fn eligibility_handler<R>(
    State(service): State<Arc<CertificationService<R>>>,
    Path(pairing_id): Path<String>,
    Query(params): Query<EligibilityParams>,
) -> Response
where
    R: ProjectProgramRepository + 'static,
{
    let id = ProjectProgramId(pairing_id);
    match service.evaluate(&id, params.fail_fast) {
        Ok(report) => (StatusCode::OK, axum::Json(report)).into_response(),
        Err(error) => error_response(error),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct TransitionRequest {
    target_state: CertificationState,
    actor: Actor,
}

pub(crate) async fn transition_handler<R>(
    State(service): State<Arc<CertificationService<R>>>,
    Path(pairing_id): Path<String>,
    axum::Json(request): axum::Json<TransitionRequest>,
) -> Response
where
    R: ProjectProgramRepository + 'static,
{
    let id = ProjectProgramId(pairing_id);
    match service.attempt_transition(&id, request.target_state, &request.actor) {
        Ok(effects) => {
            let payload = json!({
                "pairing_id": id.0,
                "state": request.target_state,
                "effects": effects,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct DecertifyRequest {
    actor: Actor,
    #[serde(default)]
    check_only: bool,
    #[serde(default)]
    force: bool,
}

pub(crate) async fn decertify_handler<R>(
    State(service): State<Arc<CertificationService<R>>>,
    Path(pairing_id): Path<String>,
    axum::Json(request): axum::Json<DecertifyRequest>,
) -> Response
where
    R: ProjectProgramRepository + 'static,
{
    let id = ProjectProgramId(pairing_id);
    match service.decertify(&id, &request.actor, request.check_only, request.force) {
        Ok(report) => (StatusCode::OK, axum::Json(report)).into_response(),
        Err(error) => error_response(error),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatesParams {
    #[serde(default)]
    verifier_mediated: bool,
}

pub(crate) async fn states_handler<R>(
    State(service): State<Arc<CertificationService<R>>>,
    Query(params): Query<StatesParams>,
) -> Response
where
    R: ProjectProgramRepository + 'static,
{
    let choices = service.state_choices(params.verifier_mediated);
    let payload: Vec<_> = choices
        .iter()
        .map(|choice| {
            json!({
                "state": choice.state,
                "description": choice.description,
            })
        })
        .collect();
    (StatusCode::OK, axum::Json(payload)).into_response()
}

fn error_response(error: ServiceError) -> Response {
    match error {
        ServiceError::Repository(RepositoryError::NotFound) => {
            let payload = json!({
                "error": "pairing not found",
            });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
        ServiceError::Transition(TransitionError::EligibilityFailed(report)) => {
            let payload = json!({
                "error": "certification requirements are not met",
                "report": report,
            });
            (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response()
        }
        ServiceError::Transition(TransitionError::SamplingIncomplete) => {
            let payload = json!({
                "error": TransitionError::SamplingIncomplete.to_string(),
            });
            (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response()
        }
        ServiceError::Transition(error @ TransitionError::IllegalTransition { .. }) => {
            let payload = json!({
                "error": error.to_string(),
            });
            (StatusCode::CONFLICT, axum::Json(payload)).into_response()
        }
        ServiceError::Transition(error @ TransitionError::PermissionDenied { .. }) => {
            let payload = json!({
                "error": error.to_string(),
            });
            (StatusCode::FORBIDDEN, axum::Json(payload)).into_response()
        }
        ServiceError::Decertify(DecertifyError::NotCertified) => {
            let payload = json!({
                "error": DecertifyError::NotCertified.to_string(),
            });
            (StatusCode::CONFLICT, axum::Json(payload)).into_response()
        }
        ServiceError::Decertify(DecertifyError::PermissionDenied(message)) => {
            let payload = json!({
                "error": message,
            });
            (StatusCode::FORBIDDEN, axum::Json(payload)).into_response()
        }
        ServiceError::Decertify(DecertifyError::Blocked(warnings)) => {
            let payload = json!({
                "error": "decertification blocked",
                "warnings": warnings,
            });
            (StatusCode::CONFLICT, axum::Json(payload)).into_response()
        }
        other => {
            let payload = json!({
                "error": other.to_string(),
            });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}
