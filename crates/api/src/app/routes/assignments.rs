use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

use fuelcert_auth::authorize_owner;
use fuelcert_certification::{AssignTraining, AssignmentStatus, CompleteAssignment};
use fuelcert_core::AssignmentId;
use fuelcert_infra::{AssignmentFilter, services::today};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::PrincipalContext;

/// Admin-managed routes, mounted under `/assignments`.
pub fn router() -> Router {
    Router::new()
        .route("/", get(list_assignments).post(assign_training))
        .route("/:id", get(get_assignment))
}

/// Completion is open to the assigned fueler as well as admins; the handler checks
/// ownership itself.
pub fn completion_router() -> Router {
    Router::new().route("/assignments/:id/complete", post(complete_assignment))
}

pub async fn assign_training(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<dto::AssignTrainingRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::json_rejection_to_response(rejection),
    };

    let cmd = AssignTraining {
        assignment_id: AssignmentId::new(),
        fueler_id: body.fueler_id,
        training_id: body.training_id,
        due_date: body.due_date,
        notes: body.notes,
        assigned_by: Some(principal.user_id()),
    };

    match services.assignments.assign(cmd).await {
        Ok(assignment) => (StatusCode::CREATED, Json(dto::assignment_to_json(&assignment, today()))).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

/// `?my=true` narrows to the caller's own fueler profile (404 without one).
pub async fn list_assignments(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::AssignmentQuery>,
) -> axum::response::Response {
    let mut filter = AssignmentFilter {
        fueler_id: match errors::parse_optional_id(query.fueler.as_deref(), "fueler") {
            Ok(v) => v,
            Err(resp) => return resp,
        },
        training_id: match errors::parse_optional_id(query.training.as_deref(), "training") {
            Ok(v) => v,
            Err(resp) => return resp,
        },
        status: match query.status.as_deref().filter(|s| !s.trim().is_empty()) {
            Some(raw) => match AssignmentStatus::parse(raw) {
                Ok(s) => Some(s),
                Err(e) => return errors::domain_error_to_response(e),
            },
            None => None,
        },
    };

    if query.my {
        match services.registry.for_user(principal.user_id()).await {
            Ok(fueler) => filter.fueler_id = Some(fueler.id),
            Err(e) => return errors::store_error_to_response(e),
        }
    }

    let today = today();
    match services.assignments.list(&filter).await {
        Ok(assignments) => {
            let items: Vec<_> = assignments.iter().map(|a| dto::assignment_to_json(a, today)).collect();
            Json(items).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn get_assignment(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: AssignmentId = match errors::parse_id(&id, "assignment") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.assignments.get(id).await {
        Ok(assignment) => Json(dto::assignment_to_json(&assignment, today())).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

/// Record the assigned training as completed on the ledger and close the assignment.
pub async fn complete_assignment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Bytes,
) -> axum::response::Response {
    let id: AssignmentId = match errors::parse_id(&id, "assignment") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let body: dto::CompleteAssignmentRequest = if body.iter().all(u8::is_ascii_whitespace) {
        dto::CompleteAssignmentRequest::default()
    } else {
        match serde_json::from_slice(&body) {
            Ok(b) => b,
            Err(e) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_body", e.to_string()),
        }
    };

    let assignment = match services.assignments.get(id).await {
        Ok(a) => a,
        Err(e) => return errors::store_error_to_response(e),
    };
    let fueler = match services.registry.get(assignment.fueler_id).await {
        Ok(f) => f,
        Err(e) => return errors::store_error_to_response(e),
    };
    if let Err(e) = authorize_owner(&principal.caller(), fueler.user_id) {
        return authz::authz_error_to_response(e);
    }

    let today = today();
    let cmd = CompleteAssignment {
        assignment_id: id,
        completed_date: body.completed_date.unwrap_or(today),
        notes: body.notes,
        certified_by: Some(principal.user_id()),
    };

    match services.assignments.complete(cmd).await {
        Ok(done) => Json(json!({
            "assignment": dto::assignment_to_json(&done.assignment, today),
            "certification": dto::completion_to_json(&done.completion, today),
        }))
        .into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}
