use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use fuelcert_certification::{CompleteCertification, CompletionOutcome, CreateCertification, ExpiryStatus};
use fuelcert_core::{CertificationId, DomainError, HistoryEntryId};
use fuelcert_infra::{CertificationFilter, services::today};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_certifications).post(create_certification))
        .route("/complete", post(complete_training))
        .route("/calendar", get(calendar))
        .route("/history", get(list_history))
        .route("/history/:id", get(get_history_entry))
        .route("/:id", get(get_certification).delete(delete_certification))
}

/// Insert-only: a second create for the same fueler and training is a conflict.
pub async fn create_certification(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<dto::CreateCertificationRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::json_rejection_to_response(rejection),
    };

    let cmd = CreateCertification {
        fueler_id: body.fueler_id,
        training_id: body.training_id,
        completed_date: body.completed_date,
        notes: body.notes,
        expiry_date: body.expiry_date,
        certified_by: Some(principal.user_id()),
    };

    match services.ledger.create(cmd).await {
        Ok(record) => (StatusCode::CREATED, Json(dto::certification_to_json(&record, today()))).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

/// Record a completed training: creates the current record or overwrites it, and always
/// appends a history entry. Responds with the record, `outcome` and `history_id`.
pub async fn complete_training(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<dto::CompleteCertificationRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::json_rejection_to_response(rejection),
    };
    if body.expiry_date.is_some() {
        return errors::domain_error_to_response(DomainError::validation(
            "expiry_date is derived from the training and cannot be set on complete",
        ));
    }

    let today = today();
    let cmd = CompleteCertification {
        fueler_id: body.fueler_id,
        training_id: body.training_id,
        completed_date: body.completed_date.unwrap_or(today),
        notes: body.notes,
        certified_by: Some(principal.user_id()),
    };

    let write = match services.ledger.complete(cmd).await {
        Ok(w) => w,
        Err(e) => return errors::store_error_to_response(e),
    };

    let status = match write.outcome {
        CompletionOutcome::Created => StatusCode::CREATED,
        CompletionOutcome::Updated => StatusCode::OK,
    };
    (status, Json(dto::completion_to_json(&write, today))).into_response()
}

pub async fn list_certifications(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::CertificationQuery>,
) -> axum::response::Response {
    let filter = match filter_from(query.fueler.as_deref(), query.training.as_deref()) {
        Ok(f) => f,
        Err(resp) => return resp,
    };
    let status = match query.status.as_deref().filter(|s| !s.trim().is_empty()) {
        Some(raw) => match ExpiryStatus::parse(raw) {
            Ok(s) => Some(s),
            Err(e) => return errors::domain_error_to_response(e),
        },
        None => None,
    };

    let today = today();
    match services.ledger.list(&filter, status).await {
        Ok(records) => {
            let items: Vec<_> = records.iter().map(|r| dto::certification_to_json(r, today)).collect();
            Json(items).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn get_certification(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: CertificationId = match errors::parse_id(&id, "certification") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.ledger.get(id).await {
        Ok(record) => Json(dto::certification_to_json(&record, today())).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

/// Removes the current record only; its history stays.
pub async fn delete_certification(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: CertificationId = match errors::parse_id(&id, "certification") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.ledger.delete(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn calendar(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::CalendarQuery>,
) -> axum::response::Response {
    let start = match errors::parse_date(query.start.as_deref(), "start") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let end = match errors::parse_date(query.end.as_deref(), "end") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.calendar.calendar(start, end).await {
        Ok((_range, events)) => Json(events).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn list_history(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::HistoryQuery>,
) -> axum::response::Response {
    let filter = match filter_from(query.fueler.as_deref(), query.training.as_deref()) {
        Ok(f) => f,
        Err(resp) => return resp,
    };

    match services.ledger.history(&filter).await {
        Ok(entries) => {
            let items: Vec<_> = entries.iter().map(dto::history_to_json).collect();
            Json(items).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn get_history_entry(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: HistoryEntryId = match errors::parse_id(&id, "history entry") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.ledger.history_entry(id).await {
        Ok(entry) => Json(dto::history_to_json(&entry)).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

fn filter_from(fueler: Option<&str>, training: Option<&str>) -> Result<CertificationFilter, axum::response::Response> {
    Ok(CertificationFilter {
        fueler_id: errors::parse_optional_id(fueler, "fueler")?,
        training_id: errors::parse_optional_id(training, "training")?,
    })
}
