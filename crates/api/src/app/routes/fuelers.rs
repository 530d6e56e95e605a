use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use fuelcert_core::{FuelerId, UserId};
use fuelcert_fuelers::{FuelerStatus, RegisterFueler, UpdateFueler};
use fuelcert_infra::{CertificationFilter, services::today};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_fuelers).post(register_fueler))
        .route("/me/certifications", get(my_certifications))
        .route("/:id", get(get_fueler).patch(update_fueler).delete(delete_fueler))
        .route("/:id/status", post(set_status))
        .route("/:id/certifications", get(fueler_certifications))
}

pub async fn register_fueler(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::RegisterFuelerRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::json_rejection_to_response(rejection),
    };
    let user_id: UserId = match errors::parse_id(&body.user_id, "user") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let cmd = RegisterFueler {
        fueler_id: FuelerId::new(),
        user_id,
        name: body.name,
        handheld_name: body.handheld_name,
        occurred_at: Utc::now(),
    };

    match services.registry.register(cmd).await {
        Ok(fueler) => (StatusCode::CREATED, Json(dto::fueler_to_json(&fueler))).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn list_fuelers(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::FuelerQuery>,
) -> axum::response::Response {
    let status = match query.status.as_deref().filter(|s| !s.trim().is_empty()) {
        Some(raw) => match FuelerStatus::parse(raw) {
            Ok(s) => Some(s),
            Err(e) => return errors::domain_error_to_response(e),
        },
        None => None,
    };

    match services.registry.list(status).await {
        Ok(fuelers) => {
            let items: Vec<_> = fuelers.iter().map(dto::fueler_to_json).collect();
            Json(items).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn get_fueler(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: FuelerId = match errors::parse_id(&id, "fueler") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.registry.get(id).await {
        Ok(fueler) => Json(dto::fueler_to_json(&fueler)).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn update_fueler(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    body: Result<Json<dto::UpdateFuelerRequest>, JsonRejection>,
) -> axum::response::Response {
    let id: FuelerId = match errors::parse_id(&id, "fueler") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::json_rejection_to_response(rejection),
    };

    let update = UpdateFueler {
        name: body.name,
        handheld_name: body.handheld_name,
    };

    match services.registry.update(id, update).await {
        Ok(fueler) => Json(dto::fueler_to_json(&fueler)).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn set_status(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    body: Result<Json<dto::SetFuelerStatusRequest>, JsonRejection>,
) -> axum::response::Response {
    let id: FuelerId = match errors::parse_id(&id, "fueler") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::json_rejection_to_response(rejection),
    };
    let status = match FuelerStatus::parse(&body.status) {
        Ok(s) => s,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.registry.set_status(id, status).await {
        Ok(fueler) => Json(dto::fueler_to_json(&fueler)).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn delete_fueler(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: FuelerId = match errors::parse_id(&id, "fueler") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.registry.delete(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn fueler_certifications(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: FuelerId = match errors::parse_id(&id, "fueler") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    if let Err(e) = services.registry.get(id).await {
        return errors::store_error_to_response(e);
    }

    certifications_for(&services, id).await
}

/// Certifications of the fueler profile linked to the caller's account.
pub async fn my_certifications(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    let fueler = match services.registry.for_user(principal.user_id()).await {
        Ok(f) => f,
        Err(e) => return errors::store_error_to_response(e),
    };

    certifications_for(&services, fueler.id).await
}

async fn certifications_for(services: &AppServices, fueler_id: FuelerId) -> axum::response::Response {
    let today = today();
    match services.ledger.list(&CertificationFilter::for_fueler(fueler_id), None).await {
        Ok(records) => {
            let items: Vec<_> = records.iter().map(|r| dto::certification_to_json(r, today)).collect();
            Json(items).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}
