use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::Utc;

use fuelcert_core::TrainingId;
use fuelcert_training::{RegisterTraining, UpdateTraining};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_trainings).post(create_training))
        .route("/:id", get(get_training).patch(update_training).delete(delete_training))
}

pub async fn create_training(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::CreateTrainingRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::json_rejection_to_response(rejection),
    };

    let cmd = RegisterTraining {
        training_id: TrainingId::new(),
        name: body.name,
        description: body.description,
        validity_period_days: body.validity_period_days,
        aircraft_type: body.aircraft_type,
        occurred_at: Utc::now(),
    };

    match services.catalog.register(cmd).await {
        Ok(training) => (StatusCode::CREATED, Json(dto::training_to_json(&training))).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn list_trainings(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.catalog.list().await {
        Ok(trainings) => {
            let items: Vec<_> = trainings.iter().map(dto::training_to_json).collect();
            Json(items).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn get_training(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: TrainingId = match errors::parse_id(&id, "training") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.catalog.get(id).await {
        Ok(training) => Json(dto::training_to_json(&training)).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn update_training(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    body: Result<Json<dto::UpdateTrainingRequest>, JsonRejection>,
) -> axum::response::Response {
    let id: TrainingId = match errors::parse_id(&id, "training") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::json_rejection_to_response(rejection),
    };

    let update = UpdateTraining {
        description: body.description,
        validity_period_days: body.validity_period_days,
        aircraft_type: body.aircraft_type,
    };

    match services.catalog.update(id, update).await {
        Ok(training) => Json(dto::training_to_json(&training)).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn delete_training(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: TrainingId = match errors::parse_id(&id, "training") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.catalog.delete(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}
