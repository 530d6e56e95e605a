//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store selection and service construction
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request DTOs and JSON mapping helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use fuelcert_infra::{AppConfig, StoreError};

use crate::{authz, middleware};

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::AppServices;

/// Build the full HTTP router from configuration (public entrypoint used by `main.rs`).
pub async fn build_app(config: &AppConfig) -> Result<Router, StoreError> {
    let services = Arc::new(AppServices::from_config(config).await?);
    Ok(build_router(services, &config.jwt_secret))
}

/// Build the router around already constructed services.
pub fn build_router(services: Arc<AppServices>, jwt_secret: &str) -> Router {
    let jwt = Arc::new(fuelcert_auth::Hs256JwtValidator::new(jwt_secret.as_bytes()));
    let auth_state = middleware::AuthState { jwt };

    // Protected routes: bearer auth, then the access policy.
    let protected = routes::router().layer(
        ServiceBuilder::new()
            .layer(axum::middleware::from_fn_with_state(auth_state.clone(), middleware::auth_middleware))
            .layer(Extension(services.clone()))
            .layer(axum::middleware::from_fn(authz::require_admin_or_read_only)),
    );

    // Self-service routes: bearer auth only; handlers check ownership.
    let self_service = routes::self_service_router().layer(
        ServiceBuilder::new()
            .layer(axum::middleware::from_fn_with_state(auth_state, middleware::auth_middleware))
            .layer(Extension(services))
            .layer(axum::middleware::from_fn(authz::require_authenticated)),
    );

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected)
        .merge(self_service)
}
