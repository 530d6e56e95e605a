use axum::{routing::get, Router};

pub mod assignments;
pub mod certifications;
pub mod fuelers;
pub mod system;
pub mod trainings;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/trainings", trainings::router())
        .nest("/fuelers", fuelers::router())
        .nest("/certifications", certifications::router())
        .nest("/assignments", assignments::router())
}

/// Authenticated endpoints that check access per resource instead of by method.
pub fn self_service_router() -> Router {
    Router::new().merge(assignments::completion_router())
}
