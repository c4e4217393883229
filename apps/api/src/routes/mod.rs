pub mod health;
pub mod patches;
pub mod resumes;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Patch generation
        .route(
            "/api/v1/patches/:id/generate",
            post(patches::handle_generate),
        )
        .route("/api/v1/patches/:id/status", get(patches::handle_status))
        // Resumes
        .route("/api/v1/resumes/:id/extract", post(resumes::handle_extract))
        .route(
            "/api/v1/resume-data/validate",
            post(resumes::handle_validate_data),
        )
        .with_state(state)
}
