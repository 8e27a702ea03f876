//! API routes for the triage server

pub mod health;
pub mod images;
pub mod projects;

use axum::Router;
use axum::routing::{get, post};

use crate::state::AppState;

/// Create the combined router
pub fn create_router(state: AppState) -> Router {
    let images = Router::new()
        .route(
            "/api/images/{id}",
            get(images::get_image).put(images::update_image),
        )
        .route("/api/images/{id}/delete", post(images::delete_image))
        .route("/api/images/{id}/undelete", post(images::undelete_image))
        .route("/api/images/{id}/project", post(images::assign_project));

    let projects = Router::new().route(
        "/api/projects",
        get(projects::list_projects).post(projects::create_project),
    );

    Router::new()
        .route("/health", get(health::health_check))
        .merge(images)
        .merge(projects)
        .with_state(state)
}
