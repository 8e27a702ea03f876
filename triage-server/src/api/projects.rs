//! Project endpoints

use axum::Json;
use axum::extract::State;
use shared::error::{ApiResponse, AppResult};
use shared::models::{Project, ProjectCreate};

use crate::projects;
use crate::state::AppState;

/// GET /api/projects — counts are reconciled before returning
pub async fn list_projects(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<Vec<Project>>>> {
    let projects = projects::list_projects(&state).await?;
    Ok(Json(ApiResponse::success(projects)))
}

/// POST /api/projects
pub async fn create_project(
    State(state): State<AppState>,
    Json(req): Json<ProjectCreate>,
) -> AppResult<Json<ApiResponse<Project>>> {
    let project = projects::create_project(&state, req).await?;
    Ok(Json(ApiResponse::success(project)))
}
