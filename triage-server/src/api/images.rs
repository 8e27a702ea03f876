//! Image endpoints
//!
//! Transition endpoints answer as soon as the move is queued; poll
//! `GET /api/images/{id}` until `relocation_state` is `complete` or `failed`.

use axum::Json;
use axum::extract::{Path, State};
use shared::error::{ApiResponse, AppResult};
use shared::models::{AssignProjectRequest, ImageRecord, ImageUpdate, TransitionAck};

use crate::lifecycle;
use crate::state::AppState;

/// GET /api/images/{id}
pub async fn get_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<ImageRecord>>> {
    let record = lifecycle::get_image(&state, &id).await?;
    Ok(Json(ApiResponse::success(record)))
}

/// PUT /api/images/{id}
pub async fn update_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<ImageUpdate>,
) -> AppResult<Json<ApiResponse<TransitionAck>>> {
    let ack = lifecycle::update_image(&state, &id, update).await?;
    Ok(Json(ApiResponse::success(ack)))
}

/// POST /api/images/{id}/delete
pub async fn delete_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<TransitionAck>>> {
    let ack = lifecycle::delete_image(&state, &id).await?;
    Ok(Json(ApiResponse::success(ack)))
}

/// POST /api/images/{id}/undelete
pub async fn undelete_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<TransitionAck>>> {
    let ack = lifecycle::undelete_image(&state, &id).await?;
    Ok(Json(ApiResponse::success(ack)))
}

/// POST /api/images/{id}/project
pub async fn assign_project(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<AssignProjectRequest>,
) -> AppResult<Json<ApiResponse<TransitionAck>>> {
    let ack = lifecycle::assign_project(&state, &id, &req.project_id).await?;
    Ok(Json(ApiResponse::success(ack)))
}
