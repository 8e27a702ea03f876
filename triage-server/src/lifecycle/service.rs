//! Transition handlers (synchronous half)
//!
//! Each handler validates the request, writes `relocation_state = pending`
//! together with the user's edits through a compare-and-swap on `revision`,
//! enqueues the move and returns without waiting for it.

use chrono::Utc;
use shared::error::{AppError, ErrorCode};
use shared::models::relocation::DispatchPayload;
use shared::models::{
    ImageRecord, ImageUpdate, Project, RelocationRequest, RelocationState, TransitionAck,
};

use super::plan::{Transition, plan_transition};
use crate::enrichment::merge_keywords;
use crate::error::ServiceResult;
use crate::state::AppState;

const MAX_RATING: i32 = 5;

pub async fn get_image(state: &AppState, id: &str) -> ServiceResult<ImageRecord> {
    let record = state
        .retry
        .metadata_store
        .run("get_image", || state.metadata.get_image(id))
        .await?;
    Ok(record.ok_or_else(|| AppError::image_not_found(id))?)
}

async fn get_project(state: &AppState, id: &str) -> ServiceResult<Project> {
    let project = state
        .retry
        .metadata_store
        .run("get_project", || state.metadata.get_project(id))
        .await?;
    Ok(project.ok_or_else(|| AppError::project_not_found(id))?)
}

/// Update-record: a `color_group` makes this an approve/reject transition,
/// anything else is a plain field edit that moves no files
pub async fn update_image(
    state: &AppState,
    id: &str,
    update: ImageUpdate,
) -> ServiceResult<TransitionAck> {
    if update.is_empty() {
        return Err(AppError::validation("update contains no fields").into());
    }
    if let Some(rating) = update.rating
        && !(0..=MAX_RATING).contains(&rating)
    {
        return Err(AppError::out_of_range("rating", 0, MAX_RATING.into()).into());
    }

    let record = get_image(state, id).await?;

    match update.color_group {
        Some(color_group) => {
            begin_transition(
                state,
                record,
                Transition::Decide { color_group },
                |r| {
                    apply_edits(r, &update);
                    r.color_group = color_group;
                    r.reviewed = update.reviewed.unwrap_or(true);
                },
            )
            .await
        }
        None => {
            let expected = record.revision;
            let mut next = record;
            apply_edits(&mut next, &update);
            let stored = state
                .retry
                .metadata_store
                .run("update_image", || state.metadata.replace_image_if(&next, expected))
                .await?;
            tracing::debug!(image_id = %id, revision = stored.revision, "Image fields updated");
            Ok(TransitionAck {
                image_id: stored.id,
                relocation_state: stored.relocation_state,
                dispatched: false,
            })
        }
    }
}

pub async fn delete_image(state: &AppState, id: &str) -> ServiceResult<TransitionAck> {
    let record = get_image(state, id).await?;
    begin_transition(state, record, Transition::Delete, |_| {}).await
}

/// Back to `new`: the decision is forgotten
pub async fn undelete_image(state: &AppState, id: &str) -> ServiceResult<TransitionAck> {
    let record = get_image(state, id).await?;
    begin_transition(state, record, Transition::Undelete, |r| {
        r.reviewed = false;
        r.color_group = 0;
    })
    .await
}

pub async fn assign_project(
    state: &AppState,
    id: &str,
    project_id: &str,
) -> ServiceResult<TransitionAck> {
    if project_id.trim().is_empty() {
        return Err(AppError::validation("project_id is required").into());
    }
    let record = get_image(state, id).await?;
    begin_transition(
        state,
        record,
        Transition::AssignProject {
            project_id: project_id.to_string(),
        },
        |_| {},
    )
    .await
}

fn apply_edits(record: &mut ImageRecord, update: &ImageUpdate) {
    if let Some(reviewed) = update.reviewed {
        record.reviewed = reviewed;
    }
    if let Some(rating) = update.rating {
        record.rating = rating;
    }
    if let Some(promoted) = update.promoted {
        record.promoted = promoted;
    }
    if let Some(keywords) = &update.keywords {
        record.keywords = merge_keywords(&[], keywords);
    }
}

/// Reject while another relocation is running, unless it looks abandoned
fn ensure_not_in_flight(state: &AppState, record: &ImageRecord, now_ms: i64) -> ServiceResult<()> {
    if !record.relocation_state.is_in_flight() {
        return Ok(());
    }
    let age_ms = now_ms.saturating_sub(record.updated_at);
    let stale_ms = i64::try_from(state.relocation.stale_after.as_millis()).unwrap_or(i64::MAX);
    if age_ms < stale_ms {
        return Err(AppError::with_message(
            ErrorCode::RelocationInFlight,
            format!("relocation already {}", record.relocation_state),
        )
        .with_detail("image_id", record.id.clone())
        .with_detail("relocation_state", record.relocation_state.as_str())
        .into());
    }
    tracing::warn!(
        image_id = %record.id,
        relocation_state = %record.relocation_state,
        age_secs = age_ms / 1000,
        "Overriding stale in-flight relocation"
    );
    Ok(())
}

async fn begin_transition<F>(
    state: &AppState,
    record: ImageRecord,
    transition: Transition,
    edits: F,
) -> ServiceResult<TransitionAck>
where
    F: FnOnce(&mut ImageRecord),
{
    let now = Utc::now();
    ensure_not_in_flight(state, &record, now.timestamp_millis())?;

    let project = match &transition {
        Transition::AssignProject { project_id } => Some(get_project(state, project_id).await?),
        _ => None,
    };
    let plan = plan_transition(&record, &transition, project.as_ref(), now)?;

    let expected = record.revision;
    let mut next = record;
    edits(&mut next);
    next.relocation_state = RelocationState::Pending;
    next.relocation_error = None;

    let stored = state
        .retry
        .metadata_store
        .run("begin_transition", || {
            state.metadata.replace_image_if(&next, expected)
        })
        .await?;

    let request = RelocationRequest {
        image_id: stored.id.clone(),
        destination_prefix: plan.destination_prefix,
        target_status: plan.target_status,
        store_location: state.content.location().to_string(),
        project_id: plan.project_id,
    };
    tracing::info!(
        image_id = %request.image_id,
        from = %stored.status,
        to = %request.target_status,
        destination = %request.destination_prefix,
        "Relocation dispatched"
    );

    if let Err(e) = state.dispatcher.dispatch(DispatchPayload::MoveFiles(request)) {
        tracing::error!(image_id = %stored.id, error = %e, "Failed to enqueue relocation");
        let message = e.to_string();
        if let Err(db_err) = state
            .retry
            .metadata_store
            .run("set_failed", || {
                state
                    .metadata
                    .set_relocation_state(&stored.id, RelocationState::Failed, Some(&message))
            })
            .await
        {
            tracing::error!(image_id = %stored.id, error = %db_err, "Failed to mark relocation failed");
        }
        return Err(e.into());
    }

    Ok(TransitionAck {
        image_id: stored.id,
        relocation_state: RelocationState::Pending,
        dispatched: true,
    })
}
