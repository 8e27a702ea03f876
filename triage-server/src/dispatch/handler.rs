//! Background half of a transition: run the move and record the outcome

use shared::models::relocation::DispatchPayload;
use shared::models::{ImageStatus, RelocationRequest, RelocationState};

use crate::db::DbError;
use crate::enrichment::{self, EnrichmentOutcome};
use crate::relocation::{RelocationEngine, RelocationError};
use crate::state::AppState;

/// What a delivery ended up doing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelocationOutcome {
    /// Record no longer exists
    Gone,
    /// Duplicate delivery of a finished move
    AlreadyRelocated,
    Completed,
    /// Original vanished; record deleted
    SelfHealed,
    /// Move failed; record marked `failed`
    Failed,
}

/// Handle one dispatch payload.
///
/// `Err` means the outcome could not be recorded in the metadata store and
/// the delivery should be retried.
pub async fn handle_payload(
    state: &AppState,
    payload: &DispatchPayload,
) -> Result<RelocationOutcome, DbError> {
    match payload {
        DispatchPayload::MoveFiles(request) => handle_move(state, request).await,
    }
}

async fn handle_move(
    state: &AppState,
    request: &RelocationRequest,
) -> Result<RelocationOutcome, DbError> {
    let id = request.image_id.as_str();
    let db_retry = &state.retry.metadata_store;

    let record = db_retry
        .run("get_image", || state.metadata.get_image(id))
        .await?;
    let Some(record) = record else {
        tracing::info!(image_id = %id, "Image gone before relocation, nothing to do");
        return Ok(RelocationOutcome::Gone);
    };

    if record.relocation_state == RelocationState::Complete
        && record.status == request.target_status
        && record.is_located_at(&request.destination_prefix)
    {
        tracing::debug!(image_id = %id, "Duplicate delivery, already relocated");
        return Ok(RelocationOutcome::AlreadyRelocated);
    }

    if state.content.location() != request.store_location {
        tracing::warn!(
            image_id = %id,
            expected = %request.store_location,
            actual = %state.content.location(),
            "Relocation targets a different content store"
        );
        let message = format!("unknown content store location {}", request.store_location);
        return mark_failed(state, id, &message).await;
    }

    let moving = db_retry
        .run("set_moving", || {
            state
                .metadata
                .set_relocation_state(id, RelocationState::Moving, None)
        })
        .await?;
    if !moving {
        return Ok(RelocationOutcome::Gone);
    }

    let engine = RelocationEngine::new(state.content.as_ref(), &state.retry.content_store);
    match engine.relocate(&record, &request.destination_prefix).await {
        Ok(paths) => {
            let mut updated = record.clone();
            paths.apply_to(&mut updated);
            updated.status = request.target_status;
            if let Some(project_id) = &request.project_id {
                updated.project_id = Some(project_id.clone());
            }

            let written = db_retry
                .run("complete_relocation", || {
                    state.metadata.complete_relocation(&updated)
                })
                .await?;
            if !written {
                tracing::warn!(image_id = %id, "Image deleted while relocating");
                return Ok(RelocationOutcome::Gone);
            }
            tracing::info!(
                image_id = %id,
                status = %request.target_status,
                destination = %request.destination_prefix,
                "Relocation complete"
            );

            if let Some(project_id) = &request.project_id
                && record.project_id.as_deref() != Some(project_id.as_str())
            {
                adjust_project_count(state, project_id, 1).await;
            }

            if request.target_status == ImageStatus::Approved {
                run_enrichment(state, id).await;
            }
            Ok(RelocationOutcome::Completed)
        }
        Err(RelocationError::SourceMissing { path }) => {
            tracing::warn!(image_id = %id, path = %path, "Original missing, deleting record");
            let deleted = db_retry
                .run("delete_image", || state.metadata.delete_image(id))
                .await?;
            if deleted && let Some(project_id) = &record.project_id {
                adjust_project_count(state, project_id, -1).await;
            }
            Ok(RelocationOutcome::SelfHealed)
        }
        Err(RelocationError::Incomplete { paths, source }) => {
            tracing::error!(image_id = %id, error = %source, original = %paths.original_path, "Relocation failed halfway");
            let message = format!("{source} (files left at the destination)");
            let mut updated = record.clone();
            paths.apply_to(&mut updated);
            db_retry
                .run("fail_relocation", || {
                    state.metadata.fail_relocation(&updated, &message)
                })
                .await?;
            Ok(RelocationOutcome::Failed)
        }
        Err(e) => {
            tracing::error!(image_id = %id, error = %e, "Relocation failed");
            mark_failed(state, id, &e.to_string()).await
        }
    }
}

async fn mark_failed(
    state: &AppState,
    id: &str,
    message: &str,
) -> Result<RelocationOutcome, DbError> {
    state
        .retry
        .metadata_store
        .run("set_failed", || {
            state
                .metadata
                .set_relocation_state(id, RelocationState::Failed, Some(message))
        })
        .await?;
    Ok(RelocationOutcome::Failed)
}

/// Counter drift is repaired when projects are listed
async fn adjust_project_count(state: &AppState, project_id: &str, delta: i64) {
    if let Err(e) = state
        .retry
        .metadata_store
        .run("adjust_project_count", || {
            state.metadata.adjust_project_image_count(project_id, delta)
        })
        .await
    {
        tracing::warn!(project_id, delta, error = %e, "Failed to adjust project image count");
    }
}

async fn run_enrichment(state: &AppState, id: &str) {
    match enrichment::enrich_image(state, id).await {
        Ok(EnrichmentOutcome::Merged) => {}
        Ok(outcome) => tracing::debug!(image_id = %id, ?outcome, "Enrichment not applied"),
        Err(e) => tracing::warn!(image_id = %id, error = %e, "Enrichment failed"),
    }
}
