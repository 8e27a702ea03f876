//! Enrichment: keywords and description from the content analyzer
//!
//! Runs after an image lands in `approved`. All failures are soft: they are
//! returned to the caller for logging and never touch `status` or
//! `relocation_state`.

mod analyzer;
mod merge;

pub use analyzer::{
    Analysis, AnalysisError, ContentAnalyzer, HttpAnalyzer, media_type_for, parse_analysis,
};
pub use merge::{apply_analysis, merge_keywords};

use shared::models::ImageStatus;
use thiserror::Error;

use crate::db::DbError;
use crate::state::AppState;
use crate::store::StoreError;

/// Read-merge-write attempts before giving up on a contended record
const MAX_MERGE_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrichmentOutcome {
    /// No analyzer configured
    Disabled,
    /// Record gone, no longer approved, or already described
    Skipped,
    /// Merge produced no change
    Unchanged,
    Merged,
}

#[derive(Debug, Error)]
pub enum EnrichmentError {
    #[error(transparent)]
    Metadata(#[from] DbError),
    #[error(transparent)]
    Content(#[from] StoreError),
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
    #[error("record kept changing, gave up after {0} merge attempts")]
    Contended(u32),
}

/// Analyze the large preview of `image_id` and merge the result
pub async fn enrich_image(
    state: &AppState,
    image_id: &str,
) -> Result<EnrichmentOutcome, EnrichmentError> {
    let Some(analyzer) = state.analyzer.as_deref() else {
        return Ok(EnrichmentOutcome::Disabled);
    };

    let record = state
        .retry
        .metadata_store
        .run("get_image", || state.metadata.get_image(image_id))
        .await?;
    let Some(record) = record else {
        return Ok(EnrichmentOutcome::Skipped);
    };
    if record.status != ImageStatus::Approved || !record.description.trim().is_empty() {
        return Ok(EnrichmentOutcome::Skipped);
    }

    let preview = record.thumb_large_path.as_str();
    let bytes = state
        .retry
        .content_store
        .run("get", || state.content.get(preview))
        .await?;
    let media_type = media_type_for(preview);
    let analysis = state
        .retry
        .content_analysis
        .run("analyze", || analyzer.analyze(&bytes, media_type))
        .await?;

    merge_into_record(state, image_id, &analysis).await
}

/// Compare-and-swap loop: re-read and re-merge when another writer wins
pub async fn merge_into_record(
    state: &AppState,
    image_id: &str,
    analysis: &Analysis,
) -> Result<EnrichmentOutcome, EnrichmentError> {
    for attempt in 1..=MAX_MERGE_ATTEMPTS {
        let current = state
            .retry
            .metadata_store
            .run("get_image", || state.metadata.get_image(image_id))
            .await?;
        let Some(current) = current else {
            return Ok(EnrichmentOutcome::Skipped);
        };

        let mut merged = current.clone();
        if !apply_analysis(&mut merged, analysis) {
            return Ok(EnrichmentOutcome::Unchanged);
        }

        match state
            .retry
            .metadata_store
            .run("merge_enrichment", || {
                state.metadata.replace_image_if(&merged, current.revision)
            })
            .await
        {
            Ok(stored) => {
                tracing::info!(
                    image_id,
                    keywords = stored.keywords.len(),
                    revision = stored.revision,
                    "Enrichment merged"
                );
                return Ok(EnrichmentOutcome::Merged);
            }
            Err(DbError::Conflict { .. }) => {
                tracing::debug!(image_id, attempt, "Enrichment merge lost a race, retrying");
            }
            Err(e) => return Err(e.into()),
        }
    }
    Err(EnrichmentError::Contended(MAX_MERGE_ATTEMPTS))
}
