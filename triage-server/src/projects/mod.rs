//! Projects: creation and image-count reconciliation

use shared::error::{AppError, ErrorCode};
use shared::models::{Project, ProjectCreate};
use shared::util::{new_id, now_millis};

use crate::error::ServiceResult;
use crate::state::AppState;

const MAX_PREFIX_LEN: usize = 63;

/// Storage prefix from a project name: lowercase, runs of anything outside
/// `[a-z0-9]` collapsed to `_`, trimmed, at most 63 characters. Falls back
/// to `project_<first 8 chars of id>`.
pub fn storage_prefix(name: &str, id: &str) -> String {
    let mut prefix = String::with_capacity(name.len());
    for c in name.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            prefix.push(c);
        } else if !prefix.ends_with('_') {
            prefix.push('_');
        }
    }

    let mut prefix = prefix.trim_matches('_').to_string();
    prefix.truncate(MAX_PREFIX_LEN);
    let prefix = prefix.trim_end_matches('_');
    if prefix.is_empty() {
        let short: String = id.chars().take(8).collect();
        return format!("project_{short}");
    }
    prefix.to_string()
}

pub async fn create_project(state: &AppState, req: ProjectCreate) -> ServiceResult<Project> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(AppError::new(ErrorCode::ProjectNameRequired).into());
    }

    let id = new_id();
    let now = now_millis();
    let project = Project {
        storage_prefix: storage_prefix(name, &id),
        id,
        name: name.to_string(),
        image_count: 0,
        keywords: crate::enrichment::merge_keywords(&[], &req.keywords),
        archived: false,
        created_at: now,
        updated_at: now,
    };

    state
        .retry
        .metadata_store
        .run("create_project", || state.metadata.create_project(&project))
        .await?;
    tracing::info!(
        project_id = %project.id,
        storage_prefix = %project.storage_prefix,
        "Project created"
    );
    Ok(project)
}

/// List projects, correcting any drifted `image_count` on the way
pub async fn list_projects(state: &AppState) -> ServiceResult<Vec<Project>> {
    let mut projects = state
        .retry
        .metadata_store
        .run("list_projects", || state.metadata.list_projects())
        .await?;

    for project in &mut projects {
        reconcile(state, project).await;
    }
    Ok(projects)
}

/// Recompute one project's count; failures keep the stored value
async fn reconcile(state: &AppState, project: &mut Project) {
    let retry = &state.retry.metadata_store;
    let actual = match retry
        .run("count_images", || {
            state.metadata.count_images_by_project(&project.id)
        })
        .await
    {
        Ok(count) => count,
        Err(e) => {
            tracing::warn!(project_id = %project.id, error = %e, "Failed to count project images");
            return;
        }
    };
    if actual == project.image_count {
        return;
    }

    tracing::info!(
        project_id = %project.id,
        stored = project.image_count,
        actual,
        "Reconciling project image count"
    );
    match retry
        .run("set_project_count", || {
            state.metadata.set_project_image_count(&project.id, actual)
        })
        .await
    {
        Ok(()) => project.image_count = actual,
        Err(e) => {
            tracing::warn!(project_id = %project.id, error = %e, "Failed to store reconciled count");
        }
    }
}
