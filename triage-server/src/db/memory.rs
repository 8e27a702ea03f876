//! In-memory metadata store

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use shared::models::{ImageRecord, Project, RelocationState};
use shared::util::now_millis;

use super::{DbError, MetadataStore};

#[derive(Debug, Default)]
pub struct MemoryMetadataStore {
    images: RwLock<BTreeMap<String, ImageRecord>>,
    projects: RwLock<BTreeMap<String, Project>>,
    /// Remaining write operations that fail with `Unavailable`
    failing_writes: Mutex<u32>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` writes with a transient error
    pub fn fail_next_writes(&self, n: u32) {
        *self.failing_writes.lock() = n;
    }

    pub fn image_count(&self) -> usize {
        self.images.read().len()
    }

    fn check_write(&self) -> Result<(), DbError> {
        let mut remaining = self.failing_writes.lock();
        if *remaining > 0 {
            *remaining -= 1;
            return Err(DbError::Unavailable("injected write failure".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn get_image(&self, id: &str) -> Result<Option<ImageRecord>, DbError> {
        Ok(self.images.read().get(id).cloned())
    }

    async fn insert_image(&self, record: &ImageRecord) -> Result<(), DbError> {
        self.check_write()?;
        let mut images = self.images.write();
        if images.contains_key(&record.id) {
            return Err(DbError::Duplicate {
                id: record.id.clone(),
            });
        }
        images.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn replace_image_if(
        &self,
        record: &ImageRecord,
        expected_revision: i64,
    ) -> Result<ImageRecord, DbError> {
        self.check_write()?;
        let mut images = self.images.write();
        let conflict = || DbError::Conflict {
            id: record.id.clone(),
        };
        let stored = images.get_mut(&record.id).ok_or_else(conflict)?;
        if stored.revision != expected_revision {
            return Err(conflict());
        }

        let mut next = record.clone();
        next.inserted_at = stored.inserted_at;
        next.updated_at = now_millis();
        next.revision = stored.revision + 1;
        *stored = next.clone();
        Ok(next)
    }

    async fn set_relocation_state(
        &self,
        id: &str,
        state: RelocationState,
        error: Option<&str>,
    ) -> Result<bool, DbError> {
        self.check_write()?;
        let mut images = self.images.write();
        let Some(stored) = images.get_mut(id) else {
            return Ok(false);
        };
        stored.relocation_state = state;
        stored.relocation_error = error.map(str::to_owned);
        stored.updated_at = now_millis();
        stored.revision += 1;
        Ok(true)
    }

    async fn complete_relocation(&self, record: &ImageRecord) -> Result<bool, DbError> {
        self.check_write()?;
        let mut images = self.images.write();
        let Some(stored) = images.get_mut(&record.id) else {
            return Ok(false);
        };
        stored.original_path = record.original_path.clone();
        stored.thumb_small_path = record.thumb_small_path.clone();
        stored.thumb_large_path = record.thumb_large_path.clone();
        stored.raw_sidecar_path = record.raw_sidecar_path.clone();
        stored.related_paths = record.related_paths.clone();
        stored.status = record.status;
        stored.project_id = record.project_id.clone();
        stored.relocation_state = RelocationState::Complete;
        stored.relocation_error = None;
        stored.updated_at = now_millis();
        stored.revision += 1;
        Ok(true)
    }

    async fn fail_relocation(&self, record: &ImageRecord, error: &str) -> Result<bool, DbError> {
        self.check_write()?;
        let mut images = self.images.write();
        let Some(stored) = images.get_mut(&record.id) else {
            return Ok(false);
        };
        stored.original_path = record.original_path.clone();
        stored.thumb_small_path = record.thumb_small_path.clone();
        stored.thumb_large_path = record.thumb_large_path.clone();
        stored.raw_sidecar_path = record.raw_sidecar_path.clone();
        stored.related_paths = record.related_paths.clone();
        stored.relocation_state = RelocationState::Failed;
        stored.relocation_error = Some(error.to_string());
        stored.updated_at = now_millis();
        stored.revision += 1;
        Ok(true)
    }

    async fn delete_image(&self, id: &str) -> Result<bool, DbError> {
        self.check_write()?;
        Ok(self.images.write().remove(id).is_some())
    }

    async fn count_images_by_project(&self, project_id: &str) -> Result<i64, DbError> {
        Ok(self
            .images
            .read()
            .values()
            .filter(|r| r.project_id.as_deref() == Some(project_id))
            .count() as i64)
    }

    async fn create_project(&self, project: &Project) -> Result<(), DbError> {
        self.check_write()?;
        let mut projects = self.projects.write();
        if projects.contains_key(&project.id) {
            return Err(DbError::Duplicate {
                id: project.id.clone(),
            });
        }
        projects.insert(project.id.clone(), project.clone());
        Ok(())
    }

    async fn get_project(&self, id: &str) -> Result<Option<Project>, DbError> {
        Ok(self.projects.read().get(id).cloned())
    }

    async fn list_projects(&self) -> Result<Vec<Project>, DbError> {
        let mut projects: Vec<Project> = self.projects.read().values().cloned().collect();
        projects.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(projects)
    }

    async fn set_project_image_count(&self, id: &str, count: i64) -> Result<(), DbError> {
        self.check_write()?;
        if let Some(project) = self.projects.write().get_mut(id) {
            project.image_count = count;
            project.updated_at = now_millis();
        }
        Ok(())
    }

    async fn adjust_project_image_count(&self, id: &str, delta: i64) -> Result<(), DbError> {
        self.check_write()?;
        if let Some(project) = self.projects.write().get_mut(id) {
            project.image_count = (project.image_count + delta).max(0);
            project.updated_at = now_millis();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> ImageRecord {
        ImageRecord::new_ingested("img-1", "new/a.jpg", "new/a_s.jpg", "new/a_l.jpg", 0)
    }

    #[tokio::test]
    async fn test_replace_if_bumps_revision() {
        let store = MemoryMetadataStore::new();
        store.insert_image(&record()).await.unwrap();

        let mut edit = record();
        edit.rating = 4;
        let stored = store.replace_image_if(&edit, 0).await.unwrap();
        assert_eq!(stored.revision, 1);
        assert_eq!(stored.rating, 4);

        let err = store.replace_image_if(&edit, 0).await.unwrap_err();
        assert!(matches!(err, DbError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_injected_write_failure() {
        let store = MemoryMetadataStore::new();
        store.fail_next_writes(1);
        assert!(matches!(
            store.insert_image(&record()).await,
            Err(DbError::Unavailable(_))
        ));
        store.insert_image(&record()).await.unwrap();
        assert_eq!(store.image_count(), 1);
    }
}
