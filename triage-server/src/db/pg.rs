//! PostgreSQL-backed metadata store

use async_trait::async_trait;
use shared::models::{ImageRecord, Project, RelocationState};
use shared::util::now_millis;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use super::schema::Tables;
use super::{DbError, MetadataStore, images, projects};

#[derive(Clone)]
pub struct PgMetadataStore {
    pool: PgPool,
    tables: Tables,
}

impl PgMetadataStore {
    pub fn new(pool: PgPool, tables: Tables) -> Self {
        Self { pool, tables }
    }

    /// Connect and make sure the tables exist
    pub async fn connect(
        database_url: &str,
        tables: Tables,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        super::schema::ensure_tables(&pool, &tables).await?;
        Ok(Self::new(pool, tables))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for PgMetadataStore {
    async fn get_image(&self, id: &str) -> Result<Option<ImageRecord>, DbError> {
        images::get(&self.pool, &self.tables.images, id).await
    }

    async fn insert_image(&self, record: &ImageRecord) -> Result<(), DbError> {
        images::insert(&self.pool, &self.tables.images, record).await
    }

    async fn replace_image_if(
        &self,
        record: &ImageRecord,
        expected_revision: i64,
    ) -> Result<ImageRecord, DbError> {
        images::replace_if(
            &self.pool,
            &self.tables.images,
            record,
            expected_revision,
            now_millis(),
        )
        .await?
        .ok_or_else(|| DbError::Conflict {
            id: record.id.clone(),
        })
    }

    async fn set_relocation_state(
        &self,
        id: &str,
        state: RelocationState,
        error: Option<&str>,
    ) -> Result<bool, DbError> {
        images::set_relocation_state(
            &self.pool,
            &self.tables.images,
            id,
            state,
            error,
            now_millis(),
        )
        .await
    }

    async fn complete_relocation(&self, record: &ImageRecord) -> Result<bool, DbError> {
        images::complete_relocation(&self.pool, &self.tables.images, record, now_millis()).await
    }

    async fn fail_relocation(&self, record: &ImageRecord, error: &str) -> Result<bool, DbError> {
        images::fail_relocation(&self.pool, &self.tables.images, record, error, now_millis()).await
    }

    async fn delete_image(&self, id: &str) -> Result<bool, DbError> {
        images::delete(&self.pool, &self.tables.images, id).await
    }

    async fn count_images_by_project(&self, project_id: &str) -> Result<i64, DbError> {
        images::count_by_project(&self.pool, &self.tables.images, project_id).await
    }

    async fn create_project(&self, project: &Project) -> Result<(), DbError> {
        projects::create(&self.pool, &self.tables.projects, project).await
    }

    async fn get_project(&self, id: &str) -> Result<Option<Project>, DbError> {
        projects::get(&self.pool, &self.tables.projects, id).await
    }

    async fn list_projects(&self) -> Result<Vec<Project>, DbError> {
        projects::list(&self.pool, &self.tables.projects).await
    }

    async fn set_project_image_count(&self, id: &str, count: i64) -> Result<(), DbError> {
        projects::set_image_count(&self.pool, &self.tables.projects, id, count, now_millis()).await
    }

    async fn adjust_project_image_count(&self, id: &str, delta: i64) -> Result<(), DbError> {
        projects::adjust_image_count(&self.pool, &self.tables.projects, id, delta, now_millis())
            .await
    }
}
