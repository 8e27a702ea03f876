//! Metadata store: image records and projects
//!
//! Every write bumps `revision`; [`MetadataStore::replace_image_if`] is the
//! compare-and-swap used by the transition handlers and the enrichment merge.

pub mod images;
pub mod projects;
pub mod schema;

mod memory;
mod pg;

pub use memory::MemoryMetadataStore;
pub use pg::PgMetadataStore;

use async_trait::async_trait;
use shared::models::{ImageRecord, Project, RelocationState};
use thiserror::Error;

use crate::retry::Retryable;

#[derive(Debug, Clone, Error)]
pub enum DbError {
    /// Expected revision did not match (or the record vanished)
    #[error("revision conflict on {id}")]
    Conflict { id: String },
    #[error("record already exists: {id}")]
    Duplicate { id: String },
    #[error("metadata store unavailable: {0}")]
    Unavailable(String),
    #[error("metadata store timed out: {0}")]
    Timeout(String),
    #[error("corrupt row {id}: {reason}")]
    Corrupt { id: String, reason: String },
    #[error("metadata store error: {0}")]
    Fatal(String),
}

impl Retryable for DbError {
    fn is_retryable(&self) -> bool {
        matches!(self, DbError::Unavailable(_) | DbError::Timeout(_))
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::PoolTimedOut => DbError::Timeout(err.to_string()),
            sqlx::Error::Io(_) | sqlx::Error::PoolClosed | sqlx::Error::WorkerCrashed => {
                DbError::Unavailable(err.to_string())
            }
            sqlx::Error::Database(db) => match db.code().as_deref() {
                // serialization_failure, deadlock_detected, admin/crash shutdown,
                // cannot_connect_now, too_many_connections
                Some("40001" | "40P01" | "57P01" | "57P02" | "57P03" | "53300") => {
                    DbError::Unavailable(err.to_string())
                }
                Some("57014") => DbError::Timeout(err.to_string()),
                _ => DbError::Fatal(err.to_string()),
            },
            _ => DbError::Fatal(err.to_string()),
        }
    }
}

#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn get_image(&self, id: &str) -> Result<Option<ImageRecord>, DbError>;

    /// Insert a freshly ingested record; `Duplicate` if the id is taken
    async fn insert_image(&self, record: &ImageRecord) -> Result<(), DbError>;

    /// Replace the mutable fields of `record` if the stored revision is
    /// `expected_revision`. Returns the stored record with its new revision.
    async fn replace_image_if(
        &self,
        record: &ImageRecord,
        expected_revision: i64,
    ) -> Result<ImageRecord, DbError>;

    /// Unconditional progress write. Returns false if the record is gone.
    async fn set_relocation_state(
        &self,
        id: &str,
        state: RelocationState,
        error: Option<&str>,
    ) -> Result<bool, DbError>;

    /// Write paths, status and project of a finished move, mark it
    /// `complete` and clear `relocation_error`. Returns false if the record
    /// is gone.
    async fn complete_relocation(&self, record: &ImageRecord) -> Result<bool, DbError>;

    /// Write the paths of `record` where its files actually are after an
    /// interrupted move, and mark it `failed`. Status and project are left
    /// alone. Returns false if the record is gone.
    async fn fail_relocation(&self, record: &ImageRecord, error: &str) -> Result<bool, DbError>;

    /// Returns false if there was nothing to delete
    async fn delete_image(&self, id: &str) -> Result<bool, DbError>;

    async fn count_images_by_project(&self, project_id: &str) -> Result<i64, DbError>;

    async fn create_project(&self, project: &Project) -> Result<(), DbError>;

    async fn get_project(&self, id: &str) -> Result<Option<Project>, DbError>;

    /// Ordered by creation time
    async fn list_projects(&self) -> Result<Vec<Project>, DbError>;

    async fn set_project_image_count(&self, id: &str, count: i64) -> Result<(), DbError>;

    /// Add `delta` to the cached counter, never going below zero
    async fn adjust_project_image_count(&self, id: &str, delta: i64) -> Result<(), DbError>;
}
