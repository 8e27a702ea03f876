//! Content store: object storage holding originals, previews and sidecars
//!
//! Objects are addressed by string keys (`approved/blue/2024/03/02/IMG_1.jpg`).
//! The relocation engine only needs copy, delete, exists, a folder listing
//! and a download for enrichment.

mod memory;
mod s3;

pub use memory::{MemoryContentStore, StoreOp};
pub use s3::S3ContentStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::retry::Retryable;

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("object not found: {path}")]
    NotFound { path: String },
    #[error("content store throttled: {0}")]
    Throttled(String),
    #[error("content store unavailable: {0}")]
    Unavailable(String),
    #[error("content store timed out: {0}")]
    Timeout(String),
    #[error("content store error: {0}")]
    Fatal(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

impl Retryable for StoreError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            StoreError::Throttled(_) | StoreError::Unavailable(_) | StoreError::Timeout(_)
        )
    }
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Location identifier (bucket name)
    fn location(&self) -> &str;

    async fn exists(&self, path: &str) -> Result<bool, StoreError>;

    /// Server-side copy; `NotFound` when the source is absent
    async fn copy(&self, from: &str, to: &str) -> Result<(), StoreError>;

    /// Delete; deleting an absent key succeeds
    async fn delete(&self, path: &str) -> Result<(), StoreError>;

    /// Keys directly inside `folder` (no recursion)
    async fn list(&self, folder: &str) -> Result<Vec<String>, StoreError>;

    async fn get(&self, path: &str) -> Result<Vec<u8>, StoreError>;
}
