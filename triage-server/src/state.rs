//! Application state for the triage server
//!
//! Store handles, the dispatch queue and feature switches live here and are
//! handed to every handler explicitly.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::config::{Config, RelocationConfig};
use crate::db::{MetadataStore, PgMetadataStore};
use crate::dispatch::{Delivery, Dispatcher};
use crate::enrichment::{ContentAnalyzer, HttpAnalyzer};
use crate::retry::RetryPolicy;
use crate::store::{ContentStore, S3ContentStore};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// One independent policy per external store
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicies {
    pub content_store: RetryPolicy,
    pub metadata_store: RetryPolicy,
    pub content_analysis: RetryPolicy,
}

impl Default for RetryPolicies {
    fn default() -> Self {
        Self {
            content_store: RetryPolicy::content_store(),
            metadata_store: RetryPolicy::metadata_store(),
            content_analysis: RetryPolicy::content_analysis(),
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Object storage with the image files
    pub content: Arc<dyn ContentStore>,
    /// Image records and projects
    pub metadata: Arc<dyn MetadataStore>,
    /// Enrichment is disabled when absent
    pub analyzer: Option<Arc<dyn ContentAnalyzer>>,
    /// Relocation queue
    pub dispatcher: Dispatcher,
    pub retry: Arc<RetryPolicies>,
    pub relocation: RelocationConfig,
}

impl AppState {
    /// Connect to PostgreSQL and S3 and build the analyzer if configured.
    ///
    /// Returns the receiving end of the relocation queue for the worker.
    pub async fn new(config: &Config) -> Result<(Self, mpsc::Receiver<Delivery>), BoxError> {
        let metadata =
            PgMetadataStore::connect(&config.database_url, config.tables.clone()).await?;
        tracing::info!("Metadata store connected");

        let content = S3ContentStore::from_env(config.content_bucket.clone()).await;
        tracing::info!(bucket = %config.content_bucket, "Content store ready");

        let analyzer: Option<Arc<dyn ContentAnalyzer>> = match &config.analysis {
            Some(analysis) => {
                tracing::info!(model = %analysis.model, "Content analysis enabled");
                Some(Arc::new(HttpAnalyzer::new(analysis.clone())?))
            }
            None => {
                tracing::info!("Content analysis disabled (ANALYSIS_API_KEY not set)");
                None
            }
        };

        Ok(Self::from_parts(
            Arc::new(content),
            Arc::new(metadata),
            analyzer,
            config.relocation.clone(),
        ))
    }

    /// Assemble state from ready-made backends
    pub fn from_parts(
        content: Arc<dyn ContentStore>,
        metadata: Arc<dyn MetadataStore>,
        analyzer: Option<Arc<dyn ContentAnalyzer>>,
        relocation: RelocationConfig,
    ) -> (Self, mpsc::Receiver<Delivery>) {
        let (dispatcher, rx) = Dispatcher::channel(relocation.queue_capacity);
        let state = Self {
            content,
            metadata,
            analyzer,
            dispatcher,
            retry: Arc::new(RetryPolicies::default()),
            relocation,
        };
        (state, rx)
    }

    /// Replace the retry policies (tests use short delays)
    pub fn with_retry(mut self, retry: RetryPolicies) -> Self {
        self.retry = Arc::new(retry);
        self
    }
}
