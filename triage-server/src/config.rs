//! Triage server configuration

use std::time::Duration;

use crate::db::schema::{Tables, is_plain_identifier};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

const DEFAULT_ANALYSIS_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";
const DEFAULT_ANALYSIS_MODEL: &str = "claude-3-haiku-20240307";

/// Content-analysis collaborator settings (enrichment is off without a key)
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub api_key: String,
    pub endpoint: String,
    pub model: String,
}

/// Relocation worker pool settings
#[derive(Debug, Clone, PartialEq)]
pub struct RelocationConfig {
    /// Relocations running at once
    pub workers: usize,
    /// Dispatch queue bound
    pub queue_capacity: usize,
    /// Deliveries per payload, the first one included
    pub max_deliveries: u32,
    /// An in-flight relocation older than this may be overridden
    pub stale_after: Duration,
}

impl Default for RelocationConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 256,
            max_deliveries: 3,
            stale_after: Duration::from_secs(900),
        }
    }
}

/// Triage server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Environment: development | staging | production
    pub environment: String,
    /// HTTP listen port
    pub http_port: u16,
    /// PostgreSQL connection URL
    pub database_url: String,
    /// S3 bucket holding originals, previews and sidecars
    pub content_bucket: String,
    /// Metadata table names
    pub tables: Tables,
    pub analysis: Option<AnalysisConfig>,
    pub relocation: RelocationConfig,
    /// Daily rolling log files go here when set
    pub log_dir: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, BoxError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, BoxError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let parsed = |name: &str, default: u64| -> Result<u64, BoxError> {
            match var(name) {
                Some(v) => v
                    .trim()
                    .parse()
                    .map_err(|_| format!("{name} must be a non-negative integer, got {v:?}").into()),
                None => Ok(default),
            }
        };

        let environment = var("ENVIRONMENT").unwrap_or_else(|| "development".into());

        let tables = Tables {
            images: var("IMAGES_TABLE").unwrap_or_else(|| "images".into()),
            projects: var("PROJECTS_TABLE").unwrap_or_else(|| "projects".into()),
        };
        for (name, value) in [
            ("IMAGES_TABLE", &tables.images),
            ("PROJECTS_TABLE", &tables.projects),
        ] {
            if !is_plain_identifier(value) {
                return Err(format!("{name} must be a plain SQL identifier, got {value:?}").into());
            }
        }

        let analysis = var("ANALYSIS_API_KEY").map(|api_key| AnalysisConfig {
            api_key,
            endpoint: var("ANALYSIS_ENDPOINT").unwrap_or_else(|| DEFAULT_ANALYSIS_ENDPOINT.into()),
            model: var("ANALYSIS_MODEL").unwrap_or_else(|| DEFAULT_ANALYSIS_MODEL.into()),
        });

        let defaults = RelocationConfig::default();
        let relocation = RelocationConfig {
            workers: parsed("RELOCATION_WORKERS", defaults.workers as u64)?.max(1) as usize,
            queue_capacity: parsed("RELOCATION_QUEUE_CAPACITY", defaults.queue_capacity as u64)?
                .max(1) as usize,
            max_deliveries: parsed("RELOCATION_MAX_DELIVERIES", defaults.max_deliveries as u64)?
                .clamp(1, u32::MAX as u64) as u32,
            stale_after: Duration::from_secs(parsed(
                "RELOCATION_STALE_SECS",
                defaults.stale_after.as_secs(),
            )?),
        };

        let http_port = parsed("HTTP_PORT", 8080)?;
        let http_port =
            u16::try_from(http_port).map_err(|_| format!("HTTP_PORT out of range: {http_port}"))?;

        Ok(Self {
            environment,
            http_port,
            database_url: var("DATABASE_URL").ok_or("DATABASE_URL must be set")?,
            content_bucket: var("CONTENT_BUCKET").ok_or("CONTENT_BUCKET must be set")?,
            tables,
            analysis,
            relocation,
            log_dir: var("LOG_DIR"),
        })
    }
}
