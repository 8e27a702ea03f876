//! triage-server: photo triage relocation service
//!
//! Moves an image's files between content-store prefixes whenever its
//! lifecycle status changes, keeping the metadata record consistent with
//! where the files actually are.
//!
//! - [`lifecycle`]: status state machine and transition handlers
//! - [`relocation`]: copy-then-delete engine with RAW/sidecar discovery
//! - [`dispatch`]: relocation queue and worker pool
//! - [`enrichment`]: keyword/description merge from the content analyzer
//! - [`projects`]: project creation and count reconciliation
//! - [`store`] / [`db`]: content and metadata store backends

pub mod api;
pub mod config;
pub mod core;
pub mod db;
pub mod dispatch;
pub mod enrichment;
pub mod error;
pub mod lifecycle;
pub mod logger;
pub mod projects;
pub mod relocation;
pub mod retry;
pub mod state;
pub mod store;

pub use config::Config;
pub use error::{ServiceError, ServiceResult};
pub use state::AppState;
