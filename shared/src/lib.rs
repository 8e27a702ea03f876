//! Shared types for the photo triage service
//!
//! Wire models for images, projects and relocation dispatch, plus the
//! unified error system used by the server and its clients.

pub mod error;
pub mod models;
pub mod util;

pub use error::{ApiResponse, AppError, AppResult, ErrorCode};
pub use models::{ImageRecord, ImageStatus, Project, RelocationRequest, RelocationState};
