//! Data models
//!
//! Shared between the triage server and the UI (via API).
//! Timestamps are Unix milliseconds, IDs are opaque strings.

pub mod image;
pub mod project;
pub mod relocation;

// Re-exports
pub use image::*;
pub use project::*;
pub use relocation::*;
