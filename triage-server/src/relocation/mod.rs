//! Relocation engine: moves an image's files between prefixes
//!
//! There is no transaction across the content store and the metadata store.
//! The engine copies first and deletes second, so an interruption leaves a
//! duplicate rather than a loss, and the metadata update happens only after
//! every file is in place. If the original or a preview cannot move, the
//! files already moved are put back; whatever cannot be put back is written
//! to the record as it stands.

mod engine;
pub mod sidecar;

pub use engine::{RelocatedPaths, RelocationEngine, RelocationError};
