//! Copy-then-delete relocation of every file of one record

use shared::models::ImageRecord;
use shared::models::image::{file_name, parent_folder};
use thiserror::Error;

use super::sidecar::{Companions, find_companions};
use crate::retry::RetryPolicy;
use crate::store::{ContentStore, StoreError};

#[derive(Debug, Error)]
pub enum RelocationError {
    /// The original is gone and was not moved by an earlier delivery
    #[error("source missing: {path}")]
    SourceMissing { path: String },
    #[error("failed to {op} {path}: {source}")]
    Store {
        op: &'static str,
        path: String,
        #[source]
        source: StoreError,
    },
    /// A move failed and some files could not be put back; `paths` is
    /// where the files actually are now
    #[error("{source} (files left at the destination)")]
    Incomplete {
        paths: RelocatedPaths,
        #[source]
        source: Box<RelocationError>,
    },
}

/// New location of every file after a successful relocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelocatedPaths {
    pub original_path: String,
    pub thumb_small_path: String,
    pub thumb_large_path: String,
    pub raw_sidecar_path: Option<String>,
    pub related_paths: Vec<String>,
}

impl RelocatedPaths {
    pub fn apply_to(self, record: &mut ImageRecord) {
        record.original_path = self.original_path;
        record.thumb_small_path = self.thumb_small_path;
        record.thumb_large_path = self.thumb_large_path;
        record.raw_sidecar_path = self.raw_sidecar_path;
        record.related_paths = self.related_paths;
    }

    /// These paths with every `(from, to)` in `moved` swapped to `to`
    fn with_moves(mut self, moved: &[Moved]) -> Self {
        let locate = |path: &mut String| {
            if let Some(m) = moved.iter().find(|m| m.from == *path) {
                *path = m.to.clone();
            }
        };
        locate(&mut self.original_path);
        locate(&mut self.thumb_small_path);
        locate(&mut self.thumb_large_path);
        self
    }
}

/// Why a single move did not happen
enum MoveFailure {
    /// Source absent and not at the destination either
    Missing,
    Copy(StoreError),
    /// Copy confirmed, old object still there
    Delete(StoreError),
}

/// A required file that now lives at `to` while the record still says `from`
#[derive(Debug, Clone)]
struct Moved {
    from: String,
    to: String,
}

/// Moves files inside one content store, retrying each store call
pub struct RelocationEngine<'a> {
    store: &'a dyn ContentStore,
    retry: &'a RetryPolicy,
}

impl<'a> RelocationEngine<'a> {
    pub fn new(store: &'a dyn ContentStore, retry: &'a RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Move all files of `record` under `destination_prefix`.
    ///
    /// Files already at their destination are left alone, so running this
    /// twice is harmless. The original and both previews move together: if
    /// one of them fails, the ones already moved are put back. When that is
    /// not possible the error is `Incomplete` and carries the real paths.
    pub async fn relocate(
        &self,
        record: &ImageRecord,
        destination_prefix: &str,
    ) -> Result<RelocatedPaths, RelocationError> {
        let prefix = destination_prefix.trim_end_matches('/');
        let (raw, related) = self.companions(record, prefix).await;
        let mut moved = Vec::with_capacity(3);

        let original_path = match self.move_object(&record.original_path, prefix).await {
            Ok(path) => path,
            Err(MoveFailure::Missing) => {
                return Err(RelocationError::SourceMissing {
                    path: record.original_path.clone(),
                });
            }
            Err(MoveFailure::Copy(source)) => {
                return Err(RelocationError::Store {
                    op: "copy",
                    path: record.original_path.clone(),
                    source,
                });
            }
            Err(MoveFailure::Delete(source)) => {
                // Source still in place, drop the copy so only one exists
                let copy = destination(&record.original_path, prefix);
                if let Err(e) = self.retry.run("delete", || self.store.delete(&copy)).await {
                    tracing::warn!(image_id = %record.id, path = %copy, error = %e, "Stray copy of original left behind");
                }
                return Err(RelocationError::Store {
                    op: "delete",
                    path: record.original_path.clone(),
                    source,
                });
            }
        };
        note_move(&mut moved, &record.original_path, &original_path);

        let thumb_small_path = match self.move_preview(&record.thumb_small_path, prefix).await {
            Ok(path) => path,
            Err(e) => return Err(self.roll_back(record, raw.as_deref(), &related, moved, e).await),
        };
        note_move(&mut moved, &record.thumb_small_path, &thumb_small_path);

        let thumb_large_path = match self.move_preview(&record.thumb_large_path, prefix).await {
            Ok(path) => path,
            Err(e) => return Err(self.roll_back(record, raw.as_deref(), &related, moved, e).await),
        };

        let raw_sidecar_path = match raw {
            Some(path) => Some(self.move_companion(&record.id, &path, prefix).await),
            None => None,
        };
        let mut related_paths = Vec::with_capacity(related.len());
        for path in &related {
            related_paths.push(self.move_companion(&record.id, path, prefix).await);
        }

        tracing::debug!(
            image_id = %record.id,
            destination = %prefix,
            related = related_paths.len(),
            has_raw = raw_sidecar_path.is_some(),
            "Relocation finished"
        );

        Ok(RelocatedPaths {
            original_path,
            thumb_small_path,
            thumb_large_path,
            raw_sidecar_path,
            related_paths,
        })
    }

    /// Put already-moved files back where the record says they are.
    ///
    /// Returns `cause` when everything went back, `Incomplete` otherwise.
    /// Companions have not moved yet, so `Incomplete` reports them where
    /// discovery found them.
    async fn roll_back(
        &self,
        record: &ImageRecord,
        raw: Option<&str>,
        related: &[String],
        moved: Vec<Moved>,
        cause: RelocationError,
    ) -> RelocationError {
        let mut stuck = Vec::new();
        for m in moved.into_iter().rev() {
            if let Err(e) = self.retry.run("copy", || self.store.copy(&m.to, &m.from)).await {
                tracing::error!(image_id = %record.id, path = %m.to, error = %e, "Could not move file back");
                stuck.push(m);
                continue;
            }
            if let Err(e) = self.retry.run("delete", || self.store.delete(&m.to)).await {
                tracing::warn!(image_id = %record.id, path = %m.to, error = %e, "Stray copy left after moving file back");
            }
        }

        if stuck.is_empty() {
            tracing::info!(image_id = %record.id, error = %cause, "Relocation rolled back");
            return cause;
        }
        RelocationError::Incomplete {
            paths: RelocatedPaths {
                original_path: record.original_path.clone(),
                thumb_small_path: record.thumb_small_path.clone(),
                thumb_large_path: record.thumb_large_path.clone(),
                raw_sidecar_path: raw.map(str::to_owned),
                related_paths: related.to_vec(),
            }
            .with_moves(&stuck),
            source: Box::new(cause),
        }
    }

    /// RAW and sidecars: whatever the record already knows plus what the
    /// listings of the original's folder and of the destination turn up.
    ///
    /// The destination counts for a redelivery whose earlier run already
    /// moved the companions but never recorded them. The first path seen
    /// for a file name wins.
    async fn companions(&self, record: &ImageRecord, prefix: &str) -> (Option<String>, Vec<String>) {
        let folder = parent_folder(&record.original_path);
        let mut found = self.discover(record, folder).await;
        if prefix != folder {
            let at_destination = self.discover(record, prefix).await;
            found.raw = found.raw.or(at_destination.raw);
            found.related.extend(at_destination.related);
        }

        let raw = record.raw_sidecar_path.clone().or(found.raw);
        let mut related = record.related_paths.clone();
        for path in found.related {
            if !related.iter().any(|p| file_name(p) == file_name(&path)) {
                related.push(path);
            }
        }
        (raw, related)
    }

    async fn discover(&self, record: &ImageRecord, folder: &str) -> Companions {
        // Listing the bucket root would walk every top-level key
        if folder.is_empty() {
            tracing::debug!(image_id = %record.id, "Object at bucket root, sidecar discovery skipped");
            return Companions::default();
        }
        let listing = self
            .retry
            .run("list", || self.store.list(folder))
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(image_id = %record.id, folder, error = %e, "Sidecar discovery failed, using recorded paths");
                Vec::new()
            });
        find_companions(&record.original_path, listing.iter().map(String::as_str))
    }

    async fn move_object(&self, from: &str, prefix: &str) -> Result<String, MoveFailure> {
        let to = destination(from, prefix);
        if from == to {
            return Ok(to);
        }

        match self.retry.run("copy", || self.store.copy(from, &to)).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                // A previous delivery may already have moved it
                return match self.retry.run("exists", || self.store.exists(&to)).await {
                    Ok(true) => Ok(to),
                    Ok(false) => Err(MoveFailure::Missing),
                    Err(e) => Err(MoveFailure::Copy(e)),
                };
            }
            Err(e) => return Err(MoveFailure::Copy(e)),
        }

        self.retry
            .run("delete", || self.store.delete(from))
            .await
            .map_err(MoveFailure::Delete)?;
        Ok(to)
    }

    /// Previews must move; a leftover source after a good copy is tolerated
    async fn move_preview(&self, from: &str, prefix: &str) -> Result<String, RelocationError> {
        match self.move_object(from, prefix).await {
            Ok(path) => Ok(path),
            Err(MoveFailure::Missing) => Err(RelocationError::Store {
                op: "copy",
                path: from.to_string(),
                source: StoreError::NotFound {
                    path: from.to_string(),
                },
            }),
            Err(MoveFailure::Copy(source)) => Err(RelocationError::Store {
                op: "copy",
                path: from.to_string(),
                source,
            }),
            Err(MoveFailure::Delete(e)) => {
                tracing::warn!(path = from, error = %e, "Preview copied but source not deleted");
                Ok(destination(from, prefix))
            }
        }
    }

    /// Best effort: a companion that cannot move keeps its old path
    async fn move_companion(&self, image_id: &str, from: &str, prefix: &str) -> String {
        match self.move_object(from, prefix).await {
            Ok(path) => path,
            Err(MoveFailure::Delete(e)) => {
                tracing::warn!(image_id, path = from, error = %e, "Sidecar copied but source not deleted");
                destination(from, prefix)
            }
            Err(MoveFailure::Missing) => {
                tracing::warn!(image_id, path = from, "Sidecar missing, skipped");
                from.to_string()
            }
            Err(MoveFailure::Copy(e)) => {
                tracing::warn!(image_id, path = from, error = %e, "Sidecar copy failed, skipped");
                from.to_string()
            }
        }
    }
}

fn destination(from: &str, prefix: &str) -> String {
    format!("{prefix}/{}", file_name(from))
}

fn note_move(moved: &mut Vec<Moved>, from: &str, to: &str) {
    if from != to {
        moved.push(Moved {
            from: from.to_string(),
            to: to.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryContentStore, StoreOp};

    fn seeded() -> (MemoryContentStore, ImageRecord) {
        let store = MemoryContentStore::new("photos");
        for key in [
            "new/2024/03/02/IMG_1.jpg",
            "new/2024/03/02/IMG_1_s.jpg",
            "new/2024/03/02/IMG_1_l.jpg",
            "new/2024/03/02/IMG_1.CR2",
            "new/2024/03/02/IMG_1.xmp",
            "new/2024/03/02/IMG_2.jpg",
        ] {
            store.put(key, key.as_bytes().to_vec());
        }
        let record = ImageRecord::new_ingested(
            "img-1",
            "new/2024/03/02/IMG_1.jpg",
            "new/2024/03/02/IMG_1_s.jpg",
            "new/2024/03/02/IMG_1_l.jpg",
            0,
        );
        (store, record)
    }

    fn policy() -> RetryPolicy {
        RetryPolicy::exponential(
            "test",
            3,
            std::time::Duration::from_millis(1),
            std::time::Duration::from_millis(2),
        )
    }

    #[tokio::test]
    async fn test_moves_everything() {
        let (store, record) = seeded();
        let retry = policy();
        let engine = RelocationEngine::new(&store, &retry);

        let paths = engine
            .relocate(&record, "approved/blue/2024/03/02/")
            .await
            .unwrap();

        assert_eq!(paths.original_path, "approved/blue/2024/03/02/IMG_1.jpg");
        assert_eq!(
            paths.raw_sidecar_path.as_deref(),
            Some("approved/blue/2024/03/02/IMG_1.CR2")
        );
        assert_eq!(paths.related_paths, vec!["approved/blue/2024/03/02/IMG_1.xmp"]);
        assert_eq!(
            store.keys(),
            vec![
                "approved/blue/2024/03/02/IMG_1.CR2",
                "approved/blue/2024/03/02/IMG_1.jpg",
                "approved/blue/2024/03/02/IMG_1.xmp",
                "approved/blue/2024/03/02/IMG_1_l.jpg",
                "approved/blue/2024/03/02/IMG_1_s.jpg",
                "new/2024/03/02/IMG_2.jpg",
            ]
        );
    }

    #[tokio::test]
    async fn test_same_prefix_is_noop() {
        let (store, record) = seeded();
        let retry = policy();
        let engine = RelocationEngine::new(&store, &retry);

        engine.relocate(&record, "new/2024/03/02").await.unwrap();
        assert_eq!(store.copy_count(), 0);
        assert_eq!(store.delete_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_original() {
        let store = MemoryContentStore::new("photos");
        let record = ImageRecord::new_ingested("img-1", "new/a.jpg", "new/a_s.jpg", "new/a_l.jpg", 0);
        let retry = policy();
        let engine = RelocationEngine::new(&store, &retry);

        let err = engine.relocate(&record, "deleted/2024/01/01").await.unwrap_err();
        assert!(matches!(err, RelocationError::SourceMissing { .. }));
    }

    #[tokio::test]
    async fn test_already_moved_original_is_not_missing() {
        let (store, record) = seeded();
        store
            .copy("new/2024/03/02/IMG_1.jpg", "deleted/2024/03/02/IMG_1.jpg")
            .await
            .unwrap();
        store.delete("new/2024/03/02/IMG_1.jpg").await.unwrap();

        let retry = policy();
        let engine = RelocationEngine::new(&store, &retry);
        let paths = engine.relocate(&record, "deleted/2024/03/02").await.unwrap();
        assert_eq!(paths.original_path, "deleted/2024/03/02/IMG_1.jpg");
        assert!(store.contains("deleted/2024/03/02/IMG_1_s.jpg"));
    }

    #[tokio::test]
    async fn test_sidecar_failure_keeps_old_path() {
        let (store, record) = seeded();
        store.fail(
            StoreOp::Copy,
            Some(".xmp"),
            StoreError::Fatal("access denied".into()),
            None,
        );
        let retry = policy();
        let engine = RelocationEngine::new(&store, &retry);

        let paths = engine.relocate(&record, "rejected/2024/03/02").await.unwrap();
        assert_eq!(paths.related_paths, vec!["new/2024/03/02/IMG_1.xmp"]);
        assert_eq!(paths.original_path, "rejected/2024/03/02/IMG_1.jpg");
    }

    #[tokio::test]
    async fn test_original_delete_failure_fails() {
        let (store, record) = seeded();
        store.fail(
            StoreOp::Delete,
            Some("new/2024/03/02/IMG_1.jpg"),
            StoreError::Fatal("access denied".into()),
            None,
        );
        let retry = policy();
        let engine = RelocationEngine::new(&store, &retry);

        let err = engine.relocate(&record, "rejected/2024/03/02").await.unwrap_err();
        assert!(matches!(err, RelocationError::Store { op: "delete", .. }));
        assert!(store.contains("new/2024/03/02/IMG_1.jpg"));
        assert!(!store.contains("rejected/2024/03/02/IMG_1.jpg"));
    }

    #[tokio::test]
    async fn test_preview_failure_puts_original_back() {
        let (store, record) = seeded();
        let before = store.keys();
        store.fail(
            StoreOp::Copy,
            Some("IMG_1_l.jpg"),
            StoreError::Fatal("access denied".into()),
            None,
        );
        let retry = policy();
        let engine = RelocationEngine::new(&store, &retry);

        let err = engine.relocate(&record, "approved/blue/2024/03/02").await.unwrap_err();
        assert!(matches!(err, RelocationError::Store { op: "copy", .. }));
        // Original and small preview moved, then went back
        assert_eq!(store.keys(), before);
    }

    #[tokio::test]
    async fn test_failed_move_back_reports_real_paths() {
        let (store, record) = seeded();
        store.fail(
            StoreOp::Copy,
            Some("IMG_1_l.jpg"),
            StoreError::Fatal("access denied".into()),
            None,
        );
        store.fail(
            StoreOp::Copy,
            Some("approved/blue/2024/03/02/IMG_1.jpg"),
            StoreError::Fatal("access denied".into()),
            None,
        );
        let retry = policy();
        let engine = RelocationEngine::new(&store, &retry);

        let err = engine.relocate(&record, "approved/blue/2024/03/02").await.unwrap_err();
        let (paths, source) = match err {
            RelocationError::Incomplete { paths, source } => (paths, source),
            other => panic!("expected Incomplete, got {other:?}"),
        };
        assert!(matches!(*source, RelocationError::Store { op: "copy", .. }));
        assert_eq!(paths.original_path, "approved/blue/2024/03/02/IMG_1.jpg");
        assert_eq!(paths.thumb_small_path, "new/2024/03/02/IMG_1_s.jpg");
        assert_eq!(paths.thumb_large_path, "new/2024/03/02/IMG_1_l.jpg");
        assert_eq!(paths.raw_sidecar_path.as_deref(), Some("new/2024/03/02/IMG_1.CR2"));
        for path in [&paths.original_path, &paths.thumb_small_path, &paths.thumb_large_path] {
            assert!(store.contains(path), "{path} should exist");
        }
    }

    #[tokio::test]
    async fn test_companions_found_at_destination() {
        let (store, record) = seeded();
        for name in ["IMG_1.CR2", "IMG_1.xmp"] {
            let from = format!("new/2024/03/02/{name}");
            store
                .copy(&from, &format!("approved/blue/2024/03/02/{name}"))
                .await
                .unwrap();
            store.delete(&from).await.unwrap();
        }
        let retry = policy();
        let engine = RelocationEngine::new(&store, &retry);

        let paths = engine
            .relocate(&record, "approved/blue/2024/03/02")
            .await
            .unwrap();
        assert_eq!(
            paths.raw_sidecar_path.as_deref(),
            Some("approved/blue/2024/03/02/IMG_1.CR2")
        );
        assert_eq!(paths.related_paths, vec!["approved/blue/2024/03/02/IMG_1.xmp"]);
    }

    #[tokio::test]
    async fn test_root_level_original_skips_root_listing() {
        let store = MemoryContentStore::new("photos");
        for key in ["IMG_9.jpg", "IMG_9_s.jpg", "IMG_9_l.jpg", "IMG_9.CR2"] {
            store.put(key, key.as_bytes().to_vec());
        }
        let record = ImageRecord::new_ingested("img-9", "IMG_9.jpg", "IMG_9_s.jpg", "IMG_9_l.jpg", 0);
        let retry = policy();
        let engine = RelocationEngine::new(&store, &retry);

        let paths = engine.relocate(&record, "deleted/2024/03/02").await.unwrap();
        assert_eq!(paths.original_path, "deleted/2024/03/02/IMG_9.jpg");
        assert_eq!(paths.raw_sidecar_path, None);
        // Only the destination folder was listed
        assert_eq!(store.list_count(), 1);
        assert!(store.contains("IMG_9.CR2"));
    }

    #[tokio::test]
    async fn test_preview_delete_failure_tolerated() {
        let (store, record) = seeded();
        store.fail(
            StoreOp::Delete,
            Some("IMG_1_s.jpg"),
            StoreError::Fatal("access denied".into()),
            None,
        );
        let retry = policy();
        let engine = RelocationEngine::new(&store, &retry);

        let paths = engine.relocate(&record, "rejected/2024/03/02").await.unwrap();
        assert_eq!(paths.thumb_small_path, "rejected/2024/03/02/IMG_1_s.jpg");
    }
}
