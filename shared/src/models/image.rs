//! Image Record Model

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of an image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageStatus {
    /// Ingested, not yet decided
    New,
    /// Approved with a color group
    Approved,
    /// Rejected (color group 0)
    Rejected,
    /// Soft-deleted
    Deleted,
    /// Assigned to a project
    Project,
}

impl ImageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageStatus::New => "new",
            ImageStatus::Approved => "approved",
            ImageStatus::Rejected => "rejected",
            ImageStatus::Deleted => "deleted",
            ImageStatus::Project => "project",
        }
    }
}

impl fmt::Display for ImageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ImageStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(ImageStatus::New),
            "approved" => Ok(ImageStatus::Approved),
            "rejected" => Ok(ImageStatus::Rejected),
            "deleted" => Ok(ImageStatus::Deleted),
            "project" => Ok(ImageStatus::Project),
            other => Err(format!("unknown image status: {other}")),
        }
    }
}

/// Progress of the file move that accompanies a status transition
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelocationState {
    #[default]
    None,
    Pending,
    Moving,
    Complete,
    Failed,
}

impl RelocationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelocationState::None => "none",
            RelocationState::Pending => "pending",
            RelocationState::Moving => "moving",
            RelocationState::Complete => "complete",
            RelocationState::Failed => "failed",
        }
    }

    /// A relocation has been accepted and has not reached a terminal state
    pub fn is_in_flight(&self) -> bool {
        matches!(self, RelocationState::Pending | RelocationState::Moving)
    }
}

impl fmt::Display for RelocationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RelocationState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(RelocationState::None),
            "pending" => Ok(RelocationState::Pending),
            "moving" => Ok(RelocationState::Moving),
            "complete" => Ok(RelocationState::Complete),
            "failed" => Ok(RelocationState::Failed),
            other => Err(format!("unknown relocation state: {other}")),
        }
    }
}

/// One photograph and the content-store keys of all its files.
///
/// Paths are only guaranteed to resolve once `relocation_state` is
/// `complete` (or `none` for a freshly ingested record).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: String,
    pub original_path: String,
    pub thumb_small_path: String,
    pub thumb_large_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_sidecar_path: Option<String>,
    #[serde(default)]
    pub related_paths: Vec<String>,
    pub status: ImageStatus,
    #[serde(default)]
    pub relocation_state: RelocationState,
    /// Why the last relocation failed, for operator inspection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relocation_error: Option<String>,
    #[serde(with = "crate::util::bool_string")]
    pub reviewed: bool,
    /// 0 = no group / rejected
    #[serde(default)]
    pub color_group: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default)]
    pub rating: i32,
    #[serde(default)]
    pub promoted: bool,
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Written by enrichment; empty means none
    #[serde(default)]
    pub description: String,
    /// Capture metadata extracted at ingest (DateTimeOriginal, DateTime, ...)
    #[serde(default)]
    pub exif: BTreeMap<String, String>,
    pub inserted_at: i64,
    pub updated_at: i64,
    /// Bumped on every write, used for compare-and-swap
    #[serde(default)]
    pub revision: i64,
}

impl ImageRecord {
    /// Fresh record as produced by the ingest pipeline
    pub fn new_ingested(
        id: impl Into<String>,
        original_path: impl Into<String>,
        thumb_small_path: impl Into<String>,
        thumb_large_path: impl Into<String>,
        inserted_at: i64,
    ) -> Self {
        Self {
            id: id.into(),
            original_path: original_path.into(),
            thumb_small_path: thumb_small_path.into(),
            thumb_large_path: thumb_large_path.into(),
            raw_sidecar_path: None,
            related_paths: Vec::new(),
            status: ImageStatus::New,
            relocation_state: RelocationState::None,
            relocation_error: None,
            reviewed: false,
            color_group: 0,
            project_id: None,
            rating: 0,
            promoted: false,
            keywords: Vec::new(),
            description: String::new(),
            exif: BTreeMap::new(),
            inserted_at,
            updated_at: inserted_at,
            revision: 0,
        }
    }

    /// Every content-store key this record currently points at
    pub fn all_paths(&self) -> Vec<&str> {
        let mut paths = vec![
            self.original_path.as_str(),
            self.thumb_small_path.as_str(),
            self.thumb_large_path.as_str(),
        ];
        if let Some(raw) = &self.raw_sidecar_path {
            paths.push(raw.as_str());
        }
        paths.extend(self.related_paths.iter().map(String::as_str));
        paths
    }

    /// True when the original and both previews live directly under `prefix`
    pub fn is_located_at(&self, prefix: &str) -> bool {
        let prefix = prefix.trim_end_matches('/');
        [
            &self.original_path,
            &self.thumb_small_path,
            &self.thumb_large_path,
        ]
        .iter()
        .all(|p| parent_folder(p) == prefix)
    }
}

/// Folder part of a content-store key (`a/b/c.jpg` -> `a/b`)
pub fn parent_folder(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

/// File part of a content-store key (`a/b/c.jpg` -> `c.jpg`)
pub fn file_name(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// Update-record request body
///
/// Any subset of fields may be sent. A `color_group` change is a status
/// transition and triggers a relocation; the other fields are plain edits.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_group: Option<i32>,
    #[serde(
        default,
        deserialize_with = "crate::util::bool_string::deserialize_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub reviewed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promoted: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Vec<String>>,
}

impl ImageUpdate {
    pub fn is_empty(&self) -> bool {
        self.color_group.is_none()
            && self.reviewed.is_none()
            && self.rating.is_none()
            && self.promoted.is_none()
            && self.keywords.is_none()
    }
}

/// Assign-to-project request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignProjectRequest {
    pub project_id: String,
}

/// Acknowledgment returned by every transition endpoint.
///
/// Poll the image until `relocation_state` is `complete` or `failed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionAck {
    pub image_id: String,
    pub relocation_state: RelocationState,
    /// False when the request only edited fields and no move was needed
    pub dispatched: bool,
}
