//! Status state machine
//!
//! ```text
//! new ──(color>0)──▶ approved ──▶ project
//!  │                 │  ▲ recolor
//!  ├──(color=0)──▶ rejected ◀┘(in place only)
//!  │                 │
//!  └──────┬──────────┘
//!         ▼
//!      deleted ──(undelete)──▶ new
//! ```
//!
//! Planning is pure: it validates the request against the current record
//! and derives the target status and destination prefix. Nothing is written.

use chrono::{DateTime, Utc};
use shared::models::{ImageRecord, ImageStatus, Project};
use thiserror::Error;

use super::date::{capture_date, date_path};

/// Color labels by group number
const COLOR_NAMES: [&str; 5] = ["red", "blue", "green", "yellow", "purple"];

pub fn color_name(color_group: i32) -> Option<&'static str> {
    usize::try_from(color_group)
        .ok()
        .and_then(|g| g.checked_sub(1))
        .and_then(|idx| COLOR_NAMES.get(idx).copied())
}

/// A requested lifecycle change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Approve with a color group, or reject with group 0
    Decide { color_group: i32 },
    Delete,
    Undelete,
    AssignProject { project_id: String },
}

impl Transition {
    fn action(&self) -> &'static str {
        match self {
            Transition::Decide { color_group: 0 } => "reject",
            Transition::Decide { .. } => "approve",
            Transition::Delete => "delete",
            Transition::Undelete => "undelete",
            Transition::AssignProject { .. } => "assign_project",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("cannot {action} an image in status {from}")]
    InvalidTransition {
        from: ImageStatus,
        action: &'static str,
    },
    #[error("invalid color group {0}: expected 0..=5")]
    InvalidColorGroup(i32),
    #[error("project {0} is archived")]
    ProjectArchived(String),
    #[error("project {0} does not match the requested assignment")]
    ProjectMismatch(String),
}

/// Outcome of planning a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionPlan {
    pub target_status: ImageStatus,
    /// Folder the files move to, without trailing slash
    pub destination_prefix: String,
    /// Set on completion for project assignments
    pub project_id: Option<String>,
}

/// Validate `transition` for `record` and derive where its files go.
///
/// `project` must be the looked-up project for `AssignProject` and is
/// ignored otherwise.
pub fn plan_transition(
    record: &ImageRecord,
    transition: &Transition,
    project: Option<&Project>,
    now: DateTime<Utc>,
) -> Result<TransitionPlan, TransitionError> {
    use ImageStatus::{Approved, Deleted, New, Rejected};

    let from = record.status;
    let invalid = || TransitionError::InvalidTransition {
        from,
        action: transition.action(),
    };
    let date = date_path(capture_date(record, now));

    match transition {
        Transition::Decide { color_group } => {
            let color_group = *color_group;
            if color_group < 0 {
                return Err(TransitionError::InvalidColorGroup(color_group));
            }
            if color_group == 0 {
                if !matches!(from, New | Rejected) {
                    return Err(invalid());
                }
                return Ok(TransitionPlan {
                    target_status: Rejected,
                    destination_prefix: format!("rejected/{date}"),
                    project_id: None,
                });
            }
            let color = color_name(color_group)
                .ok_or(TransitionError::InvalidColorGroup(color_group))?;
            if !matches!(from, New | Approved) {
                return Err(invalid());
            }
            Ok(TransitionPlan {
                target_status: Approved,
                destination_prefix: format!("approved/{color}/{date}"),
                project_id: None,
            })
        }
        Transition::Delete => {
            if !matches!(from, New | Approved | Rejected) {
                return Err(invalid());
            }
            Ok(TransitionPlan {
                target_status: Deleted,
                destination_prefix: format!("deleted/{date}"),
                project_id: None,
            })
        }
        Transition::Undelete => {
            if from != Deleted {
                return Err(invalid());
            }
            Ok(TransitionPlan {
                target_status: New,
                destination_prefix: format!("new/{date}"),
                project_id: None,
            })
        }
        Transition::AssignProject { project_id } => {
            if from != Approved {
                return Err(invalid());
            }
            let project = project
                .filter(|p| &p.id == project_id)
                .ok_or_else(|| TransitionError::ProjectMismatch(project_id.clone()))?;
            if project.archived {
                return Err(TransitionError::ProjectArchived(project.id.clone()));
            }
            Ok(TransitionPlan {
                target_status: ImageStatus::Project,
                destination_prefix: format!("projects/{}/{date}", project.storage_prefix),
                project_id: Some(project.id.clone()),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap()
    }

    fn record(status: ImageStatus) -> ImageRecord {
        let mut r = ImageRecord::new_ingested(
            "img-1",
            "new/2024/03/02/IMG_1.jpg",
            "new/2024/03/02/IMG_1_s.jpg",
            "new/2024/03/02/IMG_1_l.jpg",
            0,
        );
        r.status = status;
        r.exif
            .insert("DateTimeOriginal".into(), "2024:03:02 09:00:00".into());
        r
    }

    fn project(archived: bool) -> Project {
        Project {
            id: "p1".into(),
            name: "Summer Trip".into(),
            storage_prefix: "summer_trip".into(),
            image_count: 0,
            keywords: vec![],
            archived,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn test_color_names() {
        assert_eq!(color_name(1), Some("red"));
        assert_eq!(color_name(2), Some("blue"));
        assert_eq!(color_name(5), Some("purple"));
        assert_eq!(color_name(0), None);
        assert_eq!(color_name(6), None);
        assert_eq!(color_name(-1), None);
    }

    #[test]
    fn test_approve_blue() {
        let plan = plan_transition(
            &record(ImageStatus::New),
            &Transition::Decide { color_group: 2 },
            None,
            now(),
        )
        .unwrap();
        assert_eq!(plan.target_status, ImageStatus::Approved);
        assert_eq!(plan.destination_prefix, "approved/blue/2024/03/02");
    }

    #[test]
    fn test_color_zero_rejects() {
        let plan = plan_transition(
            &record(ImageStatus::New),
            &Transition::Decide { color_group: 0 },
            None,
            now(),
        )
        .unwrap();
        assert_eq!(plan.target_status, ImageStatus::Rejected);
        assert_eq!(plan.destination_prefix, "rejected/2024/03/02");
    }

    #[test]
    fn test_unknown_color_is_validation_error() {
        let err = plan_transition(
            &record(ImageStatus::New),
            &Transition::Decide { color_group: 9 },
            None,
            now(),
        )
        .unwrap_err();
        assert_eq!(err, TransitionError::InvalidColorGroup(9));
    }

    #[test]
    fn test_recolor_in_place() {
        let plan = plan_transition(
            &record(ImageStatus::Approved),
            &Transition::Decide { color_group: 3 },
            None,
            now(),
        )
        .unwrap();
        assert_eq!(plan.destination_prefix, "approved/green/2024/03/02");
    }

    #[test]
    fn test_illegal_transitions() {
        let cases = [
            (ImageStatus::Approved, Transition::Decide { color_group: 0 }),
            (ImageStatus::Rejected, Transition::Decide { color_group: 1 }),
            (ImageStatus::Deleted, Transition::Decide { color_group: 1 }),
            (ImageStatus::Deleted, Transition::Delete),
            (ImageStatus::Project, Transition::Delete),
            (ImageStatus::New, Transition::Undelete),
            (
                ImageStatus::New,
                Transition::AssignProject {
                    project_id: "p1".into(),
                },
            ),
        ];
        for (status, transition) in cases {
            let result = plan_transition(&record(status), &transition, Some(&project(false)), now());
            assert!(
                matches!(result, Err(TransitionError::InvalidTransition { .. })),
                "{status} / {transition:?}"
            );
        }
    }

    #[test]
    fn test_delete_and_undelete() {
        let deleted = plan_transition(&record(ImageStatus::Rejected), &Transition::Delete, None, now())
            .unwrap();
        assert_eq!(deleted.destination_prefix, "deleted/2024/03/02");

        let restored =
            plan_transition(&record(ImageStatus::Deleted), &Transition::Undelete, None, now())
                .unwrap();
        assert_eq!(restored.target_status, ImageStatus::New);
        assert_eq!(restored.destination_prefix, "new/2024/03/02");
    }

    #[test]
    fn test_assign_project() {
        let assign = Transition::AssignProject {
            project_id: "p1".into(),
        };
        let plan = plan_transition(
            &record(ImageStatus::Approved),
            &assign,
            Some(&project(false)),
            now(),
        )
        .unwrap();
        assert_eq!(plan.target_status, ImageStatus::Project);
        assert_eq!(plan.destination_prefix, "projects/summer_trip/2024/03/02");
        assert_eq!(plan.project_id.as_deref(), Some("p1"));

        let err = plan_transition(
            &record(ImageStatus::Approved),
            &assign,
            Some(&project(true)),
            now(),
        )
        .unwrap_err();
        assert_eq!(err, TransitionError::ProjectArchived("p1".into()));
    }
}
