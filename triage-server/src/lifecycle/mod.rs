//! Image lifecycle: the status state machine and the transition handlers

mod date;
mod plan;
mod service;

pub use date::{capture_date, date_path};
pub use plan::{Transition, TransitionError, TransitionPlan, color_name, plan_transition};
pub use service::{assign_project, delete_image, get_image, undelete_image, update_image};
