//! Process-level plumbing

pub mod tasks;

pub use tasks::BackgroundTasks;
