//! Asynchronous relocation dispatch
//!
//! Transition handlers enqueue a [`DispatchPayload`](shared::models::relocation::DispatchPayload)
//! and return; [`RelocationWorker`] consumes the queue and calls
//! [`handle_payload`], the same handler a synchronous caller would use.
//! Delivery is at-least-once.

mod handler;
mod queue;
mod worker;

pub use handler::{RelocationOutcome, handle_payload};
pub use queue::{Delivery, DispatchError, Dispatcher};
pub use worker::RelocationWorker;
