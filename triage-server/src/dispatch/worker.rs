//! Relocation worker pool
//!
//! Consumes the relocation queue and runs up to `workers` handlers at once.
//! A delivery whose outcome could not be recorded is put back on the queue
//! after an exponential delay, up to `max_deliveries` deliveries in total.
//! Stops taking deliveries on shutdown and waits for running handlers.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Semaphore, mpsc};
use tokio_util::sync::CancellationToken;

use super::handler::handle_payload;
use super::queue::Delivery;
use crate::state::AppState;

const MAX_WORKERS: usize = 1024;
const REDELIVERY_BASE_DELAY: Duration = Duration::from_secs(1);
const REDELIVERY_MAX_DELAY: Duration = Duration::from_secs(30);

pub struct RelocationWorker {
    state: AppState,
    slots: Arc<Semaphore>,
    workers: u32,
    max_deliveries: u32,
}

impl RelocationWorker {
    pub fn new(state: AppState) -> Self {
        let workers = state.relocation.workers.clamp(1, MAX_WORKERS) as u32;
        let max_deliveries = state.relocation.max_deliveries.max(1);
        Self {
            state,
            slots: Arc::new(Semaphore::new(workers as usize)),
            workers,
            max_deliveries,
        }
    }

    /// Delay before redelivering after `attempt` failed deliveries
    fn redelivery_delay(attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        REDELIVERY_BASE_DELAY
            .saturating_mul(factor)
            .min(REDELIVERY_MAX_DELAY)
    }

    /// Run until the queue closes or `shutdown` fires
    pub async fn run(self, mut rx: mpsc::Receiver<Delivery>, shutdown: CancellationToken) {
        tracing::info!(
            workers = self.workers,
            max_deliveries = self.max_deliveries,
            "Relocation worker started"
        );

        loop {
            let delivery = tokio::select! {
                _ = shutdown.cancelled() => break,
                next = rx.recv() => match next {
                    Some(delivery) => delivery,
                    None => break,
                },
            };

            let permit = tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::warn!(image_id = %delivery.payload.image_id(), "Shutdown with delivery pending, dropped");
                    break;
                }
                permit = self.slots.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let state = self.state.clone();
            let max_deliveries = self.max_deliveries;
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                let retry = process(&state, delivery, max_deliveries).await;
                // Free the slot before waiting to redeliver
                drop(permit);
                if let Some(delivery) = retry {
                    redeliver_later(&state, delivery, &shutdown).await;
                }
            });
        }

        // Wait for running handlers to finish
        match self.slots.acquire_many(self.workers).await {
            Ok(_all) => tracing::info!("Relocation worker stopped"),
            Err(e) => tracing::warn!(error = %e, "Worker slots closed, running handlers not awaited"),
        }
    }
}

/// Handle one delivery; returns it back when it should be redelivered
async fn process(state: &AppState, delivery: Delivery, max_deliveries: u32) -> Option<Delivery> {
    let image_id = delivery.payload.image_id();
    match handle_payload(state, &delivery.payload).await {
        Ok(outcome) => {
            tracing::debug!(image_id = %image_id, attempt = delivery.attempt, ?outcome, "Delivery handled");
            None
        }
        Err(e) if delivery.attempt < max_deliveries => {
            tracing::warn!(
                image_id = %image_id,
                attempt = delivery.attempt,
                error = %e,
                "Could not record relocation outcome, redelivering"
            );
            Some(delivery)
        }
        Err(e) => {
            tracing::error!(
                image_id = %image_id,
                attempts = delivery.attempt,
                error = %e,
                "Relocation delivery exhausted, giving up"
            );
            None
        }
    }
}

async fn redeliver_later(state: &AppState, delivery: Delivery, shutdown: &CancellationToken) {
    let delay = RelocationWorker::redelivery_delay(delivery.attempt);
    tokio::select! {
        _ = shutdown.cancelled() => {
            tracing::warn!(image_id = %delivery.payload.image_id(), "Shutdown before redelivery, dropped");
            return;
        }
        _ = tokio::time::sleep(delay) => {}
    }
    let image_id = delivery.payload.image_id().to_string();
    if let Err(e) = state.dispatcher.redeliver(delivery).await {
        tracing::error!(image_id = %image_id, error = %e, "Redelivery failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redelivery_delay() {
        assert_eq!(RelocationWorker::redelivery_delay(1), Duration::from_secs(1));
        assert_eq!(RelocationWorker::redelivery_delay(2), Duration::from_secs(2));
        assert_eq!(RelocationWorker::redelivery_delay(3), Duration::from_secs(4));
        assert_eq!(RelocationWorker::redelivery_delay(20), REDELIVERY_MAX_DELAY);
    }

    #[tokio::test]
    async fn test_stops_when_slots_closed() {
        let content = Arc::new(crate::store::MemoryContentStore::new("photos"));
        let metadata = Arc::new(crate::db::MemoryMetadataStore::new());
        let (state, rx) = AppState::from_parts(
            content,
            metadata,
            None,
            crate::config::RelocationConfig::default(),
        );
        let worker = RelocationWorker::new(state);
        worker.slots.close();
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        tokio::time::timeout(Duration::from_secs(1), worker.run(rx, shutdown))
            .await
            .expect("worker returns with closed slots");
    }
}
