//! Relocation queue

use shared::models::relocation::DispatchPayload;
use thiserror::Error;
use tokio::sync::mpsc;

/// One delivery of a payload; `attempt` starts at 1
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub payload: DispatchPayload,
    pub attempt: u32,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("relocation queue is full")]
    QueueFull,
    #[error("relocation queue is closed")]
    Closed,
}

/// Sending half of the relocation queue
#[derive(Debug, Clone)]
pub struct Dispatcher {
    tx: mpsc::Sender<Delivery>,
}

impl Dispatcher {
    /// Bounded queue; the receiver goes to the relocation worker
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Delivery>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Hand a payload to the worker without waiting
    pub fn dispatch(&self, payload: DispatchPayload) -> Result<(), DispatchError> {
        self.tx
            .try_send(Delivery {
                payload,
                attempt: 1,
            })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => DispatchError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => DispatchError::Closed,
            })
    }

    /// Put a failed delivery back, waiting for room if needed
    pub async fn redeliver(&self, delivery: Delivery) -> Result<(), DispatchError> {
        self.tx
            .send(Delivery {
                attempt: delivery.attempt + 1,
                ..delivery
            })
            .await
            .map_err(|_| DispatchError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::{ImageStatus, RelocationRequest};

    fn payload() -> DispatchPayload {
        DispatchPayload::MoveFiles(RelocationRequest {
            image_id: "img-1".into(),
            destination_prefix: "deleted/2024/03/02".into(),
            target_status: ImageStatus::Deleted,
            store_location: "photos".into(),
            project_id: None,
        })
    }

    #[tokio::test]
    async fn test_full_queue_rejects() {
        let (dispatcher, mut rx) = Dispatcher::channel(1);
        dispatcher.dispatch(payload()).unwrap();
        assert_eq!(dispatcher.dispatch(payload()), Err(DispatchError::QueueFull));

        let delivery = rx.recv().await.unwrap();
        assert_eq!(delivery.attempt, 1);

        dispatcher.redeliver(delivery).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().attempt, 2);
    }

    #[tokio::test]
    async fn test_closed_queue() {
        let (dispatcher, rx) = Dispatcher::channel(4);
        drop(rx);
        assert_eq!(dispatcher.dispatch(payload()), Err(DispatchError::Closed));
    }
}
