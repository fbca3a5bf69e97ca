use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::services::notifications::{NotificationKind, NotificationService};

/// Events emitted by the settlement pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    OrderCreated {
        order_id: Uuid,
    },
    /// Settlement reached its terminal success state. Emitted exactly once
    /// per order by the status-guarded finalize.
    OrderConfirmed {
        order_id: Uuid,
    },
    PaymentFailed {
        order_id: Uuid,
    },
    PaymentRefunded {
        order_id: Uuid,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event. Delivery failure is logged, not surfaced: the
    /// settlement outcome is already committed by the time events fire.
    pub async fn send(&self, event: Event) {
        if let Err(e) = self.sender.send(event).await {
            tracing::error!("Failed to enqueue event: {}", e);
        }
    }
}

/// Event processor loop. Owns the notification dispatch so the confirmation
/// notification goes out once per `OrderConfirmed`.
pub async fn process_events(mut rx: mpsc::Receiver<Event>, notifications: NotificationService) {
    while let Some(event) = rx.recv().await {
        debug!(?event, "Processing event");
        match event {
            Event::OrderCreated { order_id } => {
                info!(%order_id, "Order created");
            }
            Event::OrderConfirmed { order_id } => {
                info!(%order_id, "Order confirmed");
                notifications
                    .dispatch(order_id, NotificationKind::Confirmation)
                    .await;
            }
            Event::PaymentFailed { order_id } => {
                info!(%order_id, "Payment failed");
            }
            Event::PaymentRefunded { order_id } => {
                info!(%order_id, "Payment refunded");
            }
        }
    }
    info!("Event channel closed; processor exiting");
}
