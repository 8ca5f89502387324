// libs/appointment-cell/src/services/notifications.rs
use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::debug;

use crate::models::AppointmentEvent;

pub type EventSender = broadcast::Sender<String>;
pub type EventReceiver = broadcast::Receiver<String>;

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("No subscribers are listening for appointment events")]
    NoSubscribers,

    #[error("Failed to serialize event: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Delivery failed: {0}")]
    Delivery(String),
}

/// One-way outlet for lifecycle events. Callers log failures and move on.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn publish(&self, event: &AppointmentEvent) -> Result<(), NotificationError>;
}

/// Fans JSON-encoded events out to every live subscriber.
pub struct BroadcastNotificationSink {
    sender: EventSender,
}

impl BroadcastNotificationSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[async_trait]
impl NotificationSink for BroadcastNotificationSink {
    async fn publish(&self, event: &AppointmentEvent) -> Result<(), NotificationError> {
        let payload = serde_json::to_string(event)?;

        match self.sender.send(payload) {
            Ok(receivers) => {
                debug!("Published {:?} for appointment {} to {} subscribers",
                       event.kind, event.appointment.id, receivers);
                Ok(())
            }
            Err(_) => Err(NotificationError::NoSubscribers),
        }
    }
}
