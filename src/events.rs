use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Events emitted by the workflows after a successful commit. Consumed
/// in-process by the logging task spawned at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Order events
    OrderCreated(Uuid),
    OrderCancelled(Uuid),
    OrderStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },

    // Payment events
    PaymentCreated(Uuid),
    PaymentConfirmed {
        payment_id: Uuid,
        gateway_status: String,
    },
    PaymentRefunded(Uuid),

    // Catalog events
    ProductCreated(Uuid),
    ProductDeleted(Uuid),
    VariantCreated(Uuid),
    CategoryCreated(Uuid),
    TemplateCreated(Uuid),

    // Inventory events
    StockAdjusted {
        product_id: Uuid,
        variant_id: Option<Uuid>,
        quantity: i32,
        movement: String,
    },

    // Auth events
    UserRegistered(Uuid),
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("failed to send event: {e}"))
    }

    /// Sends an event, logging instead of failing when the channel is
    /// closed. Workflows must not fail because observers went away.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(err) = self.send(event).await {
            warn!(error = %err, "event dropped");
        }
    }
}

/// Creates a bounded event channel with its sender wrapper.
pub fn channel(capacity: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(capacity);
    (EventSender::new(tx), rx)
}

/// Drains the event channel, logging each event. Runs until every sender
/// is dropped.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        info!(?event, "event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_delivers_event() {
        let (sender, mut rx) = channel(8);
        sender.send(Event::OrderCreated(Uuid::new_v4())).await.unwrap();
        assert!(matches!(rx.recv().await, Some(Event::OrderCreated(_))));
    }

    #[tokio::test]
    async fn send_or_log_swallows_closed_channel() {
        let (sender, rx) = channel(1);
        drop(rx);
        // Must not panic or error out.
        sender.send_or_log(Event::OrderCancelled(Uuid::new_v4())).await;
    }
}
