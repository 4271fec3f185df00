//! NotificationHub — in-process order event fan-out
//!
//! Topic pub/sub over `tokio::sync::broadcast`. Channels are created
//! lazily on first use and delivery is fire-and-forget: a publish with
//! no subscribers is dropped, a slow subscriber that overflows its
//! channel sees `Lagged` and must re-snapshot.
//!
//! ```text
//! Order / Cart services
//!       │ OrderEvent (full post-change snapshot)
//!       ▼
//! NotificationHub
//!   └── topics: Topic → broadcast::Sender<OrderEvent>
//!         │
//!         ▼
//! WS sessions (table / vendor / cashier / kitchen)
//! ```

use std::sync::Arc;

use dashmap::DashMap;
use shared::message::{EventKind, OrderEvent};
use shared::order::{OrderStatus, OrderView};
use tokio::sync::broadcast;

/// A delivery audience
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Customers seated at one table
    Table(i64),
    /// One vendor stall's prep screen
    Vendor(i64),
    /// The payment counter
    Cashier,
    /// The shared kitchen/expo display
    Kitchen,
}

/// Broadcast channel capacity per topic
const BROADCAST_CAPACITY: usize = 256;

/// Global notification hub
#[derive(Clone, Default)]
pub struct NotificationHub {
    topics: Arc<DashMap<Topic, broadcast::Sender<OrderEvent>>>,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to a topic, creating its channel if needed
    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<OrderEvent> {
        self.sender(topic).subscribe()
    }

    /// Publish one event to one topic
    ///
    /// No subscribers means send returns Err; safe to ignore.
    pub fn publish(&self, topic: Topic, event: OrderEvent) {
        if let Some(tx) = self.topics.get(&topic) {
            let _ = tx.send(event);
        }
    }

    /// Publish one event to every topic the routing table names for it
    pub fn fan_out(&self, kind: EventKind, order: &OrderView) {
        let event = OrderEvent::new(kind, order.clone());
        for topic in topics_for(kind, order) {
            self.publish(topic, event.clone());
        }
    }

    /// Live subscriber count for a topic (diagnostics)
    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.topics
            .get(&topic)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }

    fn sender(&self, topic: Topic) -> broadcast::Sender<OrderEvent> {
        self.topics
            .entry(topic)
            .or_insert_with(|| broadcast::channel(BROADCAST_CAPACITY).0)
            .clone()
    }
}

/// Routing table: which audiences hear which event
///
/// - created / status changes / item updates go to the order's table,
///   every vendor with a line item in it, and the kitchen display;
///   a status change into an awaiting-payment state also reaches the
///   cashier counter
/// - `ready_for_payment` and `payment_settled` are cashier-only signals;
///   the table still learns of `paid` through the status change event
pub fn topics_for(kind: EventKind, order: &OrderView) -> Vec<Topic> {
    match kind {
        EventKind::OrderCreated
        | EventKind::OrderUpdated
        | EventKind::OrderStatusChanged
        | EventKind::ItemUpdated => {
            let mut topics = vec![Topic::Table(order.table_number)];
            topics.extend(order.vendor_ids().into_iter().map(Topic::Vendor));
            topics.push(Topic::Kitchen);
            if kind == EventKind::OrderStatusChanged
                && OrderStatus::PAYABLE.contains(&order.status)
            {
                topics.push(Topic::Cashier);
            }
            topics
        }
        EventKind::OrderReadyForPayment | EventKind::OrderPaymentSettled => {
            vec![Topic::Cashier]
        }
    }
}
