//! WebSocket wire protocol and bus event types
//!
//! Frames are JSON objects tagged by a `type` field. The server never
//! buffers for slow readers; a consumer that falls behind its
//! broadcast channel gets a fresh snapshot instead of the missed
//! frames.

use serde::{Deserialize, Serialize};

use crate::order::{OrderStatus, OrderView};

/// What happened to an order, carried on the notification bus
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EventKind {
    #[serde(rename = "order.created")]
    OrderCreated,
    #[serde(rename = "order.updated")]
    OrderUpdated,
    #[serde(rename = "order.status_changed")]
    OrderStatusChanged,
    #[serde(rename = "item.updated")]
    ItemUpdated,
    #[serde(rename = "order.ready_for_payment")]
    OrderReadyForPayment,
    #[serde(rename = "order.payment_settled")]
    OrderPaymentSettled,
}

/// Bus payload: event kind plus the full post-change order snapshot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderEvent {
    pub kind: EventKind,
    pub order: OrderView,
}

impl OrderEvent {
    pub fn new(kind: EventKind, order: OrderView) -> Self {
        Self { kind, order }
    }
}

/// Client → server frames
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Ping,
    /// Re-request the scope's active-order snapshot
    GetOrders,
    /// Staff: drive the order status machine
    UpdateOrderStatus { order_id: String, status: OrderStatus },
    /// Vendor: flag a line item's progress. The item's parent order is
    /// resolved server-side; order-level status stays authoritative and
    /// subscribers get an `item.updated` snapshot refresh.
    UpdateItemStatus { item_id: i64, status: OrderStatus },
    /// Cashier: settle payment
    MarkPaid {
        order_id: String,
        payment_method: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        payment_amount: Option<f64>,
    },
}

/// Server → client frames
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Pong,
    /// Initial or re-requested snapshot of the scope's active orders
    OrderList { orders: Vec<OrderView> },
    NewOrder { order: OrderView },
    OrderUpdate { order: OrderView },
    OrderStatusChange {
        order_id: String,
        status: OrderStatus,
        message: String,
    },
    OrderReadyForPayment { order: OrderView },
    Error { code: u16, message: String },
}

impl ServerMessage {
    /// Map a bus event to the frame a subscriber receives
    pub fn from_event(event: &OrderEvent) -> ServerMessage {
        match event.kind {
            EventKind::OrderCreated => ServerMessage::NewOrder { order: event.order.clone() },
            EventKind::OrderStatusChanged | EventKind::OrderPaymentSettled => {
                ServerMessage::OrderStatusChange {
                    order_id: event.order.id.clone(),
                    status: event.order.status,
                    message: format!("order is now {}", event.order.status),
                }
            }
            EventKind::OrderReadyForPayment => {
                ServerMessage::OrderReadyForPayment { order: event.order.clone() }
            }
            EventKind::OrderUpdated | EventKind::ItemUpdated => {
                ServerMessage::OrderUpdate { order: event.order.clone() }
            }
        }
    }
}
