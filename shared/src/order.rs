//! Order status machine and full order snapshots
//!
//! Every notification event carries an [`OrderView`] — the complete
//! current state of the order, not a diff. Bus delivery is
//! best-effort and unordered across topics, so consumers must treat
//! each view as a full refresh.

use serde::{Deserialize, Serialize};

/// Order lifecycle status
///
/// Happy path is linear: pending → confirmed → preparing → ready →
/// delivered → paid. `cancelled` is reachable from any non-terminal
/// state. `paid` and `cancelled` are terminal; no backward edges.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Preparing,
    Ready,
    Delivered,
    Paid,
    Cancelled,
}

impl OrderStatus {
    /// Statuses that keep a table occupied
    pub const OCCUPYING: [OrderStatus; 3] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Preparing,
    ];

    /// Statuses a cashier can settle payment from
    pub const PAYABLE: [OrderStatus; 2] = [OrderStatus::Ready, OrderStatus::Delivered];

    /// Open (non-terminal) statuses — the set bulk table reset cancels
    pub const OPEN: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Preparing,
        OrderStatus::Ready,
        OrderStatus::Delivered,
    ];

    /// Whether no further transitions are possible
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Paid | OrderStatus::Cancelled)
    }

    /// Position on the linear happy path (cancelled has none)
    fn rank(self) -> Option<u8> {
        match self {
            OrderStatus::Pending => Some(0),
            OrderStatus::Confirmed => Some(1),
            OrderStatus::Preparing => Some(2),
            OrderStatus::Ready => Some(3),
            OrderStatus::Delivered => Some(4),
            OrderStatus::Paid => Some(5),
            OrderStatus::Cancelled => None,
        }
    }

    /// Whether the edge `self -> to` is legal
    ///
    /// Forward single steps along the happy path, `paid` from either
    /// `ready` or `delivered`, and `cancelled` from any non-terminal
    /// state. Everything else — backward edges, skips, edges out of a
    /// terminal state — is rejected.
    pub fn can_transition_to(self, to: OrderStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match to {
            OrderStatus::Cancelled => true,
            OrderStatus::Paid => matches!(self, OrderStatus::Ready | OrderStatus::Delivered),
            _ => match (self.rank(), to.rank()) {
                (Some(from), Some(to)) => to == from + 1,
                _ => false,
            },
        }
    }

    /// Lowercase wire name (matches the serde representation)
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Preparing => "preparing",
            OrderStatus::Ready => "ready",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Paid => "paid",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Parse a lowercase wire name
    pub fn parse(s: &str) -> Option<OrderStatus> {
        match s {
            "pending" => Some(OrderStatus::Pending),
            "confirmed" => Some(OrderStatus::Confirmed),
            "preparing" => Some(OrderStatus::Preparing),
            "ready" => Some(OrderStatus::Ready),
            "delivered" => Some(OrderStatus::Delivered),
            "paid" => Some(OrderStatus::Paid),
            "cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Line-item snapshot inside an [`OrderView`]
///
/// Unit price, name and vendor attribution are captured at add-time
/// and never re-derived from the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItemView {
    pub id: i64,
    pub menu_item_id: i64,
    pub name: String,
    pub vendor_id: i64,
    pub vendor_name: String,
    pub quantity: i64,
    pub unit_price: f64,
    pub subtotal: f64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub special_instructions: String,
    /// Preparation time in minutes, snapshotted from the catalog
    pub preparation_time: i64,
}

/// Full serialized order snapshot
///
/// The authoritative current state pushed to every subscriber.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderView {
    pub id: String,
    pub table_number: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub customer_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub customer_phone: String,
    pub status: OrderStatus,
    pub total_amount: f64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub notes: String,
    /// Millisecond UTC timestamps; forward-transition stamps are set
    /// once on first entry and never overwritten.
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmed_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ready_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivered_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_ready_time: Option<i64>,
    pub items: Vec<OrderItemView>,
}

impl OrderView {
    /// Distinct vendor ids represented among the line items
    pub fn vendor_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.items.iter().map(|i| i.vendor_id).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Sum of line-item subtotals (the total invariant)
    pub fn items_total(&self) -> f64 {
        self.items.iter().map(|i| i.subtotal).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_edges_are_legal() {
        use OrderStatus::*;
        for (from, to) in [
            (Pending, Confirmed),
            (Confirmed, Preparing),
            (Preparing, Ready),
            (Ready, Delivered),
            (Delivered, Paid),
            (Ready, Paid),
        ] {
            assert!(from.can_transition_to(to), "{from} -> {to} should be legal");
        }
    }

    #[test]
    fn backward_and_skip_edges_are_illegal() {
        use OrderStatus::*;
        for (from, to) in [
            (Confirmed, Pending),
            (Ready, Preparing),
            (Pending, Paid),
            (Pending, Ready),
            (Confirmed, Delivered),
        ] {
            assert!(!from.can_transition_to(to), "{from} -> {to} should be illegal");
        }
    }

    #[test]
    fn terminal_states_have_no_exits() {
        use OrderStatus::*;
        for from in [Paid, Cancelled] {
            for to in [Pending, Confirmed, Preparing, Ready, Delivered, Paid, Cancelled] {
                assert!(!from.can_transition_to(to), "{from} -> {to} should be illegal");
            }
        }
    }

    #[test]
    fn cancellable_from_any_open_state() {
        for from in OrderStatus::OPEN {
            assert!(from.can_transition_to(OrderStatus::Cancelled));
        }
    }

    #[test]
    fn wire_names_round_trip() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Confirmed,
            OrderStatus::Preparing,
            OrderStatus::Ready,
            OrderStatus::Delivered,
            OrderStatus::Paid,
            OrderStatus::Cancelled,
        ] {
            assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
    }

    #[test]
    fn vendor_ids_deduplicated() {
        let item = |vendor_id: i64| OrderItemView {
            id: 1,
            menu_item_id: 1,
            name: "x".into(),
            vendor_id,
            vendor_name: "v".into(),
            quantity: 1,
            unit_price: 1.0,
            subtotal: 1.0,
            special_instructions: String::new(),
            preparation_time: 10,
        };
        let view = OrderView {
            id: "o".into(),
            table_number: 1,
            customer_name: String::new(),
            customer_phone: String::new(),
            status: OrderStatus::Pending,
            total_amount: 3.0,
            notes: String::new(),
            created_at: 0,
            updated_at: 0,
            confirmed_at: None,
            ready_at: None,
            delivered_at: None,
            paid_at: None,
            estimated_ready_time: None,
            items: vec![item(2), item(1), item(2)],
        };
        assert_eq!(view.vendor_ids(), vec![1, 2]);
    }
}
