//! Order lifecycle service
//!
//! Owns order creation, the status machine, payment settlement, table
//! reset and the read-model queries. Every successful mutation
//! publishes the full post-change [`OrderView`] through the
//! [`NotificationHub`]; publication is fire-and-forget and happens
//! after the database write is durable.

pub mod money;

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;
use shared::error::{ErrorCode, OrderError};
use shared::message::EventKind;
use shared::order::{OrderStatus, OrderView};
use shared::util::now_millis;
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::db::{catalog, orders as db};
use crate::error::ServiceResult;
use crate::live::NotificationHub;

const MILLIS_PER_MINUTE: i64 = 60_000;
const TOP_ITEMS_LIMIT: i64 = 5;

/// Input for a new order (from checkout or direct API)
#[derive(Debug, Clone)]
pub struct NewOrderInput {
    pub table_number: i64,
    pub customer_name: String,
    pub customer_phone: String,
    pub notes: String,
    pub items: Vec<NewOrderItemInput>,
}

#[derive(Debug, Clone)]
pub struct NewOrderItemInput {
    pub menu_item_id: i64,
    pub quantity: i64,
    /// Price already agreed with the customer (cart snapshot); `None`
    /// prices the line from the current catalog.
    pub unit_price: Option<f64>,
    pub special_instructions: String,
}

/// Settled payment: the paid order plus change owed
#[derive(Debug, Clone, Serialize)]
pub struct PaymentReceipt {
    pub order: OrderView,
    pub payment_method: String,
    pub amount_tendered: f64,
    pub change_due: f64,
}

/// One entry of the append-only status trail
#[derive(Debug, Clone, Serialize)]
pub struct StatusChange {
    pub from_status: Option<String>,
    pub to_status: String,
    pub changed_by: String,
    pub changed_at: i64,
}

/// Table occupancy summary for the cashier overview
#[derive(Debug, Clone, Serialize)]
pub struct TableOverview {
    pub number: i64,
    pub capacity: i64,
    pub is_active: bool,
    pub open_orders: i64,
    pub is_occupied: bool,
    pub unpaid_total: f64,
}

/// Revenue taken per payment method, parsed from the `[PAYMENT]`
/// note annotations of the day's settled orders
#[derive(Debug, Clone, Serialize)]
pub struct PaymentMethodTotal {
    pub method: String,
    pub orders: i64,
    pub amount: f64,
}

/// Daily settlement report
#[derive(Debug, Serialize)]
pub struct DailyReport {
    pub date: NaiveDate,
    pub orders_paid: i64,
    pub gross_revenue: f64,
    pub orders_cancelled: i64,
    pub pending_amount: f64,
    pub average_order_value: f64,
    pub top_items: Vec<db::TopItemRow>,
    pub payment_methods: Vec<PaymentMethodTotal>,
    pub vendors: Vec<db::VendorRevenueRow>,
}

#[derive(Clone)]
pub struct OrderService {
    pool: SqlitePool,
    hub: NotificationHub,
    default_prep_minutes: i64,
}

impl OrderService {
    pub fn new(pool: SqlitePool, hub: NotificationHub, default_prep_minutes: i64) -> Self {
        Self {
            pool,
            hub,
            default_prep_minutes,
        }
    }

    /// Create an order in its own transaction and announce it
    pub async fn create(&self, input: NewOrderInput) -> ServiceResult<OrderView> {
        let now = now_millis();
        let prepared = self.prepare(&input).await?;

        let mut tx = self.pool.begin().await?;
        self.insert_prepared(&mut tx, &prepared, now).await?;
        tx.commit().await?;

        let view = self.get(&prepared.id).await?;
        self.hub.fan_out(EventKind::OrderCreated, &view);
        Ok(view)
    }

    /// Publish `order.created` for an already committed order
    pub async fn announce_created(&self, order_id: &str) -> ServiceResult<OrderView> {
        let view = self.get(order_id).await?;
        self.hub.fan_out(EventKind::OrderCreated, &view);
        Ok(view)
    }

    /// Validate input against the catalog and price every line; lines
    /// carrying a cart-snapshot price keep it. Runs outside any
    /// transaction; checkout calls this first, then inserts the
    /// prepared order alongside the cart teardown.
    pub(crate) async fn prepare(&self, input: &NewOrderInput) -> ServiceResult<PreparedOrder> {
        let table = catalog::find_table_by_number(&self.pool, input.table_number)
            .await?
            .ok_or_else(|| OrderError::table_unavailable(input.table_number))?;
        if !table.is_active {
            return Err(OrderError::table_unavailable(input.table_number).into());
        }
        if input.items.is_empty() {
            return Err(OrderError::validation("order must contain at least one item").into());
        }

        let mut items = Vec::with_capacity(input.items.len());
        for line in &input.items {
            money::validate_quantity(line.quantity)?;
            let menu_item = catalog::find_menu_item(&self.pool, line.menu_item_id)
                .await?
                .ok_or_else(|| OrderError::item_unavailable(line.menu_item_id))?;
            if !menu_item.is_available {
                return Err(OrderError::item_unavailable(line.menu_item_id).into());
            }
            let vendor = catalog::find_vendor(&self.pool, menu_item.vendor_id)
                .await?
                .ok_or_else(|| OrderError::item_unavailable(line.menu_item_id))?;
            if !vendor.is_open {
                return Err(OrderError::item_unavailable(line.menu_item_id).into());
            }

            let unit_price = line.unit_price.unwrap_or(menu_item.price);
            let subtotal = money::line_subtotal(unit_price, line.quantity)?;
            items.push(db::NewItem {
                menu_item_id: menu_item.id,
                name: menu_item.name,
                vendor_id: vendor.id,
                vendor_name: vendor.name,
                quantity: line.quantity,
                unit_price,
                subtotal,
                special_instructions: line.special_instructions.clone(),
                preparation_time: menu_item.preparation_time,
            });
        }

        let total = money::order_total(items.iter().map(|i| i.subtotal))?;

        Ok(PreparedOrder {
            id: Uuid::new_v4().to_string(),
            table_number: input.table_number,
            customer_name: input.customer_name.clone(),
            customer_phone: input.customer_phone.clone(),
            notes: input.notes.clone(),
            total,
            items,
        })
    }

    pub(crate) async fn insert_prepared(
        &self,
        conn: &mut SqliteConnection,
        prepared: &PreparedOrder,
        now: i64,
    ) -> ServiceResult<()> {
        db::insert_order(
            conn,
            &prepared.id,
            prepared.table_number,
            &prepared.customer_name,
            &prepared.customer_phone,
            prepared.total,
            &prepared.notes,
            now,
        )
        .await?;
        for item in &prepared.items {
            db::insert_item(conn, &prepared.id, item).await?;
        }
        db::append_history(conn, &prepared.id, None, OrderStatus::Pending, "system", now).await?;
        Ok(())
    }

    /// Full snapshot of one order
    pub async fn get(&self, order_id: &str) -> ServiceResult<OrderView> {
        let row = db::fetch_order(&self.pool, order_id)
            .await?
            .ok_or_else(|| OrderError::order_not_found(order_id))?;
        let items = db::fetch_items(&self.pool, order_id)
            .await?
            .into_iter()
            .map(Into::into)
            .collect();
        Ok(row.into_view(items))
    }

    pub async fn history(&self, order_id: &str) -> ServiceResult<Vec<StatusChange>> {
        // 404 for unknown orders rather than an empty trail
        db::fetch_order(&self.pool, order_id)
            .await?
            .ok_or_else(|| OrderError::order_not_found(order_id))?;
        let rows = db::fetch_history(&self.pool, order_id).await?;
        Ok(rows
            .into_iter()
            .map(|r| StatusChange {
                from_status: r.from_status,
                to_status: r.to_status,
                changed_by: r.changed_by,
                changed_at: r.changed_at,
            })
            .collect())
    }

    /// Drive the status machine one edge forward
    pub async fn transition(
        &self,
        order_id: &str,
        to: OrderStatus,
        changed_by: &str,
    ) -> ServiceResult<OrderView> {
        self.apply_transition(order_id, to, changed_by, None).await
    }

    /// Cancel from any open state, recording the reason in the notes
    pub async fn cancel(
        &self,
        order_id: &str,
        changed_by: &str,
        reason: Option<&str>,
    ) -> ServiceResult<OrderView> {
        let annotation = match reason {
            Some(r) if !r.is_empty() => Some(format!("[CANCELLED] reason={r}")),
            _ => None,
        };
        self.apply_transition(order_id, OrderStatus::Cancelled, changed_by, annotation)
            .await
    }

    /// Settle payment; rejects when the tendered amount does not cover
    /// the total, leaving the order untouched.
    pub async fn mark_paid(
        &self,
        order_id: &str,
        payment_method: &str,
        amount_tendered: Option<f64>,
        changed_by: &str,
    ) -> ServiceResult<PaymentReceipt> {
        let row = db::fetch_order(&self.pool, order_id)
            .await?
            .ok_or_else(|| OrderError::order_not_found(order_id))?;
        let from = row.parsed_status();
        if !OrderStatus::PAYABLE.contains(&from) {
            return Err(OrderError::invalid_transition(from, OrderStatus::Paid).into());
        }

        let total = row.total_amount;
        let tendered = amount_tendered.unwrap_or(total);
        let change = money::change_due(tendered, total)?;
        if change < 0.0 {
            return Err(OrderError::insufficient_payment(tendered, total).into());
        }

        let annotation = format!("[PAYMENT] method={payment_method} amount={tendered:.2}");
        let view = self
            .apply_transition(order_id, OrderStatus::Paid, changed_by, Some(annotation))
            .await?;
        self.hub.fan_out(EventKind::OrderPaymentSettled, &view);

        Ok(PaymentReceipt {
            order: view,
            payment_method: payment_method.to_string(),
            amount_tendered: tendered,
            change_due: change,
        })
    }

    /// Vendor progress tick on a single line item
    ///
    /// Order status stays authoritative; this verifies ownership,
    /// bumps `updated_at` and republishes the snapshot so displays
    /// refresh.
    pub async fn update_item(
        &self,
        order_id: &str,
        item_id: i64,
        acting_vendor: Option<i64>,
    ) -> ServiceResult<OrderView> {
        let row = db::fetch_order(&self.pool, order_id)
            .await?
            .ok_or_else(|| OrderError::order_not_found(order_id))?;
        if row.parsed_status().is_terminal() {
            return Err(OrderError::invalid_transition(row.parsed_status(), "item update").into());
        }

        let items = db::fetch_items(&self.pool, order_id).await?;
        let item = items
            .iter()
            .find(|i| i.id == item_id)
            .ok_or_else(|| OrderError::validation(format!("item {item_id} not in order")))?;
        if let Some(vendor_id) = acting_vendor {
            if item.vendor_id != vendor_id {
                return Err(
                    OrderError::permission_denied("item belongs to another vendor").into(),
                );
            }
        }

        db::touch(&self.pool, order_id, now_millis()).await?;
        let view = self.get(order_id).await?;
        self.hub.fan_out(EventKind::ItemUpdated, &view);
        Ok(view)
    }

    /// Resolve which order a line item belongs to
    pub async fn order_for_item(&self, item_id: i64) -> ServiceResult<String> {
        Ok(db::find_item_order(&self.pool, item_id)
            .await?
            .ok_or_else(|| {
                OrderError::with_message(
                    ErrorCode::OrderNotFound,
                    format!("no order contains item {item_id}"),
                )
            })?)
    }

    /// Re-derive the stored total from line subtotals
    pub async fn recompute_total(&self, order_id: &str) -> ServiceResult<OrderView> {
        let items = db::fetch_items(&self.pool, order_id).await?;
        if items.is_empty() && db::fetch_order(&self.pool, order_id).await?.is_none() {
            return Err(OrderError::order_not_found(order_id).into());
        }
        let total = money::order_total(items.iter().map(|i| i.subtotal))?;
        db::update_total(&self.pool, order_id, total, now_millis()).await?;
        let view = self.get(order_id).await?;
        self.hub.fan_out(EventKind::OrderUpdated, &view);
        Ok(view)
    }

    /// Cancel every open order on a table. Idempotent: a table with no
    /// open orders resets to zero cancellations.
    pub async fn reset_table(
        &self,
        table_number: i64,
        changed_by: &str,
        reason: &str,
    ) -> ServiceResult<u64> {
        catalog::find_table_by_number(&self.pool, table_number)
            .await?
            .ok_or_else(|| OrderError::table_unavailable(table_number))?;

        let rows = db::open_orders_for_table(&self.pool, table_number).await?;
        let mut cancelled = 0u64;
        for row in rows {
            match self.cancel(&row.id, changed_by, Some(reason)).await {
                Ok(_) => cancelled += 1,
                // Lost a race to a concurrent terminal transition; skip
                Err(crate::error::ServiceError::App(e))
                    if e.code == shared::error::ErrorCode::InvalidTransition =>
                {
                    tracing::debug!(order_id = %row.id, "skipping already-settled order in reset");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(cancelled)
    }

    pub async fn active_for_table(&self, table_number: i64) -> ServiceResult<Vec<OrderView>> {
        self.assemble(db::open_orders_for_table(&self.pool, table_number).await?)
            .await
    }

    pub async fn active_for_vendor(&self, vendor_id: i64) -> ServiceResult<Vec<OrderView>> {
        self.assemble(db::open_orders_for_vendor(&self.pool, vendor_id).await?)
            .await
    }

    /// Orders awaiting settlement (cashier snapshot)
    pub async fn payable(&self) -> ServiceResult<Vec<OrderView>> {
        self.assemble(db::payable_orders(&self.pool).await?).await
    }

    /// Every open order (kitchen display snapshot)
    pub async fn all_open(&self) -> ServiceResult<Vec<OrderView>> {
        self.assemble(db::open_orders(&self.pool).await?).await
    }

    pub async fn table_overview(&self) -> ServiceResult<Vec<TableOverview>> {
        let tables = catalog::list_tables(&self.pool).await?;
        let load = db::table_load(&self.pool).await?;
        Ok(tables
            .into_iter()
            .map(|t| {
                let row = load.iter().find(|l| l.table_number == t.number);
                TableOverview {
                    number: t.number,
                    capacity: t.capacity,
                    is_active: t.is_active,
                    open_orders: row.map(|l| l.open_orders).unwrap_or(0),
                    is_occupied: row.map(|l| l.occupying_orders > 0).unwrap_or(false),
                    unpaid_total: row.map(|l| l.unpaid_total).unwrap_or(0.0),
                }
            })
            .collect())
    }

    /// Settlement report for one UTC calendar day
    pub async fn daily_report(&self, date: NaiveDate) -> ServiceResult<DailyReport> {
        let start = date
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc().timestamp_millis())
            .ok_or_else(|| OrderError::validation("invalid date"))?;
        let end = start + 24 * 60 * MILLIS_PER_MINUTE;

        let totals = db::paid_totals(&self.pool, start, end).await?;
        let vendors = db::vendor_revenue(&self.pool, start, end).await?;
        let orders_cancelled = db::cancelled_count(&self.pool, start, end).await?;
        let pending_amount = db::open_amount(&self.pool, start, end).await?.unwrap_or(0.0);
        let top_items = db::top_items(&self.pool, start, end, TOP_ITEMS_LIMIT).await?;
        let payment_methods =
            payment_breakdown(&db::paid_order_notes(&self.pool, start, end).await?);

        let gross_revenue = totals.gross_revenue.unwrap_or(0.0);
        let average_order_value = if totals.orders_paid > 0 {
            money::order_total([gross_revenue / totals.orders_paid as f64])?
        } else {
            0.0
        };

        Ok(DailyReport {
            date,
            orders_paid: totals.orders_paid,
            gross_revenue,
            orders_cancelled,
            pending_amount,
            average_order_value,
            top_items,
            payment_methods,
            vendors,
        })
    }

    async fn assemble(&self, rows: Vec<db::OrderRow>) -> ServiceResult<Vec<OrderView>> {
        let mut views = Vec::with_capacity(rows.len());
        for row in rows {
            let items = db::fetch_items(&self.pool, &row.id)
                .await?
                .into_iter()
                .map(Into::into)
                .collect();
            views.push(row.into_view(items));
        }
        Ok(views)
    }

    /// Conditional-update transition; exactly one concurrent caller
    /// wins the edge, losers get `InvalidTransition` against the state
    /// they actually observed.
    async fn apply_transition(
        &self,
        order_id: &str,
        to: OrderStatus,
        changed_by: &str,
        annotation: Option<String>,
    ) -> ServiceResult<OrderView> {
        let now = now_millis();
        let row = db::fetch_order(&self.pool, order_id)
            .await?
            .ok_or_else(|| OrderError::order_not_found(order_id))?;
        let from = row.parsed_status();
        if !from.can_transition_to(to) {
            return Err(OrderError::invalid_transition(from, to).into());
        }

        // First entry into confirmed stamps the ready-time estimate:
        // now plus the slowest line's prep time, floored at the default
        let estimate = if to == OrderStatus::Confirmed {
            let items = db::fetch_items(&self.pool, order_id).await?;
            let prep_minutes = items
                .iter()
                .map(|i| i.preparation_time)
                .max()
                .unwrap_or(0)
                .max(self.default_prep_minutes);
            Some(now + prep_minutes * MILLIS_PER_MINUTE)
        } else {
            None
        };

        // Status update, note annotation and history entry commit as
        // one unit; a crash mid-sequence must not leave a transitioned
        // order without its audit row.
        let mut tx = self.pool.begin().await?;
        if !db::try_transition(&mut tx, order_id, from, to, now, estimate).await? {
            tx.rollback().await?;
            let current = db::fetch_order(&self.pool, order_id)
                .await?
                .ok_or_else(|| OrderError::order_not_found(order_id))?;
            return Err(OrderError::invalid_transition(current.parsed_status(), to).into());
        }
        if let Some(note) = annotation {
            db::append_note(&mut tx, order_id, &note, now).await?;
        }
        db::append_history(&mut tx, order_id, Some(from), to, changed_by, now).await?;
        tx.commit().await?;

        let view = self.get(order_id).await?;
        self.hub.fan_out(EventKind::OrderStatusChanged, &view);
        if matches!(to, OrderStatus::Ready | OrderStatus::Delivered) {
            self.hub.fan_out(EventKind::OrderReadyForPayment, &view);
        }
        Ok(view)
    }
}

/// Group settled orders by the method recorded in their payment
/// annotation; orders missing one land in an `unknown` bucket.
fn payment_breakdown(rows: &[db::PaidOrderRow]) -> Vec<PaymentMethodTotal> {
    let mut buckets: BTreeMap<String, (i64, f64)> = BTreeMap::new();
    for row in rows {
        let method = parse_payment_method(&row.notes).unwrap_or("unknown");
        let entry = buckets.entry(method.to_string()).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += row.total_amount;
    }
    buckets
        .into_iter()
        .map(|(method, (orders, amount))| PaymentMethodTotal {
            method,
            orders,
            amount,
        })
        .collect()
}

/// Last `[PAYMENT] method=<m> amount=<a>` line wins
fn parse_payment_method(notes: &str) -> Option<&str> {
    notes.lines().rev().find_map(|line| {
        let rest = line.strip_prefix("[PAYMENT] method=")?;
        match rest.split_once(" amount=") {
            Some((method, _)) => Some(method),
            None => Some(rest),
        }
    })
}

pub(crate) struct PreparedOrder {
    pub(crate) id: String,
    table_number: i64,
    customer_name: String,
    customer_phone: String,
    notes: String,
    total: f64,
    items: Vec<db::NewItem>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_annotation_parses() {
        assert_eq!(
            parse_payment_method("[PAYMENT] method=cash amount=30.00"),
            Some("cash")
        );
        assert_eq!(
            parse_payment_method("no peanuts\n[CANCELLED] reason=test"),
            None
        );
        // last annotation wins
        let notes = "[PAYMENT] method=card amount=10.00\n[PAYMENT] method=cash amount=10.00";
        assert_eq!(parse_payment_method(notes), Some("cash"));
    }

    #[test]
    fn breakdown_buckets_by_method() {
        let rows = vec![
            db::PaidOrderRow {
                notes: "[PAYMENT] method=cash amount=30.00".into(),
                total_amount: 25.80,
            },
            db::PaidOrderRow {
                notes: "[PAYMENT] method=cash amount=10.00".into(),
                total_amount: 9.50,
            },
            db::PaidOrderRow {
                notes: "hand-edited".into(),
                total_amount: 4.25,
            },
        ];
        let breakdown = payment_breakdown(&rows);
        assert_eq!(breakdown.len(), 2);
        let cash = &breakdown[0];
        assert_eq!((cash.method.as_str(), cash.orders), ("cash", 2));
        assert!((cash.amount - 35.30).abs() < 1e-9);
        assert_eq!(breakdown[1].method, "unknown");
    }
}
