//! Order persistence: rows, conditional status updates, queries
//!
//! Status transitions use a conditional `WHERE id = ? AND status = ?`
//! update so that concurrent writers race on the row itself; exactly
//! one wins, the rest see zero rows affected.

use shared::order::{OrderItemView, OrderStatus, OrderView};
use sqlx::{SqliteConnection, SqlitePool};

#[derive(Debug, sqlx::FromRow)]
pub struct OrderRow {
    pub id: String,
    pub table_number: i64,
    pub customer_name: String,
    pub customer_phone: String,
    pub status: String,
    pub total_amount: f64,
    pub notes: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub confirmed_at: Option<i64>,
    pub ready_at: Option<i64>,
    pub delivered_at: Option<i64>,
    pub paid_at: Option<i64>,
    pub estimated_ready_time: Option<i64>,
}

impl OrderRow {
    /// Parse the stored status; unknown strings map to `Pending`
    /// (cannot happen unless the database was edited by hand).
    pub fn parsed_status(&self) -> OrderStatus {
        OrderStatus::parse(&self.status).unwrap_or_default()
    }

    pub fn into_view(self, items: Vec<OrderItemView>) -> OrderView {
        let status = self.parsed_status();
        OrderView {
            id: self.id,
            table_number: self.table_number,
            customer_name: self.customer_name,
            customer_phone: self.customer_phone,
            status,
            total_amount: self.total_amount,
            notes: self.notes,
            created_at: self.created_at,
            updated_at: self.updated_at,
            confirmed_at: self.confirmed_at,
            ready_at: self.ready_at,
            delivered_at: self.delivered_at,
            paid_at: self.paid_at,
            estimated_ready_time: self.estimated_ready_time,
            items,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct OrderItemRow {
    pub id: i64,
    pub menu_item_id: i64,
    pub name: String,
    pub vendor_id: i64,
    pub vendor_name: String,
    pub quantity: i64,
    pub unit_price: f64,
    pub subtotal: f64,
    pub special_instructions: String,
    pub preparation_time: i64,
}

impl From<OrderItemRow> for OrderItemView {
    fn from(row: OrderItemRow) -> Self {
        OrderItemView {
            id: row.id,
            menu_item_id: row.menu_item_id,
            name: row.name,
            vendor_id: row.vendor_id,
            vendor_name: row.vendor_name,
            quantity: row.quantity,
            unit_price: row.unit_price,
            subtotal: row.subtotal,
            special_instructions: row.special_instructions,
            preparation_time: row.preparation_time,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct HistoryRow {
    pub id: i64,
    pub order_id: String,
    pub from_status: Option<String>,
    pub to_status: String,
    pub changed_by: String,
    pub changed_at: i64,
}

/// New line item, priced and attributed at insert time
#[derive(Debug, Clone)]
pub struct NewItem {
    pub menu_item_id: i64,
    pub name: String,
    pub vendor_id: i64,
    pub vendor_name: String,
    pub quantity: i64,
    pub unit_price: f64,
    pub subtotal: f64,
    pub special_instructions: String,
    pub preparation_time: i64,
}

pub async fn insert_order(
    conn: &mut SqliteConnection,
    id: &str,
    table_number: i64,
    customer_name: &str,
    customer_phone: &str,
    total_amount: f64,
    notes: &str,
    now: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO orders (id, table_number, customer_name, customer_phone, status,
                             total_amount, notes, created_at, updated_at)
         VALUES (?, ?, ?, ?, 'pending', ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(table_number)
    .bind(customer_name)
    .bind(customer_phone)
    .bind(total_amount)
    .bind(notes)
    .bind(now)
    .bind(now)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn insert_item(
    conn: &mut SqliteConnection,
    order_id: &str,
    item: &NewItem,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO order_items (order_id, menu_item_id, name, vendor_id, vendor_name,
                                  quantity, unit_price, subtotal, special_instructions,
                                  preparation_time)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(order_id)
    .bind(item.menu_item_id)
    .bind(&item.name)
    .bind(item.vendor_id)
    .bind(&item.vendor_name)
    .bind(item.quantity)
    .bind(item.unit_price)
    .bind(item.subtotal)
    .bind(&item.special_instructions)
    .bind(item.preparation_time)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn append_history(
    conn: &mut SqliteConnection,
    order_id: &str,
    from_status: Option<OrderStatus>,
    to_status: OrderStatus,
    changed_by: &str,
    changed_at: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO order_status_history (order_id, from_status, to_status, changed_by, changed_at)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(order_id)
    .bind(from_status.map(|s| s.as_str()))
    .bind(to_status.as_str())
    .bind(changed_by)
    .bind(changed_at)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn fetch_order(pool: &SqlitePool, id: &str) -> Result<Option<OrderRow>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn fetch_items(
    pool: &SqlitePool,
    order_id: &str,
) -> Result<Vec<OrderItemRow>, sqlx::Error> {
    sqlx::query_as(
        "SELECT id, menu_item_id, name, vendor_id, vendor_name, quantity, unit_price,
                subtotal, special_instructions, preparation_time
         FROM order_items WHERE order_id = ? ORDER BY id",
    )
    .bind(order_id)
    .fetch_all(pool)
    .await
}

pub async fn fetch_history(
    pool: &SqlitePool,
    order_id: &str,
) -> Result<Vec<HistoryRow>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM order_status_history WHERE order_id = ? ORDER BY id")
        .bind(order_id)
        .fetch_all(pool)
        .await
}

/// Conditional status update; returns whether this writer won the row.
///
/// Timestamp columns are set once via COALESCE on first entry into
/// their status and never overwritten afterwards. `estimate` is the
/// ready-time estimate stamped on first entry into `confirmed`.
pub async fn try_transition(
    conn: &mut SqliteConnection,
    id: &str,
    from: OrderStatus,
    to: OrderStatus,
    now: i64,
    estimate: Option<i64>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE orders SET
            status = ?2,
            updated_at = ?3,
            confirmed_at = CASE WHEN ?2 = 'confirmed' THEN COALESCE(confirmed_at, ?3) ELSE confirmed_at END,
            estimated_ready_time = CASE WHEN ?2 = 'confirmed' THEN COALESCE(estimated_ready_time, ?5) ELSE estimated_ready_time END,
            ready_at     = CASE WHEN ?2 = 'ready'     THEN COALESCE(ready_at, ?3)     ELSE ready_at END,
            delivered_at = CASE WHEN ?2 = 'delivered' THEN COALESCE(delivered_at, ?3) ELSE delivered_at END,
            paid_at      = CASE WHEN ?2 = 'paid'      THEN COALESCE(paid_at, ?3)      ELSE paid_at END
         WHERE id = ?1 AND status = ?4",
    )
    .bind(id)
    .bind(to.as_str())
    .bind(now)
    .bind(from.as_str())
    .bind(estimate)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Append an annotation line to the order notes
pub async fn append_note(
    conn: &mut SqliteConnection,
    id: &str,
    annotation: &str,
    now: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE orders SET
            notes = CASE WHEN notes = '' THEN ?2 ELSE notes || CHAR(10) || ?2 END,
            updated_at = ?3
         WHERE id = ?1",
    )
    .bind(id)
    .bind(annotation)
    .bind(now)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn update_total(
    pool: &SqlitePool,
    id: &str,
    total: f64,
    now: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE orders SET total_amount = ?2, updated_at = ?3 WHERE id = ?1")
        .bind(id)
        .bind(total)
        .bind(now)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn touch(pool: &SqlitePool, id: &str, now: i64) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE orders SET updated_at = ?2 WHERE id = ?1")
        .bind(id)
        .bind(now)
        .execute(pool)
        .await?;
    Ok(())
}

const OPEN_SET: &str = "('pending','confirmed','preparing','ready','delivered')";
const OCCUPYING_SET: &str = "('pending','confirmed','preparing')";
const PAYABLE_SET: &str = "('ready','delivered')";

pub async fn open_orders(pool: &SqlitePool) -> Result<Vec<OrderRow>, sqlx::Error> {
    sqlx::query_as(&format!(
        "SELECT * FROM orders WHERE status IN {OPEN_SET} ORDER BY created_at"
    ))
    .fetch_all(pool)
    .await
}

pub async fn open_orders_for_table(
    pool: &SqlitePool,
    table_number: i64,
) -> Result<Vec<OrderRow>, sqlx::Error> {
    sqlx::query_as(&format!(
        "SELECT * FROM orders WHERE table_number = ? AND status IN {OPEN_SET} ORDER BY created_at"
    ))
    .bind(table_number)
    .fetch_all(pool)
    .await
}

pub async fn open_orders_for_vendor(
    pool: &SqlitePool,
    vendor_id: i64,
) -> Result<Vec<OrderRow>, sqlx::Error> {
    sqlx::query_as(&format!(
        "SELECT DISTINCT o.* FROM orders o
         JOIN order_items i ON i.order_id = o.id
         WHERE i.vendor_id = ? AND o.status IN {OPEN_SET}
         ORDER BY o.created_at"
    ))
    .bind(vendor_id)
    .fetch_all(pool)
    .await
}

pub async fn payable_orders(pool: &SqlitePool) -> Result<Vec<OrderRow>, sqlx::Error> {
    sqlx::query_as(&format!(
        "SELECT * FROM orders WHERE status IN {PAYABLE_SET} ORDER BY created_at"
    ))
    .fetch_all(pool)
    .await
}

/// Per-table aggregate of open orders
#[derive(Debug, sqlx::FromRow)]
pub struct TableLoadRow {
    pub table_number: i64,
    pub open_orders: i64,
    pub occupying_orders: i64,
    pub unpaid_total: f64,
}

pub async fn table_load(pool: &SqlitePool) -> Result<Vec<TableLoadRow>, sqlx::Error> {
    sqlx::query_as(&format!(
        "SELECT table_number,
                COUNT(*) AS open_orders,
                SUM(CASE WHEN status IN {OCCUPYING_SET} THEN 1 ELSE 0 END) AS occupying_orders,
                SUM(total_amount) AS unpaid_total
         FROM orders WHERE status IN {OPEN_SET}
         GROUP BY table_number"
    ))
    .fetch_all(pool)
    .await
}

/// Paid-order totals over a half-open millisecond window
#[derive(Debug, sqlx::FromRow)]
pub struct PaidTotalsRow {
    pub orders_paid: i64,
    pub gross_revenue: Option<f64>,
}

pub async fn paid_totals(
    pool: &SqlitePool,
    start_millis: i64,
    end_millis: i64,
) -> Result<PaidTotalsRow, sqlx::Error> {
    sqlx::query_as(
        "SELECT COUNT(*) AS orders_paid, SUM(total_amount) AS gross_revenue
         FROM orders WHERE status = 'paid' AND paid_at >= ? AND paid_at < ?",
    )
    .bind(start_millis)
    .bind(end_millis)
    .fetch_one(pool)
    .await
}

/// Per-vendor paid and still-unpaid revenue over a window.
///
/// Paid revenue keys on settlement time; unpaid revenue is the open
/// orders created inside the window.
#[derive(Debug, sqlx::FromRow, serde::Serialize)]
pub struct VendorRevenueRow {
    pub vendor_id: i64,
    pub vendor_name: String,
    pub items_sold: i64,
    pub paid_revenue: f64,
    pub unpaid_revenue: f64,
}

pub async fn vendor_revenue(
    pool: &SqlitePool,
    start_millis: i64,
    end_millis: i64,
) -> Result<Vec<VendorRevenueRow>, sqlx::Error> {
    sqlx::query_as(&format!(
        "SELECT i.vendor_id, i.vendor_name,
                SUM(CASE WHEN o.status = 'paid' THEN i.quantity ELSE 0 END) AS items_sold,
                SUM(CASE WHEN o.status = 'paid' THEN i.subtotal ELSE 0.0 END) AS paid_revenue,
                SUM(CASE WHEN o.status IN {OPEN_SET} THEN i.subtotal ELSE 0.0 END) AS unpaid_revenue
         FROM order_items i
         JOIN orders o ON o.id = i.order_id
         WHERE (o.status = 'paid' AND o.paid_at >= ?1 AND o.paid_at < ?2)
            OR (o.status IN {OPEN_SET} AND o.created_at >= ?1 AND o.created_at < ?2)
         GROUP BY i.vendor_id, i.vendor_name
         ORDER BY paid_revenue DESC"
    ))
    .bind(start_millis)
    .bind(end_millis)
    .fetch_all(pool)
    .await
}

/// Best sellers among the paid orders in a window
#[derive(Debug, sqlx::FromRow, serde::Serialize)]
pub struct TopItemRow {
    pub menu_item_id: i64,
    pub name: String,
    pub quantity_sold: i64,
    pub revenue: f64,
}

pub async fn top_items(
    pool: &SqlitePool,
    start_millis: i64,
    end_millis: i64,
    limit: i64,
) -> Result<Vec<TopItemRow>, sqlx::Error> {
    sqlx::query_as(
        "SELECT i.menu_item_id, i.name,
                SUM(i.quantity) AS quantity_sold, SUM(i.subtotal) AS revenue
         FROM order_items i
         JOIN orders o ON o.id = i.order_id
         WHERE o.status = 'paid' AND o.paid_at >= ? AND o.paid_at < ?
         GROUP BY i.menu_item_id, i.name
         ORDER BY quantity_sold DESC, revenue DESC
         LIMIT ?",
    )
    .bind(start_millis)
    .bind(end_millis)
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Notes and totals of the paid orders in a window, for the
/// payment-method breakdown parsed from the `[PAYMENT]` annotations.
#[derive(Debug, sqlx::FromRow)]
pub struct PaidOrderRow {
    pub notes: String,
    pub total_amount: f64,
}

pub async fn paid_order_notes(
    pool: &SqlitePool,
    start_millis: i64,
    end_millis: i64,
) -> Result<Vec<PaidOrderRow>, sqlx::Error> {
    sqlx::query_as(
        "SELECT notes, total_amount FROM orders
         WHERE status = 'paid' AND paid_at >= ? AND paid_at < ?",
    )
    .bind(start_millis)
    .bind(end_millis)
    .fetch_all(pool)
    .await
}

/// Sum of the open orders created in a window (revenue not yet settled)
pub async fn open_amount(
    pool: &SqlitePool,
    start_millis: i64,
    end_millis: i64,
) -> Result<Option<f64>, sqlx::Error> {
    sqlx::query_scalar(&format!(
        "SELECT SUM(total_amount) FROM orders
         WHERE status IN {OPEN_SET} AND created_at >= ? AND created_at < ?"
    ))
    .bind(start_millis)
    .bind(end_millis)
    .fetch_one(pool)
    .await
}

/// Parent order of a line item
pub async fn find_item_order(
    pool: &SqlitePool,
    item_id: i64,
) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar("SELECT order_id FROM order_items WHERE id = ?")
        .bind(item_id)
        .fetch_optional(pool)
        .await
}

pub async fn cancelled_count(
    pool: &SqlitePool,
    start_millis: i64,
    end_millis: i64,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM orders
         WHERE status = 'cancelled' AND updated_at >= ? AND updated_at < ?",
    )
    .bind(start_millis)
    .bind(end_millis)
    .fetch_one(pool)
    .await
}
