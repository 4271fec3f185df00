//! Cart persistence
//!
//! One cart per session key. Line uniqueness is enforced by the
//! UNIQUE(cart_id, menu_item_id) constraint; re-adding the same menu
//! item increments the existing line instead of duplicating it.

use sqlx::{SqliteConnection, SqlitePool};

#[derive(Debug, sqlx::FromRow)]
pub struct CartRow {
    pub id: i64,
    pub session_key: String,
    pub table_number: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Cart line joined with its live menu item and vendor
///
/// `unit_price` is the price captured when the line was added; the join
/// only supplies display data and availability flags.
#[derive(Debug, sqlx::FromRow)]
pub struct CartLineRow {
    pub id: i64,
    pub menu_item_id: i64,
    pub quantity: i64,
    pub unit_price: f64,
    pub special_instructions: String,
    pub name: String,
    pub preparation_time: i64,
    pub is_available: bool,
    pub vendor_id: i64,
    pub vendor_name: String,
    pub vendor_open: bool,
}

pub async fn find_by_session(
    pool: &SqlitePool,
    session_key: &str,
) -> Result<Option<CartRow>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM carts WHERE session_key = ?")
        .bind(session_key)
        .fetch_optional(pool)
        .await
}

pub async fn get_or_create(
    pool: &SqlitePool,
    session_key: &str,
    table_number: Option<i64>,
    now: i64,
) -> Result<CartRow, sqlx::Error> {
    // Concurrent first-adds race on the UNIQUE(session_key); losers
    // fall through to the update path.
    sqlx::query(
        "INSERT INTO carts (session_key, table_number, created_at, updated_at)
         VALUES (?, ?, ?, ?)
         ON CONFLICT(session_key) DO UPDATE SET
            table_number = COALESCE(excluded.table_number, carts.table_number),
            updated_at = excluded.updated_at",
    )
    .bind(session_key)
    .bind(table_number)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    sqlx::query_as("SELECT * FROM carts WHERE session_key = ?")
        .bind(session_key)
        .fetch_one(pool)
        .await
}

/// Insert a line or increment the existing one for the same menu item
///
/// The conflict path keeps the unit_price captured on first add.
pub async fn upsert_item(
    pool: &SqlitePool,
    cart_id: i64,
    menu_item_id: i64,
    quantity: i64,
    unit_price: f64,
    special_instructions: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO cart_items (cart_id, menu_item_id, quantity, unit_price, special_instructions)
         VALUES (?, ?, ?, ?, ?)
         ON CONFLICT(cart_id, menu_item_id) DO UPDATE SET
            quantity = cart_items.quantity + excluded.quantity,
            special_instructions = excluded.special_instructions",
    )
    .bind(cart_id)
    .bind(menu_item_id)
    .bind(quantity)
    .bind(unit_price)
    .bind(special_instructions)
    .execute(pool)
    .await?;
    Ok(())
}

/// Set a line's quantity; returns false when the line is not in this cart
pub async fn set_item_quantity(
    pool: &SqlitePool,
    cart_id: i64,
    item_id: i64,
    quantity: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE cart_items SET quantity = ? WHERE id = ? AND cart_id = ?")
        .bind(quantity)
        .bind(item_id)
        .bind(cart_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() == 1)
}

/// Remove a line; returns false when the line is not in this cart
pub async fn remove_item(
    pool: &SqlitePool,
    cart_id: i64,
    item_id: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM cart_items WHERE id = ? AND cart_id = ?")
        .bind(item_id)
        .bind(cart_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn lines(pool: &SqlitePool, cart_id: i64) -> Result<Vec<CartLineRow>, sqlx::Error> {
    sqlx::query_as(
        "SELECT ci.id, ci.menu_item_id, ci.quantity, ci.unit_price, ci.special_instructions,
                m.name, m.preparation_time, m.is_available,
                v.id AS vendor_id, v.name AS vendor_name, v.is_open AS vendor_open
         FROM cart_items ci
         JOIN menu_items m ON m.id = ci.menu_item_id
         JOIN vendors v ON v.id = m.vendor_id
         WHERE ci.cart_id = ?
         ORDER BY ci.id",
    )
    .bind(cart_id)
    .fetch_all(pool)
    .await
}

pub async fn touch(pool: &SqlitePool, cart_id: i64, now: i64) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE carts SET updated_at = ? WHERE id = ?")
        .bind(now)
        .bind(cart_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Delete a cart and its lines inside the checkout transaction
pub async fn clear(conn: &mut SqliteConnection, cart_id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM cart_items WHERE cart_id = ?")
        .bind(cart_id)
        .execute(&mut *conn)
        .await?;
    sqlx::query("DELETE FROM carts WHERE id = ?")
        .bind(cart_id)
        .execute(conn)
        .await?;
    Ok(())
}
