//! Catalog lookups: tables, vendors, menu items

use shared::models::{DiningTable, MenuItem, Vendor};
use sqlx::SqlitePool;

pub async fn find_table_by_number(
    pool: &SqlitePool,
    number: i64,
) -> Result<Option<DiningTable>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM dining_tables WHERE number = ?")
        .bind(number)
        .fetch_optional(pool)
        .await
}

pub async fn list_tables(pool: &SqlitePool) -> Result<Vec<DiningTable>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM dining_tables ORDER BY number")
        .fetch_all(pool)
        .await
}

pub async fn find_menu_item(
    pool: &SqlitePool,
    id: i64,
) -> Result<Option<MenuItem>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM menu_items WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_vendor(pool: &SqlitePool, id: i64) -> Result<Option<Vendor>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM vendors WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}
